//! Score normalization applied to each signal before weighting.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `(x - min) / (max - min)`; a zero range maps every value to `0.0`.
    #[default]
    MinMax,
    /// `(n - rank) / n` where `rank` counts strictly greater scores, so exact
    /// ties share a rank and the best score maps to `1.0`.
    Rank,
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalization::MinMax => "min_max",
            Normalization::Rank => "rank",
        }
    }

    pub fn apply(&self, scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        match self {
            Normalization::MinMax => min_max(scores),
            Normalization::Rank => rank(scores),
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min_max" | "minmax" => Ok(Normalization::MinMax),
            "rank" => Ok(Normalization::Rank),
            other => Err(format!("unknown normalization: {other}")),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn min_max(scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let (min, max) = scores
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    scores
        .iter()
        .map(|(id, &v)| {
            let norm = if range > 0.0 && range.is_finite() {
                (v - min) / range
            } else {
                0.0
            };
            (id.clone(), norm)
        })
        .collect()
}

fn rank(scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut sorted: Vec<f64> = scores.values().copied().collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let n = sorted.len() as f64;

    scores
        .iter()
        .map(|(id, &v)| {
            let above = sorted.partition_point(|s| s.total_cmp(&v).is_gt());
            (id.clone(), (n - above as f64) / n)
        })
        .collect()
}
