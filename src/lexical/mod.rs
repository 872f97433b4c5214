//! BM25 scoring over the in-memory corpus.
//!
//! Pure: the same `(query, corpus)` always yields bit-identical scores. Chunks
//! are visited in id order and query terms in sorted order so the float
//! accumulation order never changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::constants::{BM25_B, BM25_K1, MIN_TOKEN_LEN};
use crate::corpus::Corpus;


/// Lowercases, splits on non-alphanumerics and drops tokens shorter than two chars.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: BM25_K1,
            b: BM25_B,
        }
    }
}

/// Non-negative BM25 IDF.
#[inline]
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LexicalIndex {
    params: Bm25Params,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Scores every chunk; chunks sharing no term with the query score `0.0`.
    pub fn score(&self, query: &str, corpus: &Corpus) -> BTreeMap<String, f64> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();

        let docs: Vec<(&str, HashMap<String, usize>, usize)> = corpus
            .iter()
            .map(|(id, chunk)| {
                let tokens = tokenize(&chunk.text);
                let len = tokens.len();
                let mut tf: HashMap<String, usize> = HashMap::new();
                for token in tokens {
                    *tf.entry(token).or_default() += 1;
                }
                (id, tf, len)
            })
            .collect();

        let total_docs = docs.len();
        let total_len: usize = docs.iter().map(|(_, _, len)| len).sum();
        let avg_len = if total_docs == 0 {
            0.0
        } else {
            total_len as f64 / total_docs as f64
        };

        let idfs: Vec<(&str, f64)> = terms
            .iter()
            .map(|term| {
                let df = docs.iter().filter(|(_, tf, _)| tf.contains_key(term)).count();
                (term.as_str(), idf(total_docs, df))
            })
            .collect();

        let Bm25Params { k1, b } = self.params;
        docs.iter()
            .map(|(id, tf, len)| {
                let mut score = 0.0;
                if avg_len > 0.0 {
                    let norm = k1 * (1.0 - b + b * (*len as f64) / avg_len);
                    for (term, term_idf) in &idfs {
                        if let Some(&count) = tf.get(*term) {
                            let count = count as f64;
                            score += term_idf * (count * (k1 + 1.0)) / (count + norm);
                        }
                    }
                }
                (id.to_string(), score)
            })
            .collect()
    }
}
