//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `ANCHOR_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::Mode;
use crate::constants::{
    DEFAULT_ALPHA, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_LEDGER_FILENAME, DEFAULT_MODEL_ID,
    DEFAULT_RUNS, DEFAULT_TOP_K,
};
use crate::determinism::{Clock, FixedClock, SystemClock};
use crate::fusion::{FusionConfig, Normalization};

/// Pipeline configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `ANCHOR_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Online or offline replay. Default: `online`.
    pub mode: Mode,

    /// Seed for run ids. Mandatory in offline replay.
    pub seed: Option<u64>,

    /// Instant every timestamp is pinned to. Mandatory in offline replay.
    pub fixed_time: Option<DateTime<Utc>>,

    /// Canonical cache root. Default: `./.anchor/cache`.
    pub cache_dir: PathBuf,

    /// Ledger file. Default: `<cache_dir>/ledger.jsonl`.
    pub ledger_path: Option<PathBuf>,

    /// Parity report root. Default: `./.anchor/artifacts`.
    pub artifact_dir: PathBuf,

    /// Embedding model id. Default: `text-embedding-3-small`.
    pub model_id: String,

    /// OpenAI-compatible endpoint. The deterministic stub is used when unset.
    pub embedding_url: Option<String>,

    pub embedding_api_key: Option<String>,

    /// Provider call deadline in milliseconds. Default: `10000`.
    pub fetch_timeout_ms: u64,

    /// Lexical weight. Default: `0.6`.
    pub alpha: f64,

    /// Fused results kept. Default: `5`.
    pub top_k: usize,

    /// Determinism harness runs. Default: `3`.
    pub runs: usize,

    /// Treat offline embedding misses as errors. Default: `false`.
    pub require_complete_cache: bool,

    /// Score normalization. Default: `min_max`.
    pub normalization: Normalization,

    /// Corpus JSONL for the validation binary.
    pub corpus_path: Option<PathBuf>,

    /// Request JSON for the validation binary.
    pub request_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Online,
            seed: None,
            fixed_time: None,
            cache_dir: PathBuf::from("./.anchor/cache"),
            ledger_path: None,
            artifact_dir: PathBuf::from("./.anchor/artifacts"),
            model_id: DEFAULT_MODEL_ID.to_string(),
            embedding_url: None,
            embedding_api_key: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
            runs: DEFAULT_RUNS,
            require_complete_cache: false,
            normalization: Normalization::default(),
            corpus_path: None,
            request_path: None,
        }
    }
}

impl Config {
    const ENV_MODE: &'static str = "ANCHOR_MODE";
    const ENV_SEED: &'static str = "ANCHOR_SEED";
    const ENV_FIXED_TIME: &'static str = "ANCHOR_FIXED_TIME";
    const ENV_CACHE_DIR: &'static str = "ANCHOR_CACHE_DIR";
    const ENV_LEDGER_PATH: &'static str = "ANCHOR_LEDGER_PATH";
    const ENV_ARTIFACT_DIR: &'static str = "ANCHOR_ARTIFACT_DIR";
    const ENV_MODEL_ID: &'static str = "ANCHOR_MODEL_ID";
    const ENV_EMBEDDING_URL: &'static str = "ANCHOR_EMBEDDING_URL";
    const ENV_EMBEDDING_API_KEY: &'static str = "ANCHOR_EMBEDDING_API_KEY";
    const ENV_FETCH_TIMEOUT_MS: &'static str = "ANCHOR_FETCH_TIMEOUT_MS";
    const ENV_ALPHA: &'static str = "ANCHOR_ALPHA";
    const ENV_TOP_K: &'static str = "ANCHOR_TOP_K";
    const ENV_RUNS: &'static str = "ANCHOR_RUNS";
    const ENV_REQUIRE_COMPLETE_CACHE: &'static str = "ANCHOR_REQUIRE_COMPLETE_CACHE";
    const ENV_NORMALIZATION: &'static str = "ANCHOR_NORMALIZATION";
    const ENV_CORPUS_PATH: &'static str = "ANCHOR_CORPUS_PATH";
    const ENV_REQUEST_PATH: &'static str = "ANCHOR_REQUEST_PATH";

    /// Every variable [`Config::from_env`] reads.
    pub const ENV_VARS: [&'static str; 17] = [
        Self::ENV_MODE,
        Self::ENV_SEED,
        Self::ENV_FIXED_TIME,
        Self::ENV_CACHE_DIR,
        Self::ENV_LEDGER_PATH,
        Self::ENV_ARTIFACT_DIR,
        Self::ENV_MODEL_ID,
        Self::ENV_EMBEDDING_URL,
        Self::ENV_EMBEDDING_API_KEY,
        Self::ENV_FETCH_TIMEOUT_MS,
        Self::ENV_ALPHA,
        Self::ENV_TOP_K,
        Self::ENV_RUNS,
        Self::ENV_REQUIRE_COMPLETE_CACHE,
        Self::ENV_NORMALIZATION,
        Self::ENV_CORPUS_PATH,
        Self::ENV_REQUEST_PATH,
    ];

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mode = match Self::parse_optional_string_from_env(Self::ENV_MODE) {
            Some(value) => value
                .parse::<Mode>()
                .map_err(|_| ConfigError::InvalidMode { value })?,
            None => defaults.mode,
        };

        let seed = match Self::parse_optional_string_from_env(Self::ENV_SEED) {
            Some(value) => Some(
                value
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidSeed { value, source: e })?,
            ),
            None => None,
        };

        let fixed_time = match Self::parse_optional_string_from_env(Self::ENV_FIXED_TIME) {
            Some(value) => Some(
                FixedClock::parse(&value)
                    .map_err(|e| ConfigError::InvalidFixedTime { value, source: e })?
                    .now(),
            ),
            None => None,
        };

        let normalization = match Self::parse_optional_string_from_env(Self::ENV_NORMALIZATION) {
            Some(value) => value
                .parse::<Normalization>()
                .map_err(|_| ConfigError::InvalidNormalization { value })?,
            None => defaults.normalization,
        };

        Ok(Self {
            mode,
            seed,
            fixed_time,
            cache_dir: Self::parse_path_from_env(Self::ENV_CACHE_DIR, defaults.cache_dir),
            ledger_path: Self::parse_optional_path_from_env(Self::ENV_LEDGER_PATH),
            artifact_dir: Self::parse_path_from_env(Self::ENV_ARTIFACT_DIR, defaults.artifact_dir),
            model_id: Self::parse_string_from_env(Self::ENV_MODEL_ID, defaults.model_id),
            embedding_url: Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_URL),
            embedding_api_key: Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_API_KEY),
            fetch_timeout_ms: Self::parse_number_from_env(
                Self::ENV_FETCH_TIMEOUT_MS,
                defaults.fetch_timeout_ms,
            )?,
            alpha: Self::parse_number_from_env(Self::ENV_ALPHA, defaults.alpha)?,
            top_k: Self::parse_number_from_env(Self::ENV_TOP_K, defaults.top_k)?,
            runs: Self::parse_number_from_env(Self::ENV_RUNS, defaults.runs)?,
            require_complete_cache: Self::parse_bool_from_env(
                Self::ENV_REQUIRE_COMPLETE_CACHE,
                defaults.require_complete_cache,
            )?,
            normalization,
            corpus_path: Self::parse_optional_path_from_env(Self::ENV_CORPUS_PATH),
            request_path: Self::parse_optional_path_from_env(Self::ENV_REQUEST_PATH),
        })
    }

    /// Validates ranges, paths and offline prerequisites (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::InvalidAlpha { value: self.alpha });
        }
        if self.top_k == 0 {
            return Err(ConfigError::Zero { name: Self::ENV_TOP_K });
        }
        if self.runs == 0 {
            return Err(ConfigError::Zero { name: Self::ENV_RUNS });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                name: Self::ENV_FETCH_TIMEOUT_MS,
            });
        }

        if self.mode.is_offline() {
            if self.seed.is_none() {
                return Err(ConfigError::MissingEnvVar { name: Self::ENV_SEED });
            }
            if self.fixed_time.is_none() {
                return Err(ConfigError::MissingEnvVar {
                    name: Self::ENV_FIXED_TIME,
                });
            }
        }

        for dir in [&self.cache_dir, &self.artifact_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigError::NotADirectory { path: dir.clone() });
            }
        }

        for path in [&self.corpus_path, &self.request_path].into_iter().flatten() {
            check_file(path)?;
        }

        Ok(())
    }

    /// Fails unless both input files are configured.
    pub fn require_inputs(&self) -> Result<(&Path, &Path), ConfigError> {
        let corpus = self.corpus_path.as_deref().ok_or(ConfigError::MissingEnvVar {
            name: Self::ENV_CORPUS_PATH,
        })?;
        let request = self.request_path.as_deref().ok_or(ConfigError::MissingEnvVar {
            name: Self::ENV_REQUEST_PATH,
        })?;
        Ok((corpus, request))
    }

    /// `ANCHOR_LEDGER_PATH`, or `<cache_dir>/ledger.jsonl`.
    pub fn resolved_ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(DEFAULT_LEDGER_FILENAME))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Clock for persisted timestamps: the fixed time if configured, the wall clock otherwise.
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.fixed_time {
            Some(instant) => Arc::new(FixedClock::new(instant)),
            None => Arc::new(SystemClock),
        }
    }

    /// Clock shared by every harness run: the fixed time if configured, else
    /// the wall clock frozen once so all runs stamp the same instant.
    pub fn harness_clock(&self) -> Arc<dyn Clock> {
        match self.fixed_time {
            Some(instant) => Arc::new(FixedClock::new(instant)),
            None => Arc::new(FixedClock::frozen_now()),
        }
    }

    pub fn fusion_config(&self) -> FusionConfig {
        FusionConfig {
            alpha: self.alpha,
            top_k: self.top_k,
            normalization: self.normalization,
            model_id: self.model_id.clone(),
            require_complete_cache: self.require_complete_cache,
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::parse_optional_string_from_env(var_name).unwrap_or(default)
    }

    fn parse_number_from_env<T: std::str::FromStr>(
        var_name: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: var_name,
                value,
            }),
            None => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    name: var_name,
                    value,
                }),
            },
            None => Ok(default),
        }
    }
}

fn check_file(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(ConfigError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
