//! Read-only document chunks supplied by the extraction stage.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;


#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("duplicate chunk id: {id}")]
    DuplicateId { id: String },

    #[error("invalid chunk at {path}:{line}: {reason}")]
    InvalidLine {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CorpusResult<T> = Result<T, CorpusError>;

/// One retrievable passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    #[serde(default)]
    pub page: u32,
    pub text: String,
}

impl Chunk {
    pub fn new(doc_id: &str, chunk_id: &str, page: u32, text: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            chunk_id: chunk_id.to_string(),
            page,
            text: text.to_string(),
        }
    }

    /// Candidate id, `"{doc_id}/{chunk_id}"`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.doc_id, self.chunk_id)
    }
}

/// Chunks keyed and iterated by candidate id in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    chunks: BTreeMap<String, Chunk>,
}

impl Corpus {
    /// Rejects two chunks sharing a candidate id.
    pub fn new(chunks: impl IntoIterator<Item = Chunk>) -> CorpusResult<Self> {
        let mut map = BTreeMap::new();
        for chunk in chunks {
            let id = chunk.id();
            if map.contains_key(&id) {
                return Err(CorpusError::DuplicateId { id });
            }
            map.insert(id, chunk);
        }
        Ok(Self { chunks: map })
    }

    /// Loads one JSON chunk per line; blank lines are skipped.
    pub fn from_jsonl(path: &Path) -> CorpusResult<Self> {
        let io_err = |source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;

        let mut chunks = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line).map_err(|e| CorpusError::InvalidLine {
                path: path.to_path_buf(),
                line: index + 1,
                reason: e.to_string(),
            })?;
            chunks.push(chunk);
        }

        let corpus = Self::new(chunks)?;
        debug!(path = %path.display(), chunks = corpus.len(), "Corpus loaded");
        Ok(corpus)
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// `(id, chunk)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Chunk)> {
        self.chunks.iter().map(|(id, chunk)| (id.as_str(), chunk))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.chunks.keys().map(String::as_str)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.values().map(|c| c.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
