//! Append-only audit trail of cache accesses (newline-delimited JSON).

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};
use super::types::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerPhase {
    Fetch,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Ok,
    Error,
}

/// One ledger line. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub timestamp: String,
    pub phase: LedgerPhase,
    pub key: CacheKey,
    pub online: bool,
    pub status: LedgerStatus,
}

/// Counts over a slice of ledger records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub records: usize,
    pub online: usize,
    pub offline: usize,
    pub errors: usize,
}

impl LedgerAudit {
    pub fn from_records(records: &[LedgerRecord]) -> Self {
        records.iter().fold(Self::default(), |mut audit, record| {
            audit.records += 1;
            if record.online {
                audit.online += 1;
            } else {
                audit.offline += 1;
            }
            if record.status == LedgerStatus::Error {
                audit.errors += 1;
            }
            audit
        })
    }

    /// Fails with the first `online=true` record, as required for offline replay runs.
    pub fn ensure_replay_clean(records: &[LedgerRecord]) -> CacheResult<Self> {
        if let Some(record) = records.iter().find(|r| r.online) {
            return Err(CacheError::ReplayViolation {
                key: record.key.clone(),
            });
        }
        Ok(Self::from_records(records))
    }
}

tokio::task_local! {
    static RUN_RECORDS: RunRecords;
}

/// Records appended while a future runs inside [`RunRecords::scope`].
///
/// Capture is task-local, so concurrent runs over a shared store each see only
/// their own accesses.
#[derive(Debug, Clone, Default)]
pub struct RunRecords {
    records: Arc<Mutex<Vec<LedgerRecord>>>,
}

impl RunRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        RUN_RECORDS.scope(self.clone(), future).await
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records.lock().clone()
    }

    /// No-op outside a scope.
    pub(crate) fn capture(record: &LedgerRecord) {
        let _ = RUN_RECORDS.try_with(|run| run.records.lock().push(record.clone()));
    }
}

/// Appends one record as a single line and flushes it to disk.
pub(crate) fn append_record(path: &Path, record: &LedgerRecord) -> CacheResult<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    file.sync_data()?;
    Ok(())
}

/// Reads every record in file order. A missing file is an empty ledger.
pub fn read_ledger_file(path: &Path) -> CacheResult<Vec<LedgerRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| CacheError::LedgerCorrupt {
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}
