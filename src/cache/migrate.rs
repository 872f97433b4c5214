//! One-shot import of the legacy cache layout.
//!
//! Legacy layout: `<old_dir>/<model_id>/<sha256(normalized_text) hex>.json`
//! holding `{"vector": [...], "created_at"?: "...", "dim"?: n}`. Entries are
//! re-keyed into the canonical [`FsCacheStore`] layout. When a canonical entry
//! already exists for the key, the canonical entry wins and the legacy one is
//! skipped, so re-running the migration is a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use super::error::{CacheError, CacheResult};
use super::store::{CacheStore, FsCacheStore, PutOutcome};
use super::types::{CacheEntry, CacheKey, EntrySource, check_vector};
use crate::constants::LEGACY_CREATED_AT;

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    vector: Vec<f32>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    dim: Option<usize>,
}

/// Counts produced by one migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Written into the canonical layout.
    pub copied: usize,
    /// Skipped because a canonical entry already existed.
    pub already_present: usize,
    /// Skipped because the legacy file was unreadable or inconsistent.
    pub invalid: usize,
}

/// Copies legacy entries from `old_dir` into a canonical store at `new_dir`.
pub fn migrate_legacy_layout(old_dir: &Path, new_dir: &Path) -> CacheResult<MigrationReport> {
    let target = FsCacheStore::new(new_dir.to_path_buf());
    import_legacy(old_dir, &target)
}

/// Imports legacy entries into any [`CacheStore`].
pub fn import_legacy<S: CacheStore + ?Sized>(old_dir: &Path, target: &S) -> CacheResult<MigrationReport> {
    if !old_dir.is_dir() {
        return Err(CacheError::LegacyDirMissing {
            path: old_dir.to_path_buf(),
        });
    }

    let mut report = MigrationReport::default();

    for model_dir in sorted_children(old_dir)? {
        if !model_dir.is_dir() {
            continue;
        }
        let Some(model_id) = model_dir.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %model_dir.display(), "Skipping legacy model directory with non-UTF-8 name");
            continue;
        };

        for file in sorted_children(&model_dir)? {
            if file.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match legacy_entry(model_id, &file) {
                Ok(entry) => match target.put(&entry)? {
                    PutOutcome::Written => report.copied += 1,
                    PutOutcome::AlreadyPresent => report.already_present += 1,
                },
                Err(reason) => {
                    warn!(path = %file.display(), reason = %reason, "Skipping invalid legacy entry");
                    report.invalid += 1;
                }
            }
        }
    }

    info!(
        copied = report.copied,
        already_present = report.already_present,
        invalid = report.invalid,
        "Legacy cache migration finished"
    );
    Ok(report)
}

fn legacy_entry(model_id: &str, path: &Path) -> Result<CacheEntry, String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "non-UTF-8 file name".to_string())?;

    let digest: [u8; 32] = hex::decode(stem)
        .map_err(|e| format!("file name is not a hex digest: {e}"))?
        .try_into()
        .map_err(|_| "digest is not 32 bytes".to_string())?;

    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let legacy: LegacyEntry = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;

    check_vector(&legacy.vector)?;
    if let Some(dim) = legacy.dim
        && dim != legacy.vector.len()
    {
        return Err(format!(
            "dim {dim} does not match vector length {}",
            legacy.vector.len()
        ));
    }

    Ok(CacheEntry::new(
        CacheKey::from_parts(model_id, &digest),
        model_id,
        legacy.vector,
        EntrySource::Offline,
        legacy
            .created_at
            .unwrap_or_else(|| LEGACY_CREATED_AT.to_string()),
    ))
}

fn sorted_children(dir: &Path) -> CacheResult<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    children.sort();
    Ok(children)
}
