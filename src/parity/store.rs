//! Write-once parity report artifacts: `<root>/<query_id>/<run_id>.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::error::{ArtifactError, ArtifactResult};
use super::report::ParityReport;

/// Outcome of [`ArtifactStore::persist_idempotent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written(PathBuf),
    /// An identical report was already on disk.
    AlreadyRecorded(PathBuf),
}

impl PersistOutcome {
    pub fn path(&self) -> &Path {
        match self {
            PersistOutcome::Written(path) | PersistOutcome::AlreadyRecorded(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn report_path(&self, query_id: &str, run_id: &str) -> ArtifactResult<PathBuf> {
        check_component(query_id)?;
        check_component(run_id)?;
        Ok(self.root.join(query_id).join(format!("{run_id}.json")))
    }

    /// Writes the report. Fails with [`ArtifactError::ArtifactExists`] if one is already there.
    pub fn persist(&self, report: &ParityReport) -> ArtifactResult<PathBuf> {
        let path = self.report_path(&report.query_id, &report.run_id)?;
        let bytes = report.to_json_bytes()?;
        self.write_new(&path, &bytes)?;
        Ok(path)
    }

    /// Like [`ArtifactStore::persist`], but an existing byte-identical report is accepted.
    pub fn persist_idempotent(&self, report: &ParityReport) -> ArtifactResult<PersistOutcome> {
        let path = self.report_path(&report.query_id, &report.run_id)?;
        let bytes = report.to_json_bytes()?;
        match self.write_new(&path, &bytes) {
            Ok(()) => Ok(PersistOutcome::Written(path)),
            Err(ArtifactError::ArtifactExists { path }) => {
                if fs::read(&path)? == bytes {
                    debug!(path = %path.display(), "Identical report already recorded");
                    Ok(PersistOutcome::AlreadyRecorded(path))
                } else {
                    Err(ArtifactError::ArtifactConflict { path })
                }
            }
            Err(e) => Err(e),
        }
    }

    pub fn load(&self, query_id: &str, run_id: &str) -> ArtifactResult<ParityReport> {
        let path = self.report_path(query_id, run_id)?;
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> ArtifactResult<()> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                ArtifactError::ArtifactExists {
                    path: path.to_path_buf(),
                }
            } else {
                ArtifactError::Io(e.error)
            }
        })?;

        info!(path = %path.display(), "Parity report persisted");
        Ok(())
    }
}

fn check_component(component: &str) -> ArtifactResult<()> {
    let valid = !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidComponent {
            component: component.to_string(),
        })
    }
}
