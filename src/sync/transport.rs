//! Transport boundary to the remote log source, plus the local-directory
//! implementation used by mirrored-log deployments and tests.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Transport failures are unit-recoverable: the orchestrator logs, skips
/// the unit, and leaves the cursor unadvanced so the next run retries it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no logfile matching prefix {prefix:?} in unit {unit_key}")]
    MissingLogfile { unit_key: String, prefix: String },
}

/// A remote source of time-bucketed log directories.
pub trait LogTransport {
    /// Every available source-unit key, unfiltered.
    fn list_units(&mut self) -> Result<Vec<String>, TransportError>;
    /// The raw lines of one unit's vehicle logfile.
    fn fetch_unit(&mut self, unit_key: &str) -> Result<Vec<String>, TransportError>;
}

/// Reads units from a local directory tree: one subdirectory per unit,
/// holding a single logfile whose name carries the configured prefix.
#[derive(Debug)]
pub struct DirTransport {
    root: PathBuf,
    logfile_prefix: String,
}

impl DirTransport {
    pub fn new(root: impl AsRef<Path>, logfile_prefix: impl Into<String>) -> Self {
        DirTransport {
            root: root.as_ref().to_path_buf(),
            logfile_prefix: logfile_prefix.into(),
        }
    }
}

impl LogTransport for DirTransport {
    fn list_units(&mut self) -> Result<Vec<String>, TransportError> {
        let mut units = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    units.push(name.to_string());
                }
            }
        }
        units.sort();
        Ok(units)
    }

    fn fetch_unit(&mut self, unit_key: &str) -> Result<Vec<String>, TransportError> {
        let unit_dir = self.root.join(unit_key);
        let mut logfiles: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&unit_dir)? {
            let entry = entry?;
            let path = entry.path();
            let matches_prefix = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.contains(&self.logfile_prefix));
            if path.is_file() && matches_prefix {
                logfiles.push(path);
            }
        }
        logfiles.sort();
        let Some(logfile) = logfiles.first() else {
            return Err(TransportError::MissingLogfile {
                unit_key: unit_key.to_string(),
                prefix: self.logfile_prefix.clone(),
            });
        };
        let raw = fs::read_to_string(logfile)?;
        Ok(raw.lines().map(|line| line.trim_end_matches('\r').to_string()).collect())
    }
}
