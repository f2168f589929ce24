//! Durable crawl cursor: which source units have already been reconciled.
//!
//! One unit key per line, appended only after a unit's reconciliation
//! succeeds, so a crash mid-run reprocesses at most the in-flight unit.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::logparse::unit_date;

/// A cursor that cannot persist would break the at-most-once guarantee,
/// so its failures abort the run.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed done-set. Entries grow monotonically and are never pruned.
#[derive(Debug)]
pub struct CrawlCursor {
    path: PathBuf,
    done: HashSet<String>,
}

impl CrawlCursor {
    /// Load the done-set from `path`; a missing file is an empty cursor.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CursorError> {
        let path = path.as_ref().to_path_buf();
        let done = match fs::read_to_string(&path) {
            Ok(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(CrawlCursor { path, done })
    }

    pub fn is_done(&self, unit_key: &str) -> bool {
        self.done.contains(unit_key)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Filter a transport listing down to reconcilable units: keys that
    /// parse as unit timestamps, are not already done, and are newer than
    /// `min_date` when one is set.
    pub fn next_units(&self, listing: &[String], min_date: Option<NaiveDate>) -> Vec<String> {
        listing
            .iter()
            .filter(|key| !self.is_done(key))
            .filter_map(|key| unit_date(key).map(|date| (key, date)))
            .filter(|(_, date)| min_date.map(|min| *date > min).unwrap_or(true))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Durably append a unit key. Call only after the unit reconciled
    /// without error.
    pub fn record_done(&mut self, unit_key: &str) -> Result<(), CursorError> {
        if self.done.contains(unit_key) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{unit_key}")?;
        file.flush()?;
        self.done.insert(unit_key.to_string());
        Ok(())
    }
}
