//! Sync orchestrator: drives cursor -> transport -> normalizer ->
//! reconciler, one unit at a time, and advances the cursor only after a
//! unit's reconciliation succeeds.

mod cursor;
mod reconcile;
mod transport;

use std::time::Instant;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::config::SyncConfig;
use crate::logparse::normalize;
use crate::store::Store;

pub use cursor::{CrawlCursor, CursorError};
pub use reconcile::{reconcile, sweep_phantom_vehicles, Counters};
pub use transport::{DirTransport, LogTransport, TransportError};

/// Outcome of one sync run. Counters cover completed units even when the
/// run aborted partway, so operators can see how far it progressed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub counters: Counters,
    pub units_processed: usize,
    pub units_skipped: usize,
    pub lines_skipped: usize,
    pub elapsed_secs: f64,
    /// Set when a store or cursor failure aborted the remaining units.
    pub aborted: Option<String>,
}

/// Run one synchronization pass over every reconcilable unit.
///
/// Transport failures (and units with zero usable lines) are recoverable:
/// the unit is skipped with its cursor entry unwritten, so the next run
/// retries it. Store and cursor failures abort the remaining units.
pub fn run_sync<T, S>(
    transport: &mut T,
    store: &mut S,
    cursor: &mut CrawlCursor,
    config: &SyncConfig,
) -> SyncReport
where
    T: LogTransport,
    S: Store,
{
    let started = Instant::now();
    let mut report = SyncReport::default();
    let now = Utc::now();

    let listing = match transport.list_units() {
        Ok(listing) => listing,
        Err(err) => {
            error!(error = %err, "unit listing failed");
            report.aborted = Some(err.to_string());
            report.elapsed_secs = elapsed_secs(started);
            return report;
        }
    };

    let min_date = if config.min_unit_age_days > 0 {
        Some(now.date_naive() - Duration::days(i64::from(config.min_unit_age_days)))
    } else {
        None
    };

    for unit_key in cursor.next_units(&listing, min_date) {
        let raw_lines = match transport.fetch_unit(&unit_key) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(unit_key = unit_key.as_str(), error = %err, "fetch failed, unit left for retry");
                report.units_skipped += 1;
                continue;
            }
        };

        let batch = normalize(&unit_key, &raw_lines);
        report.lines_skipped += batch.skipped_lines;
        if batch.is_empty() {
            warn!(unit_key = unit_key.as_str(), "no usable lines, unit left for retry");
            report.units_skipped += 1;
            continue;
        }

        match reconcile(store, &batch, config, now) {
            Ok(counters) => report.counters.merge(&counters),
            Err(err) => {
                error!(unit_key = unit_key.as_str(), error = %err, "reconciliation failed, aborting run");
                report.aborted = Some(err.to_string());
                break;
            }
        }

        if let Err(err) = cursor.record_done(&unit_key) {
            error!(unit_key = unit_key.as_str(), error = %err, "cursor write failed, aborting run");
            report.aborted = Some(err.to_string());
            break;
        }
        report.units_processed += 1;
    }

    report.elapsed_secs = elapsed_secs(started);
    report
}

fn elapsed_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0
}
