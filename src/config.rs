//! Engine configuration, threaded explicitly into reconciliation and the
//! maintenance sweeps. Nothing in the engine reads ambient global state.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tunable policy for one deployment. `Default` mirrors the values the
/// production log server runs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Purge vehicles whose deletion is older than this many days.
    /// Zero disables the retention sweep entirely.
    pub retention_horizon_days: u32,
    /// Skip source units older than this many days. Zero disables the
    /// age filter and every unlisted unit is fetched.
    pub min_unit_age_days: u32,
    /// A non-deleted vehicle not reinitialized within this window is a
    /// phantom and gets transitioned to deleted.
    pub phantom_staleness_hours: u32,
    /// Offset added to a phantom's last init time to estimate when the
    /// server actually dropped it.
    pub phantom_deletion_offset_hours: u32,
    /// Ownership report: minimum events an actor needs on one vehicle.
    pub report_min_events: u64,
    /// Ownership report: minimum days between the first and last of those
    /// events.
    pub report_min_days: i64,
    /// Filename prefix identifying the vehicle logfile inside a unit.
    pub logfile_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            retention_horizon_days: 30,
            min_unit_age_days: 0,
            phantom_staleness_hours: 6,
            phantom_deletion_offset_hours: 3,
            report_min_events: 5,
            report_min_days: 3,
            logfile_prefix: "ImmobilizerLog".to_string(),
        }
    }
}

impl SyncConfig {
    /// Build a config from `MOTORPOOL_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = SyncConfig::default();
        SyncConfig {
            retention_horizon_days: env_or("MOTORPOOL_RETENTION_DAYS", defaults.retention_horizon_days),
            min_unit_age_days: env_or("MOTORPOOL_MIN_UNIT_AGE_DAYS", defaults.min_unit_age_days),
            phantom_staleness_hours: env_or("MOTORPOOL_PHANTOM_STALENESS_HOURS", defaults.phantom_staleness_hours),
            phantom_deletion_offset_hours: env_or(
                "MOTORPOOL_PHANTOM_DELETION_OFFSET_HOURS",
                defaults.phantom_deletion_offset_hours,
            ),
            report_min_events: env_or("MOTORPOOL_REPORT_MIN_EVENTS", defaults.report_min_events),
            report_min_days: env_or("MOTORPOOL_REPORT_MIN_DAYS", defaults.report_min_days),
            logfile_prefix: env::var("MOTORPOOL_LOGFILE_PREFIX").unwrap_or(defaults.logfile_prefix),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_policy() {
        let config = SyncConfig::default();
        assert_eq!(config.retention_horizon_days, 30);
        assert_eq!(config.phantom_staleness_hours, 6);
        assert_eq!(config.phantom_deletion_offset_hours, 3);
        assert_eq!(config.min_unit_age_days, 0);
        assert_eq!(config.logfile_prefix, "ImmobilizerLog");
    }
}
