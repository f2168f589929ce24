//! Read-only aggregations over already-reconciled state: ownership
//! statistics, long-unused vehicles, and theft cases.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use crate::config::SyncConfig;
use crate::model::{Event, Vehicle};
use crate::store::{Store, StoreError};

/// Action labels the game server writes for lock-breaking attempts.
pub const THEFT_ACTIONS: [&str; 2] = ["сломал замок", "неудачная попытка взлома замка"];

/// One vehicle an actor plausibly owns: enough events, spread over enough
/// days, per the configured thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipEntry {
    pub vehicle: Vehicle,
    pub events: u64,
    pub first_event: DateTime<FixedOffset>,
    pub last_event: DateTime<FixedOffset>,
}

/// Vehicles one actor has used persistently enough to call theirs.
/// Vehicles purged by retention are dropped from the result; their events
/// survive but no longer join to a row.
pub fn ownership_report<S: Store>(
    store: &S,
    actor_id: &str,
    config: &SyncConfig,
) -> Result<Vec<OwnershipEntry>, StoreError> {
    let usage = store.vehicle_usage_for_actor(actor_id)?;
    let qualifying: Vec<_> = usage
        .into_iter()
        .filter(|entry| {
            entry.events >= config.report_min_events
                && (entry.last_event - entry.first_event).num_days() >= config.report_min_days
        })
        .collect();

    let ids: Vec<String> = qualifying.iter().map(|entry| entry.vehicle_id.clone()).collect();
    let vehicles = store.vehicles_by_ids(&ids)?;

    let mut report: Vec<OwnershipEntry> = qualifying
        .into_iter()
        .filter_map(|entry| {
            vehicles
                .iter()
                .find(|vehicle| vehicle.vehicle_id == entry.vehicle_id)
                .map(|vehicle| OwnershipEntry {
                    vehicle: vehicle.clone(),
                    events: entry.events,
                    first_event: entry.first_event,
                    last_event: entry.last_event,
                })
        })
        .collect();
    report.sort_by(|a, b| b.events.cmp(&a.events));
    Ok(report)
}

/// Non-deleted vehicles whose last use is older than `unused_days`, oldest
/// first. Vehicles never seen in use are excluded.
pub fn long_unused_vehicles<S: Store>(
    store: &S,
    now: DateTime<Utc>,
    unused_days: u32,
) -> Result<Vec<Vehicle>, StoreError> {
    let threshold = now - Duration::days(i64::from(unused_days));
    let mut unused: Vec<Vehicle> = store
        .active_vehicles()?
        .into_iter()
        .filter(|vehicle| {
            vehicle
                .last_use_time
                .map(|used| used.with_timezone(&Utc) <= threshold)
                .unwrap_or(false)
        })
        .collect();
    unused.sort_by_key(|vehicle| vehicle.last_use_time);
    Ok(unused)
}

/// Lock-breaking events, newest first.
pub fn theft_events<S: Store>(store: &S) -> Result<Vec<Event>, StoreError> {
    store.events_with_actions(&THEFT_ACTIONS)
}
