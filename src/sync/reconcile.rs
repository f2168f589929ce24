//! Reconciles a normalized batch against persisted state: three phases
//! (actors, vehicles, events) plus the retention and phantom sweeps.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::logparse::Batch;
use crate::model::{Actor, Vehicle};
use crate::store::{Store, StoreError};

/// Row counts of one reconciliation (or an accumulated run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub actors_created: usize,
    pub actors_updated: usize,
    pub vehicles_created: usize,
    pub vehicles_updated: usize,
    pub vehicles_purged: usize,
    pub events_created: usize,
}

impl Counters {
    pub fn merge(&mut self, other: &Counters) {
        self.actors_created = self.actors_created.saturating_add(other.actors_created);
        self.actors_updated = self.actors_updated.saturating_add(other.actors_updated);
        self.vehicles_created = self.vehicles_created.saturating_add(other.vehicles_created);
        self.vehicles_updated = self.vehicles_updated.saturating_add(other.vehicles_updated);
        self.vehicles_purged = self.vehicles_purged.saturating_add(other.vehicles_purged);
        self.events_created = self.events_created.saturating_add(other.events_created);
    }
}

/// Apply one batch to the store. Actor and vehicle upserts complete before
/// events are inserted, since event rows carry resolved references.
pub fn reconcile<S: Store>(
    store: &mut S,
    batch: &Batch,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<Counters, StoreError> {
    let mut counters = Counters::default();

    let (actors_created, actors_updated) = sync_actors(store, batch)?;
    counters.actors_created = actors_created;
    counters.actors_updated = actors_updated;

    let (vehicles_created, vehicles_updated) = sync_vehicles(store, batch)?;
    counters.vehicles_created = vehicles_created;
    counters.vehicles_updated = vehicles_updated;

    if config.retention_horizon_days > 0 {
        let cutoff = now - Duration::days(i64::from(config.retention_horizon_days));
        counters.vehicles_purged = store.purge_vehicles_deleted_before(cutoff)?;
    }

    if !batch.events.is_empty() {
        counters.events_created = store.insert_events(&batch.events)?;
    }

    info!(
        unit_key = batch.unit_key.as_str(),
        actors_created = counters.actors_created,
        actors_updated = counters.actors_updated,
        vehicles_created = counters.vehicles_created,
        vehicles_updated = counters.vehicles_updated,
        vehicles_purged = counters.vehicles_purged,
        events_created = counters.events_created,
        "unit reconciled"
    );
    Ok(counters)
}

/// New actors are bulk-inserted; existing ones are rewritten only when the
/// observed display name differs, extending the persisted alternate names.
fn sync_actors<S: Store>(store: &mut S, batch: &Batch) -> Result<(usize, usize), StoreError> {
    let existing_ids = store.actor_ids()?;
    let mut to_create: Vec<Actor> = Vec::new();
    let mut observed_existing: Vec<String> = Vec::new();
    for (actor_id, actor) in &batch.actors {
        if existing_ids.contains(actor_id) {
            observed_existing.push(actor_id.clone());
        } else {
            to_create.push(actor.clone());
        }
    }

    let created = if to_create.is_empty() {
        0
    } else {
        store.insert_actors(&to_create)?
    };

    let mut to_update: Vec<Actor> = Vec::new();
    for mut persisted in store.actors_by_ids(&observed_existing)? {
        let Some(observed) = batch.actors.get(&persisted.actor_id) else {
            continue;
        };
        if persisted.name != observed.name {
            persisted.alt_names.extend(observed.alt_names.iter().cloned());
            persisted.note_name(observed.name.clone());
            to_update.push(persisted);
        }
    }
    let updated = if to_update.is_empty() {
        0
    } else {
        store.update_actors(&to_update)?
    };
    Ok((created, updated))
}

/// New vehicles are inserted with all batch fields. Existing rows always
/// take status, deletion_time, last_init_time and position from the batch;
/// last_use_time never regresses to null.
fn sync_vehicles<S: Store>(store: &mut S, batch: &Batch) -> Result<(usize, usize), StoreError> {
    let existing_ids = store.vehicle_ids()?;
    let mut to_create: Vec<Vehicle> = Vec::new();
    let mut observed_existing: Vec<String> = Vec::new();
    for (vehicle_id, vehicle) in &batch.vehicles {
        if existing_ids.contains(vehicle_id) {
            observed_existing.push(vehicle_id.clone());
        } else {
            to_create.push(vehicle.clone());
        }
    }

    let created = if to_create.is_empty() {
        0
    } else {
        store.insert_vehicles(&to_create)?
    };

    let mut to_update: Vec<Vehicle> = Vec::new();
    for mut persisted in store.vehicles_by_ids(&observed_existing)? {
        let Some(observed) = batch.vehicles.get(&persisted.vehicle_id) else {
            continue;
        };
        if persisted.status.is_resurrection(observed.status) {
            // Vehicle ids are reused server-side; leaving Deleted is intended.
            debug!(vehicle_id = persisted.vehicle_id.as_str(), "deleted vehicle id observed again");
        }
        persisted.status = observed.status;
        persisted.deletion_time = observed.deletion_time;
        persisted.last_init_time = observed.last_init_time;
        persisted.position = observed.position.clone();
        if let Some(used) = observed.last_use_time {
            persisted.last_use_time = Some(used);
        }
        to_update.push(persisted);
    }
    let updated = if to_update.is_empty() {
        0
    } else {
        store.update_vehicles(&to_update)?
    };
    Ok((created, updated))
}

/// Batch-independent maintenance: transition every non-deleted vehicle
/// whose last init is unknown or older than the staleness window to
/// `Deleted`. Returns the number of transitioned rows.
pub fn sweep_phantom_vehicles<S: Store>(
    store: &mut S,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let stale_before = now - Duration::hours(i64::from(config.phantom_staleness_hours));
    let deletion_offset = Duration::hours(i64::from(config.phantom_deletion_offset_hours));

    let mut phantoms: Vec<Vehicle> = Vec::new();
    for mut vehicle in store.active_vehicles()? {
        let stale = match vehicle.last_init_time {
            // Unknown init time: stale, but there is nothing to derive a
            // deletion time from.
            None => true,
            Some(init) => init.with_timezone(&Utc) < stale_before,
        };
        if stale {
            let deletion_time = vehicle.last_init_time.map(|init| init + deletion_offset);
            vehicle.mark_phantom_deleted(deletion_time);
            phantoms.push(vehicle);
        }
    }

    if phantoms.is_empty() {
        return Ok(0);
    }
    let swept = store.update_vehicles(&phantoms)?;
    info!(swept, "phantom vehicles transitioned to deleted");
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use crate::model::{Location, VehicleStatus};
    use crate::store::MemoryStore;

    use super::*;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn vehicle(id: &str, status: VehicleStatus) -> Vehicle {
        Vehicle {
            vehicle_id: id.to_string(),
            name: "GAZ-59037".to_string(),
            vehicle_type: "BTR".to_string(),
            position: Location::new("1.000, 2.000, 3.000"),
            status,
            last_init_time: None,
            last_use_time: None,
            deletion_time: None,
        }
    }

    #[test]
    fn phantom_sweep_uses_init_time_plus_offset() {
        let mut store = MemoryStore::new();
        let now = Utc::now();
        let init = (now - Duration::hours(7)).with_timezone(&offset());
        let mut stale = vehicle("1", VehicleStatus::Linked);
        stale.last_init_time = Some(init);
        store.insert_vehicles(&[stale]).unwrap();

        let swept = sweep_phantom_vehicles(&mut store, &SyncConfig::default(), now).unwrap();
        assert_eq!(swept, 1);

        let row = &store.vehicles_by_ids(&["1".to_string()]).unwrap()[0];
        assert_eq!(row.status, VehicleStatus::Deleted);
        assert_eq!(row.deletion_time, Some(init + Duration::hours(3)));
    }

    #[test]
    fn phantom_sweep_with_unknown_init_time_leaves_deletion_unset() {
        let mut store = MemoryStore::new();
        store.insert_vehicles(&[vehicle("1", VehicleStatus::Linked)]).unwrap();

        let swept = sweep_phantom_vehicles(&mut store, &SyncConfig::default(), Utc::now()).unwrap();
        assert_eq!(swept, 1);

        let row = &store.vehicles_by_ids(&["1".to_string()]).unwrap()[0];
        assert_eq!(row.status, VehicleStatus::Deleted);
        assert_eq!(row.deletion_time, None);
    }

    #[test]
    fn phantom_sweep_skips_fresh_and_deleted_vehicles() {
        let mut store = MemoryStore::new();
        let now = Utc::now();
        let mut fresh = vehicle("1", VehicleStatus::Free);
        fresh.last_init_time = Some((now - Duration::hours(1)).with_timezone(&offset()));
        let deleted = vehicle("2", VehicleStatus::Deleted);
        store.insert_vehicles(&[fresh, deleted]).unwrap();

        let swept = sweep_phantom_vehicles(&mut store, &SyncConfig::default(), now).unwrap();
        assert_eq!(swept, 0);
        let row = &store.vehicles_by_ids(&["1".to_string()]).unwrap()[0];
        assert_eq!(row.status, VehicleStatus::Free);
    }

    #[test]
    fn counters_merge_accumulates() {
        let mut total = Counters::default();
        let unit = Counters {
            actors_created: 1,
            actors_updated: 2,
            vehicles_created: 3,
            vehicles_updated: 4,
            vehicles_purged: 5,
            events_created: 6,
        };
        total.merge(&unit);
        total.merge(&unit);
        assert_eq!(total.events_created, 12);
        assert_eq!(total.actors_created, 2);
        assert_eq!(total.vehicles_purged, 10);
    }
}
