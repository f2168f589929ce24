//! JSON snapshot store: one file per collection under a data directory.
//!
//! Collections are loaded once on open and written back whole after each
//! mutating bulk call. Suits the scheduled-job deployment size (thousands
//! of rows, one writer).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::model::{Actor, Event, Vehicle};
use crate::store::{MemoryStore, Store, StoreError, VehicleUsage};

const ACTORS_FILE: &str = "actors.json";
const VEHICLES_FILE: &str = "vehicles.json";
const EVENTS_FILE: &str = "events.json";

/// A [MemoryStore] mirrored to JSON snapshot files.
#[derive(Debug)]
pub struct JsonStore {
    data_dir: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open (or initialize) a store under `data_dir`. Missing snapshot
    /// files mean empty collections.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let mut inner = MemoryStore::new();
        if let Some(actors) = load_snapshot::<Vec<Actor>>(&data_dir.join(ACTORS_FILE))? {
            inner.actors = actors
                .into_iter()
                .map(|actor| (actor.actor_id.clone(), actor))
                .collect();
        }
        if let Some(vehicles) = load_snapshot::<Vec<Vehicle>>(&data_dir.join(VEHICLES_FILE))? {
            inner.vehicles = vehicles
                .into_iter()
                .map(|vehicle| (vehicle.vehicle_id.clone(), vehicle))
                .collect();
        }
        if let Some(events) = load_snapshot::<Vec<Event>>(&data_dir.join(EVENTS_FILE))? {
            inner.events = events;
        }
        Ok(JsonStore { data_dir, inner })
    }

    fn persist_actors(&self) -> Result<(), StoreError> {
        let rows: Vec<&Actor> = self.inner.actors.values().collect();
        write_snapshot(&self.data_dir.join(ACTORS_FILE), &rows)
    }

    fn persist_vehicles(&self) -> Result<(), StoreError> {
        let rows: Vec<&Vehicle> = self.inner.vehicles.values().collect();
        write_snapshot(&self.data_dir.join(VEHICLES_FILE), &rows)
    }

    fn persist_events(&self) -> Result<(), StoreError> {
        write_snapshot(&self.data_dir.join(EVENTS_FILE), &self.inner.events)
    }
}

fn load_snapshot<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_snapshot<T: serde::Serialize>(path: &Path, rows: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(rows)?;
    fs::write(path, serialized)?;
    Ok(())
}

impl Store for JsonStore {
    fn actor_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.actor_ids()
    }

    fn actors_by_ids(&self, ids: &[String]) -> Result<Vec<Actor>, StoreError> {
        self.inner.actors_by_ids(ids)
    }

    fn insert_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError> {
        let created = self.inner.insert_actors(actors)?;
        self.persist_actors()?;
        Ok(created)
    }

    fn update_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError> {
        let updated = self.inner.update_actors(actors)?;
        self.persist_actors()?;
        Ok(updated)
    }

    fn vehicle_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.vehicle_ids()
    }

    fn vehicles_by_ids(&self, ids: &[String]) -> Result<Vec<Vehicle>, StoreError> {
        self.inner.vehicles_by_ids(ids)
    }

    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError> {
        let created = self.inner.insert_vehicles(vehicles)?;
        self.persist_vehicles()?;
        Ok(created)
    }

    fn update_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError> {
        let updated = self.inner.update_vehicles(vehicles)?;
        self.persist_vehicles()?;
        Ok(updated)
    }

    fn active_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        self.inner.active_vehicles()
    }

    fn purge_vehicles_deleted_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.inner.purge_vehicles_deleted_before(cutoff)?;
        if purged > 0 {
            self.persist_vehicles()?;
        }
        Ok(purged)
    }

    fn insert_events(&mut self, events: &[Event]) -> Result<usize, StoreError> {
        let created = self.inner.insert_events(events)?;
        self.persist_events()?;
        Ok(created)
    }

    fn event_count(&self) -> Result<usize, StoreError> {
        self.inner.event_count()
    }

    fn events_with_actions(&self, actions: &[&str]) -> Result<Vec<Event>, StoreError> {
        self.inner.events_with_actions(actions)
    }

    fn vehicle_usage_for_actor(&self, actor_id: &str) -> Result<Vec<VehicleUsage>, StoreError> {
        self.inner.vehicle_usage_for_actor(actor_id)
    }
}
