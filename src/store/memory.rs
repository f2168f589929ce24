//! In-memory store: the reference implementation and test double.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Actor, Event, Vehicle};
use crate::store::{Store, StoreError, VehicleUsage};

/// All collections in process memory, keyed for deterministic iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    pub(crate) actors: BTreeMap<String, Actor>,
    pub(crate) vehicles: BTreeMap<String, Vehicle>,
    pub(crate) events: Vec<Event>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn actor_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.actors.keys().cloned().collect())
    }

    fn actors_by_ids(&self, ids: &[String]) -> Result<Vec<Actor>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.actors.get(id).cloned()).collect())
    }

    fn insert_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError> {
        for actor in actors {
            self.actors.insert(actor.actor_id.clone(), actor.clone());
        }
        Ok(actors.len())
    }

    fn update_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError> {
        for actor in actors {
            if !self.actors.contains_key(&actor.actor_id) {
                return Err(StoreError::MissingReference {
                    kind: "actor",
                    key: actor.actor_id.clone(),
                });
            }
            self.actors.insert(actor.actor_id.clone(), actor.clone());
        }
        Ok(actors.len())
    }

    fn vehicle_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.vehicles.keys().cloned().collect())
    }

    fn vehicles_by_ids(&self, ids: &[String]) -> Result<Vec<Vehicle>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.vehicles.get(id).cloned()).collect())
    }

    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError> {
        for vehicle in vehicles {
            self.vehicles.insert(vehicle.vehicle_id.clone(), vehicle.clone());
        }
        Ok(vehicles.len())
    }

    fn update_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError> {
        for vehicle in vehicles {
            if !self.vehicles.contains_key(&vehicle.vehicle_id) {
                return Err(StoreError::MissingReference {
                    kind: "vehicle",
                    key: vehicle.vehicle_id.clone(),
                });
            }
            self.vehicles.insert(vehicle.vehicle_id.clone(), vehicle.clone());
        }
        Ok(vehicles.len())
    }

    fn active_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.status != crate::model::VehicleStatus::Deleted)
            .cloned()
            .collect())
    }

    fn purge_vehicles_deleted_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.vehicles.len();
        self.vehicles.retain(|_, vehicle| {
            vehicle
                .deletion_time
                .map(|deleted| deleted.with_timezone(&Utc) >= cutoff)
                .unwrap_or(true)
        });
        Ok(before - self.vehicles.len())
    }

    fn insert_events(&mut self, events: &[Event]) -> Result<usize, StoreError> {
        for event in events {
            if let Some(actor_id) = &event.actor_id {
                if !self.actors.contains_key(actor_id) {
                    return Err(StoreError::MissingReference {
                        kind: "actor",
                        key: actor_id.clone(),
                    });
                }
            }
            if !self.vehicles.contains_key(&event.vehicle_id) {
                return Err(StoreError::MissingReference {
                    kind: "vehicle",
                    key: event.vehicle_id.clone(),
                });
            }
        }
        self.events.extend(events.iter().cloned());
        Ok(events.len())
    }

    fn event_count(&self) -> Result<usize, StoreError> {
        Ok(self.events.len())
    }

    fn events_with_actions(&self, actions: &[&str]) -> Result<Vec<Event>, StoreError> {
        let mut matched: Vec<Event> = self
            .events
            .iter()
            .filter(|event| actions.contains(&event.action.as_str()))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.event_time.cmp(&a.event_time));
        Ok(matched)
    }

    fn vehicle_usage_for_actor(&self, actor_id: &str) -> Result<Vec<VehicleUsage>, StoreError> {
        let mut usage: BTreeMap<String, VehicleUsage> = BTreeMap::new();
        for event in self.events.iter().filter(|event| {
            event.actor_id.as_deref() == Some(actor_id)
        }) {
            usage
                .entry(event.vehicle_id.clone())
                .and_modify(|entry| {
                    entry.events += 1;
                    entry.first_event = entry.first_event.min(event.event_time);
                    entry.last_event = entry.last_event.max(event.event_time);
                })
                .or_insert_with(|| VehicleUsage {
                    vehicle_id: event.vehicle_id.clone(),
                    events: 1,
                    first_event: event.event_time,
                    last_event: event.event_time,
                });
        }
        Ok(usage.into_values().collect())
    }
}
