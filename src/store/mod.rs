//! Persisted-state boundary: bulk create/update, key-set lookup, predicate
//! delete/select, and the usage aggregate behind the ownership report.
//!
//! The engine only ever talks to [Store]; [MemoryStore] backs tests and
//! [JsonStore] backs scheduled-job deployments with one JSON snapshot file
//! per collection.

mod json;
mod memory;

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::model::{Actor, Event, Vehicle};

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Store failures are engine-fatal: the orchestrator aborts the remaining
/// units of a run when one surfaces.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown {kind} reference: {key}")]
    MissingReference { kind: &'static str, key: String },
}

/// Per-vehicle usage aggregate for one actor, computed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleUsage {
    pub vehicle_id: String,
    pub events: u64,
    pub first_event: DateTime<FixedOffset>,
    pub last_event: DateTime<FixedOffset>,
}

/// Bulk operations over the persisted collections.
///
/// Upserts are applied as sets so write amplification tracks changed rows,
/// not observed rows. Event insertion resolves its actor (nullable) and
/// vehicle references against the already-upserted collections and fails
/// with [StoreError::MissingReference] on a dangling key.
pub trait Store {
    fn actor_ids(&self) -> Result<HashSet<String>, StoreError>;
    fn actors_by_ids(&self, ids: &[String]) -> Result<Vec<Actor>, StoreError>;
    fn insert_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError>;
    fn update_actors(&mut self, actors: &[Actor]) -> Result<usize, StoreError>;

    fn vehicle_ids(&self) -> Result<HashSet<String>, StoreError>;
    fn vehicles_by_ids(&self, ids: &[String]) -> Result<Vec<Vehicle>, StoreError>;
    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError>;
    fn update_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<usize, StoreError>;
    /// Every vehicle whose status is not `Deleted`.
    fn active_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;
    /// Retention sweep primitive: permanently drop vehicles deleted before
    /// the cutoff. Returns the purged row count.
    fn purge_vehicles_deleted_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    fn insert_events(&mut self, events: &[Event]) -> Result<usize, StoreError>;
    fn event_count(&self) -> Result<usize, StoreError>;
    /// Events whose action matches one of the given labels, newest first.
    fn events_with_actions(&self, actions: &[&str]) -> Result<Vec<Event>, StoreError>;
    /// Count/aggregate of one actor's events grouped by vehicle.
    fn vehicle_usage_for_actor(&self, actor_id: &str) -> Result<Vec<VehicleUsage>, StoreError>;
}
