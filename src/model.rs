//! Persisted entities of the vehicle world view: actors, vehicles, events.
//!
//! Identity keys are the external ids embedded in the log lines (17-digit
//! actor id, server vehicle id). Vehicle ids are reused by the server over
//! time, so a `Deleted` vehicle can later reappear under a fresh status.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A point-in-time position snapshot ("x, y, z", three decimals).
/// Immutable once captured; each copy belongs to the row that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(value: impl Into<String>) -> Self {
        Location(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vehicle lifecycle status as reported by the server log.
///
/// Transitions are observation-driven and unordered (a vehicle may go
/// `Linked` -> `Deleted` directly, and a reused id may leave `Deleted`
/// again). The only engine-initiated transition is
/// [`Vehicle::mark_phantom_deleted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Linked,
    Free,
    Deleted,
}

impl VehicleStatus {
    /// Parse the bracketed status token from a log line. Unknown tokens are
    /// rejected so free-form strings never reach persisted rows.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "LINKED" => Some(VehicleStatus::Linked),
            "FREE" => Some(VehicleStatus::Free),
            "DELETED" => Some(VehicleStatus::Deleted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Linked => "LINKED",
            VehicleStatus::Free => "FREE",
            VehicleStatus::Deleted => "DELETED",
        }
    }

    /// True when a persisted row leaves `Deleted` because the server reused
    /// the vehicle id.
    pub fn is_resurrection(self, observed: VehicleStatus) -> bool {
        self == VehicleStatus::Deleted && observed != VehicleStatus::Deleted
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player observed acting on vehicles. Never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: String,
    pub name: String,
    /// Display names this id was previously seen under. Append-only and
    /// never contains the current name.
    #[serde(default)]
    pub alt_names: BTreeSet<String>,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            actor_id: actor_id.into(),
            name: name.into(),
            alt_names: BTreeSet::new(),
        }
    }

    /// Adopt a newly observed display name. The old name moves into
    /// `alt_names`; the new name is removed from it so the set never holds
    /// the current name.
    pub fn note_name(&mut self, observed: impl Into<String>) {
        let observed = observed.into();
        if observed == self.name {
            return;
        }
        let previous = std::mem::replace(&mut self.name, observed);
        self.alt_names.insert(previous);
        self.alt_names.remove(&self.name);
    }
}

/// A server vehicle row, keyed by the external vehicle id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub name: String,
    pub vehicle_type: String,
    pub position: Location,
    pub status: VehicleStatus,
    #[serde(default)]
    pub last_init_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub last_use_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub deletion_time: Option<DateTime<FixedOffset>>,
}

impl Vehicle {
    /// Engine-initiated transition for vehicles the server stopped
    /// reinitializing. `deletion_time` stays unset when the last init time
    /// was never observed.
    pub fn mark_phantom_deleted(&mut self, deletion_time: Option<DateTime<FixedOffset>>) {
        self.status = VehicleStatus::Deleted;
        self.deletion_time = deletion_time;
    }
}

/// An immutable observed fact. Events are append-only: vehicle purges never
/// cascade into the event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_time: DateTime<FixedOffset>,
    /// Absent for server-side deletion events.
    #[serde(default)]
    pub actor_id: Option<String>,
    pub vehicle_id: String,
    pub action: String,
    #[serde(default)]
    pub position: Option<Location>,
}
