//! Folds one source unit's raw lines into a deduplicated in-memory batch.

use indexmap::IndexMap;
use tracing::debug;

use crate::logparse::line::{parse_line, Record, DELETE_MARKER};
use crate::model::{Actor, Event, Vehicle};

/// Deduplicated view of one source unit: last observation wins for actors
/// and vehicles, events keep original line order. Owned by exactly one
/// reconciliation call and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub unit_key: String,
    pub actors: IndexMap<String, Actor>,
    pub vehicles: IndexMap<String, Vehicle>,
    pub events: Vec<Event>,
    /// Lines that failed the grammar. Exposed for observability; a high
    /// count never rejects the unit.
    pub skipped_lines: usize,
}

impl Batch {
    /// A batch with no vehicles and no events carried no usable lines.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.events.is_empty()
    }
}

/// Normalize a unit's lines in file order.
pub fn normalize(unit_key: &str, raw_lines: &[String]) -> Batch {
    let mut batch = Batch {
        unit_key: unit_key.to_string(),
        ..Batch::default()
    };

    for (number, raw_line) in raw_lines.iter().enumerate() {
        let Some(record) = parse_line(unit_key, raw_line) else {
            debug!(unit_key, line = number, "skipped malformed line");
            batch.skipped_lines += 1;
            continue;
        };
        match record {
            Record::VehicleInit { mut vehicle, time } => {
                carry_forward_init_time(&batch, &mut vehicle);
                vehicle.last_init_time = Some(time);
                batch.vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
            }
            Record::VehicleDelete { mut vehicle, time } => {
                carry_forward_init_time(&batch, &mut vehicle);
                vehicle.deletion_time = Some(time);
                batch.events.push(Event {
                    event_time: time,
                    actor_id: None,
                    vehicle_id: vehicle.vehicle_id.clone(),
                    action: DELETE_MARKER.to_string(),
                    position: Some(vehicle.position.clone()),
                });
                batch.vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
            }
            Record::ActorAction {
                actor,
                mut vehicle,
                action,
                time,
            } => {
                let actor_id = upsert_actor(&mut batch, actor);
                carry_forward_init_time(&batch, &mut vehicle);
                vehicle.last_use_time = Some(time);
                batch.events.push(Event {
                    event_time: time,
                    actor_id: Some(actor_id),
                    vehicle_id: vehicle.vehicle_id.clone(),
                    action,
                    position: Some(vehicle.position.clone()),
                });
                batch.vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
            }
        }
    }
    batch
}

/// An earlier line in the same unit may have recorded an init time for this
/// vehicle; keep it when later observations overwrite the entry.
fn carry_forward_init_time(batch: &Batch, vehicle: &mut Vehicle) {
    if let Some(existing) = batch.vehicles.get(&vehicle.vehicle_id) {
        vehicle.last_init_time = existing.last_init_time;
    }
}

/// Last-observed-name-wins within a batch: a rename pushes the previous
/// display name into the actor's alternate names.
fn upsert_actor(batch: &mut Batch, observed: Actor) -> String {
    let actor_id = observed.actor_id.clone();
    match batch.actors.get_mut(&actor_id) {
        Some(existing) => existing.note_name(observed.name),
        None => {
            batch.actors.insert(actor_id.clone(), observed);
        }
    }
    actor_id
}

#[cfg(test)]
mod tests {
    use crate::model::VehicleStatus;

    use super::*;

    const UNIT_KEY: &str = "1677952821";

    fn action_line(time: &str, player: &str, steam: &str, action: &str, car_id: &str) -> String {
        format!(
            "{time} Player{{name:{player} steam:{steam} \
             pos:2528.438721 257.033264 9583.657227}} {action} \
             car:<name=(GAZ-59037) type=BTR id={car_id} \
             pos=2528.236328 256.355103 9582.357422 status=[FREE]>"
        )
    }

    fn init_line(time: &str, car_id: &str) -> String {
        format!(
            "{time} car:<name=(GAZ-59037) type=BTR id={car_id} \
             pos=2528.236328 256.355103 9582.357422 status=[LINKED]> initialized."
        )
    }

    fn delete_line(time: &str, car_id: &str) -> String {
        format!(
            "{time} car:<name=(GAZ-59037) type=BTR id={car_id} \
             pos=2528.236328 256.355103 9582.357422 status=[FREE]> DELETED."
        )
    }

    #[test]
    fn init_records_produce_no_events() {
        let batch = normalize(UNIT_KEY, &[init_line("06:00:00", "42")]);
        assert_eq!(batch.events.len(), 0);
        let vehicle = &batch.vehicles["42"];
        assert!(vehicle.last_init_time.is_some());
        assert_eq!(vehicle.status, VehicleStatus::Linked);
    }

    #[test]
    fn later_observation_carries_init_time_forward() {
        let lines = vec![
            init_line("06:00:00", "42"),
            action_line("07:30:00", "Plan", "76561199163269309", "entered vehicle", "42"),
        ];
        let batch = normalize(UNIT_KEY, &lines);
        let vehicle = &batch.vehicles["42"];
        assert!(vehicle.last_init_time.is_some(), "init time survives the action upsert");
        assert!(vehicle.last_use_time.is_some());
        assert_eq!(vehicle.status, VehicleStatus::Free);
    }

    #[test]
    fn delete_appends_actorless_marker_event() {
        let batch = normalize(UNIT_KEY, &[delete_line("21:00:00", "42")]);
        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        assert_eq!(event.actor_id, None);
        assert_eq!(event.action, DELETE_MARKER);
        let vehicle = &batch.vehicles["42"];
        assert_eq!(vehicle.status, VehicleStatus::Deleted);
        assert!(vehicle.deletion_time.is_some());
    }

    #[test]
    fn rename_within_batch_accumulates_alternate_names() {
        let lines = vec![
            action_line("10:00:00", "A", "76561199163269309", "entered vehicle", "42"),
            action_line("10:05:00", "B", "76561199163269309", "left vehicle", "42"),
        ];
        let batch = normalize(UNIT_KEY, &lines);
        assert_eq!(batch.actors.len(), 1);
        let actor = &batch.actors["76561199163269309"];
        assert_eq!(actor.name, "B");
        assert!(actor.alt_names.contains("A"));
    }

    #[test]
    fn skipped_lines_are_counted_not_fatal() {
        let lines = vec![
            "garbage".to_string(),
            init_line("06:00:00", "42"),
            "12:00:00 half a line car:<broken".to_string(),
        ];
        let batch = normalize(UNIT_KEY, &lines);
        assert_eq!(batch.skipped_lines, 2);
        assert_eq!(batch.vehicles.len(), 1);
    }

    #[test]
    fn events_keep_line_order_and_closed_references() {
        let lines = vec![
            action_line("10:00:00", "A", "76561199163269309", "entered vehicle", "42"),
            delete_line("11:00:00", "43"),
            action_line("12:00:00", "B", "76561199000000002", "broke the lock", "42"),
        ];
        let batch = normalize(UNIT_KEY, &lines);
        assert!(batch.events.len() <= lines.len() - batch.skipped_lines);
        assert_eq!(batch.events[0].action, "entered vehicle");
        assert_eq!(batch.events[1].action, DELETE_MARKER);
        assert_eq!(batch.events[2].action, "broke the lock");
        for event in &batch.events {
            assert!(batch.vehicles.contains_key(&event.vehicle_id));
            if let Some(actor_id) = &event.actor_id {
                assert!(batch.actors.contains_key(actor_id));
            }
        }
    }

    #[test]
    fn empty_unit_is_empty_batch() {
        let batch = normalize(UNIT_KEY, &[]);
        assert!(batch.is_empty());
        assert_eq!(batch.skipped_lines, 0);
    }
}
