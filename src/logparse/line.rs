//! Stateless line parser for the vehicle activity log grammar.
//!
//! One logical record per line:
//! `HH:MM:SS [Player{name:N steam:ID pos:X Y Z} action text ]car:<name=(N)
//! type=T id=I pos=X Y Z status=[S]>[ initialized.| DELETED.]`
//!
//! Parsing is a pure function of the source unit key and the line; any
//! missing piece yields `None` and the caller counts the skip.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Actor, Location, Vehicle, VehicleStatus};

/// Trailing marker of server-side vehicle initialization lines.
pub const INIT_SUFFIX: &str = "initialized.";
/// Trailing marker of server-side vehicle deletion lines; also the action
/// label recorded on the deletion event.
pub const DELETE_MARKER: &str = "DELETED.";

/// Log times are server-local, a fixed UTC+3.
const LOG_UTC_OFFSET_SECS: i32 = 3 * 3600;

static CAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"car:<.*>").expect("car regex"));
static CAR_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"name=\((.*)\) type=").expect("car name regex"));
static CAR_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"type=(.*) id=").expect("car type regex"));
static CAR_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"id=(\d+)").expect("car id regex"));
static CAR_POS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pos=((?:\d*\.\d{6}\s){3})").expect("car pos regex"));
static CAR_STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"status=\[(.*)\]").expect("car status regex"));

static PLAYER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Player\{.*\.\d{6}\}\s").expect("player regex"));
static PLAYER_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"steam:([0-9]{17})").expect("player id regex"));
static PLAYER_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"name:(.*) steam:").expect("player name regex"));

static ACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\d{6}\}\s(.*)\scar:").expect("action regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5]?[0-9]):([0-5]?[0-9])").expect("time regex"));

static LOG_OFFSET: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(LOG_UTC_OFFSET_SECS).expect("utc+3 offset"));

/// One successfully parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Server (re)initialized a vehicle. Not a user-visible action.
    VehicleInit {
        vehicle: Vehicle,
        time: DateTime<FixedOffset>,
    },
    /// Server dropped a vehicle; status is already forced to `Deleted`.
    VehicleDelete {
        vehicle: Vehicle,
        time: DateTime<FixedOffset>,
    },
    /// A player acted on a vehicle.
    ActorAction {
        actor: Actor,
        vehicle: Vehicle,
        action: String,
        time: DateTime<FixedOffset>,
    },
}

/// Calendar date a unit key names: the key is a Unix timestamp string,
/// interpreted in UTC. Non-numeric keys are not units.
pub fn unit_date(unit_key: &str) -> Option<NaiveDate> {
    if unit_key.is_empty() || !unit_key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs = unit_key.parse::<i64>().ok()?;
    Some(DateTime::<Utc>::from_timestamp(secs, 0)?.date_naive())
}

/// Absolute event time: the unit's calendar date combined with the line's
/// leading `HH:MM:SS` token, at the server's fixed UTC+3 offset.
fn action_time(unit_key: &str, line: &str) -> Option<DateTime<FixedOffset>> {
    let date = unit_date(unit_key)?;
    let caps = TIME_RE.captures(line)?;
    let hour = caps[1].parse().ok()?;
    let minute = caps[2].parse().ok()?;
    let second = caps[3].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    LOG_OFFSET.from_local_datetime(&date.and_time(time)).single()
}

/// Extract the vehicle descriptor. Position components carry six decimals
/// in the log and are truncated to three for storage.
fn parse_vehicle(line: &str) -> Option<Vehicle> {
    let descriptor = CAR_RE.find(line)?.as_str();
    let name = CAR_NAME_RE.captures(descriptor)?.get(1)?.as_str().to_string();
    let vehicle_type = CAR_TYPE_RE.captures(descriptor)?.get(1)?.as_str().to_string();
    let vehicle_id = CAR_ID_RE.captures(descriptor)?.get(1)?.as_str().to_string();
    let raw_position = CAR_POS_RE.captures(descriptor)?.get(1)?.as_str();
    let position = raw_position
        .split_whitespace()
        .map(|component| &component[..component.len() - 3])
        .collect::<Vec<_>>()
        .join(", ");
    let status = VehicleStatus::parse(CAR_STATUS_RE.captures(descriptor)?.get(1)?.as_str())?;
    Some(Vehicle {
        vehicle_id,
        name,
        vehicle_type,
        position: Location::new(position),
        status,
        last_init_time: None,
        last_use_time: None,
        deletion_time: None,
    })
}

fn parse_actor(line: &str) -> Option<Actor> {
    let descriptor = PLAYER_RE.find(line)?.as_str();
    let actor_id = PLAYER_ID_RE.captures(descriptor)?.get(1)?.as_str();
    let name = PLAYER_NAME_RE.captures(descriptor)?.get(1)?.as_str();
    Some(Actor::new(actor_id, name))
}

/// Action text sits between the actor descriptor and the vehicle descriptor.
fn parse_action(line: &str) -> Option<String> {
    Some(ACTION_RE.captures(line)?.get(1)?.as_str().to_string())
}

/// Parse one raw line of the given source unit into a typed [Record].
/// Returns `None` for lines that fail the grammar; the caller counts and
/// logs these with the line's ordinal.
pub fn parse_line(unit_key: &str, raw_line: &str) -> Option<Record> {
    let line = raw_line.trim();
    let mut vehicle = parse_vehicle(line)?;
    let time = action_time(unit_key, line)?;
    if line.ends_with(INIT_SUFFIX) {
        return Some(Record::VehicleInit { vehicle, time });
    }
    if line.ends_with(DELETE_MARKER) {
        vehicle.status = VehicleStatus::Deleted;
        return Some(Record::VehicleDelete { vehicle, time });
    }
    let actor = parse_actor(line)?;
    let action = parse_action(line)?;
    Some(Record::ActorAction {
        actor,
        vehicle,
        action,
        time,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const UNIT_KEY: &str = "1677952821"; // 2023-03-04 UTC

    const ACTION_LINE: &str = "22:38:00 Player{name:Plan steam:76561199163269309 \
        pos:2528.438721 257.033264 9583.657227} entered vehicle \
        car:<name=(GAZ-59037) type=BTR id=746019054 \
        pos=2528.236328 256.355103 9582.357422 status=[FREE]>";

    const INIT_LINE: &str = "06:01:10 car:<name=(Sarka-120) type=CAR id=12017 \
        pos=101.000001 2.000002 303.000003 status=[LINKED]> initialized.";

    const DELETE_LINE: &str = "23:59:59 car:<name=(Sarka-120) type=CAR id=12017 \
        pos=101.000001 2.000002 303.000003 status=[FREE]> DELETED.";

    fn expected_time(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 3, 4, h, m, s)
            .unwrap()
    }

    #[test]
    fn action_line_parses_actor_vehicle_and_action() {
        let record = parse_line(UNIT_KEY, ACTION_LINE).expect("record");
        let Record::ActorAction {
            actor,
            vehicle,
            action,
            time,
        } = record
        else {
            panic!("expected ActorAction");
        };
        assert_eq!(actor.actor_id, "76561199163269309");
        assert_eq!(actor.name, "Plan");
        assert_eq!(vehicle.vehicle_id, "746019054");
        assert_eq!(vehicle.name, "GAZ-59037");
        assert_eq!(vehicle.vehicle_type, "BTR");
        assert_eq!(vehicle.status, VehicleStatus::Free);
        assert_eq!(action, "entered vehicle");
        assert_eq!(time, expected_time(22, 38, 0));
    }

    #[test]
    fn position_components_are_truncated_to_three_decimals() {
        let record = parse_line(UNIT_KEY, ACTION_LINE).expect("record");
        let Record::ActorAction { vehicle, .. } = record else {
            panic!("expected ActorAction");
        };
        assert_eq!(vehicle.position.as_str(), "2528.236, 256.355, 9582.357");
    }

    #[test]
    fn init_line_yields_vehicle_init() {
        let record = parse_line(UNIT_KEY, INIT_LINE).expect("record");
        let Record::VehicleInit { vehicle, time } = record else {
            panic!("expected VehicleInit");
        };
        assert_eq!(vehicle.vehicle_id, "12017");
        assert_eq!(vehicle.status, VehicleStatus::Linked);
        assert_eq!(time, expected_time(6, 1, 10));
    }

    #[test]
    fn delete_line_forces_deleted_status() {
        let record = parse_line(UNIT_KEY, DELETE_LINE).expect("record");
        let Record::VehicleDelete { vehicle, time } = record else {
            panic!("expected VehicleDelete");
        };
        assert_eq!(vehicle.status, VehicleStatus::Deleted);
        assert_eq!(time, expected_time(23, 59, 59));
    }

    #[test]
    fn line_without_vehicle_descriptor_is_skipped() {
        assert_eq!(parse_line(UNIT_KEY, "22:38:00 AdminLog connected"), None);
    }

    #[test]
    fn line_with_malformed_time_is_skipped() {
        let line = "99:99:00 car:<name=(X) type=CAR id=1 \
            pos=1.000000 2.000000 3.000000 status=[FREE]> initialized.";
        assert_eq!(parse_line(UNIT_KEY, line), None);
    }

    #[test]
    fn unknown_status_token_is_skipped() {
        let line = "10:00:00 car:<name=(X) type=CAR id=1 \
            pos=1.000000 2.000000 3.000000 status=[PARKED]> initialized.";
        assert_eq!(parse_line(UNIT_KEY, line), None);
    }

    #[test]
    fn action_line_without_actor_descriptor_is_skipped() {
        let line = "10:00:00 somebody towed car:<name=(X) type=CAR id=1 \
            pos=1.000000 2.000000 3.000000 status=[FREE]>";
        assert_eq!(parse_line(UNIT_KEY, line), None);
    }

    #[test]
    fn non_numeric_unit_key_has_no_date() {
        assert_eq!(unit_date("backups"), None);
        assert_eq!(unit_date(""), None);
        assert!(unit_date(UNIT_KEY).is_some());
    }

    #[test]
    fn parsing_is_pure() {
        assert_eq!(parse_line(UNIT_KEY, ACTION_LINE), parse_line(UNIT_KEY, ACTION_LINE));
    }

    #[test]
    fn crlf_and_padding_are_trimmed() {
        let padded = format!("{INIT_LINE}\r");
        assert_eq!(parse_line(UNIT_KEY, &padded), parse_line(UNIT_KEY, INIT_LINE));
    }
}
