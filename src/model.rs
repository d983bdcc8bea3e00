use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub type ReservationId = u64;
pub type TaskId = u64;

/// Check-in/check-out wire format: local time, minute precision, no offset.
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";
const STAMP_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

pub fn parse_stamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, STAMP_FORMAT_SECONDS))
        .ok()
}

/// Serde adapter for `NaiveDateTime` in `STAMP_FORMAT`.
pub mod stamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(super::STAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_stamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::super::parse_stamp(raw.trim())
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
            }
        }
    }
}

/// A guest reservation covering one or more rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub rooms: Vec<String>,
    #[serde(with = "stamp")]
    pub check_in: NaiveDateTime,
    #[serde(with = "stamp")]
    pub check_out: NaiveDateTime,
}

impl Reservation {
    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.iter().any(|r| r == room)
    }

    /// Rooms in first-seen order with repeats dropped.
    pub fn distinct_rooms(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.rooms.len());
        for room in &self.rooms {
            if !seen.contains(&room.as_str()) {
                seen.push(room);
            }
        }
        seen
    }

    pub fn checkout_date(&self) -> NaiveDate {
        self.check_out.date()
    }
}

/// Client-submitted reservation body. Every field is optional on the wire so
/// missing data is reported as a validation error instead of a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDraft {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rooms: Option<Vec<String>>,
    #[serde(default, with = "stamp::option")]
    pub check_in: Option<NaiveDateTime>,
    #[serde(default, with = "stamp::option")]
    pub check_out: Option<NaiveDateTime>,
}

/// A room that must be turned over on its reservation's checkout day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningTask {
    pub task_id: TaskId,
    pub room: String,
    pub cleaning_date: NaiveDate,
    pub reservation_id: ReservationId,
    pub completed: bool,
}

/// A reservation together with the cleaning tasks it owns.
#[derive(Debug, Clone)]
pub struct ReservationState {
    pub reservation: Reservation,
    /// Sorted by `task_id`.
    pub tasks: Vec<CleaningTask>,
}

impl ReservationState {
    pub fn new(reservation: Reservation, tasks: Vec<CleaningTask>) -> Self {
        let mut rs = Self { reservation, tasks };
        rs.tasks.sort_by_key(|t| t.task_id);
        rs
    }

    pub fn id(&self) -> ReservationId {
        self.reservation.id
    }

    /// Swap in a new reservation body and its freshly derived tasks.
    /// Returns the tasks that were discarded.
    pub fn replace(&mut self, reservation: Reservation, tasks: Vec<CleaningTask>) -> Vec<CleaningTask> {
        self.reservation = reservation;
        let mut tasks = tasks;
        tasks.sort_by_key(|t| t.task_id);
        std::mem::replace(&mut self.tasks, tasks)
    }

    pub fn task(&self, task_id: TaskId) -> Option<&CleaningTask> {
        self.tasks
            .binary_search_by_key(&task_id, |t| t.task_id)
            .ok()
            .map(|pos| &self.tasks[pos])
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut CleaningTask> {
        self.tasks
            .binary_search_by_key(&task_id, |t| t.task_id)
            .ok()
            .map(move |pos| &mut self.tasks[pos])
    }
}

/// The event types. This is the WAL record format.
///
/// Tasks travel inside the reservation events so that replay reproduces the
/// exact task ids handed out at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
        tasks: Vec<CleaningTask>,
    },
    ReservationReplaced {
        reservation: Reservation,
        tasks: Vec<CleaningTask>,
    },
    ReservationDeleted {
        id: ReservationId,
    },
    TaskCompletionSet {
        task_id: TaskId,
        reservation_id: ReservationId,
        completed: bool,
    },
    /// Written at the head of a compacted WAL so ids are never reused.
    SequencesAdvanced {
        next_reservation_id: ReservationId,
        next_task_id: TaskId,
    },
}

// ── Reporting periods ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Week,
    Month,
    Semiannual,
    Year,
}

impl PeriodType {
    /// Inclusive last day of a period beginning on `start`.
    pub fn end_date(self, start: NaiveDate) -> Option<NaiveDate> {
        let after = match self {
            PeriodType::Week => return start.checked_add_days(chrono::Days::new(6)),
            PeriodType::Month => start.checked_add_months(Months::new(1))?,
            PeriodType::Semiannual => start.checked_add_months(Months::new(6))?,
            PeriodType::Year => start.checked_add_months(Months::new(12))?,
        };
        // Month arithmetic clamps to month end (Jan 31 + 1 month = Feb 28), in
        // which case the clamped day already closes the period.
        if after.day() < start.day() {
            Some(after)
        } else {
            after.pred_opt()
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodType::Week => "week",
            PeriodType::Month => "month",
            PeriodType::Semiannual => "semiannual",
            PeriodType::Year => "year",
        };
        f.write_str(s)
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" | "weekly" => Ok(PeriodType::Week),
            "month" | "monthly" => Ok(PeriodType::Month),
            "semiannual" | "semi-annual" => Ok(PeriodType::Semiannual),
            "year" | "yearly" => Ok(PeriodType::Year),
            other => Err(format!("unknown period type: {other}")),
        }
    }
}

/// Midnight at the start of `date`.
pub fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_rooms: usize,
    pub reserved_room_nights: i64,
    pub available_room_nights: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAvailability {
    pub room: String,
    /// One flag per entry of `AvailabilityGrid::dates`.
    pub availability: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityGrid {
    pub dates: Vec<NaiveDate>,
    pub rooms: Vec<RoomAvailability>,
}

/// How busy housekeeping is on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBand {
    Light,
    Moderate,
    Heavy,
    Overflow,
}

impl LoadBand {
    pub fn for_rooms(count: usize) -> Self {
        match count {
            0..=9 => LoadBand::Light,
            10..=20 => LoadBand::Moderate,
            21..=30 => LoadBand::Heavy,
            _ => LoadBand::Overflow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningLoad {
    pub date: NaiveDate,
    pub rooms: usize,
    pub band: LoadBand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingCleaning {
    pub reservation_id: ReservationId,
    pub customer_name: Option<String>,
    pub cleaning_date: NaiveDate,
    pub tasks: Vec<CleaningTask>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn reservation(rooms: &[&str]) -> Reservation {
        Reservation {
            id: 1,
            customer_name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
            rooms: rooms.iter().map(|r| r.to_string()).collect(),
            check_in: parse_stamp("2025-03-01T16:00").unwrap(),
            check_out: parse_stamp("2025-03-03T11:00").unwrap(),
        }
    }

    #[test]
    fn stamp_accepts_minutes_and_seconds() {
        let a = parse_stamp("2025-03-01T16:00").unwrap();
        let b = parse_stamp("2025-03-01T16:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_stamp("2025-03-01").is_none());
        assert!(parse_stamp("garbage").is_none());
    }

    #[test]
    fn reservation_wire_shape() {
        let json = serde_json::to_value(reservation(&["105"])).unwrap();
        assert_eq!(json["customerName"], "Ada");
        assert_eq!(json["checkIn"], "2025-03-01T16:00");
        assert_eq!(json["checkOut"], "2025-03-03T11:00");
        assert_eq!(json["rooms"][0], "105");
    }

    #[test]
    fn task_wire_shape() {
        let task = CleaningTask {
            task_id: 7,
            room: "105".into(),
            cleaning_date: date("2025-03-03"),
            reservation_id: 1,
            completed: false,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["taskId"], 7);
        assert_eq!(json["cleaningDate"], "2025-03-03");
        assert_eq!(json["reservationId"], 1);
        assert_eq!(json["completed"], false);
    }

    #[test]
    fn draft_tolerates_missing_and_blank_fields() {
        let draft: ReservationDraft =
            serde_json::from_str(r#"{"customerName":"Ada","checkIn":""}"#).unwrap();
        assert_eq!(draft.customer_name.as_deref(), Some("Ada"));
        assert!(draft.check_in.is_none());
        assert!(draft.check_out.is_none());
        assert!(draft.rooms.is_none());
    }

    #[test]
    fn draft_rejects_malformed_stamp() {
        let result = serde_json::from_str::<ReservationDraft>(r#"{"checkOut":"03/03/2025"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn distinct_rooms_keeps_first_occurrence() {
        let r = reservation(&["105", "107", "105", "109"]);
        assert_eq!(r.distinct_rooms(), vec!["105", "107", "109"]);
        assert!(r.has_room("107"));
        assert!(!r.has_room("110"));
    }

    #[test]
    fn period_end_dates() {
        let start = date("2025-03-01");
        assert_eq!(PeriodType::Week.end_date(start), Some(date("2025-03-07")));
        assert_eq!(PeriodType::Month.end_date(start), Some(date("2025-03-31")));
        assert_eq!(PeriodType::Semiannual.end_date(start), Some(date("2025-08-31")));
        assert_eq!(PeriodType::Year.end_date(start), Some(date("2026-02-28")));
    }

    #[test]
    fn period_end_clamps_short_months() {
        assert_eq!(
            PeriodType::Month.end_date(date("2025-01-31")),
            Some(date("2025-02-28"))
        );
        assert_eq!(
            PeriodType::Month.end_date(date("2025-01-15")),
            Some(date("2025-02-14"))
        );
    }

    #[test]
    fn period_type_parsing() {
        assert_eq!("week".parse::<PeriodType>(), Ok(PeriodType::Week));
        assert_eq!("Monthly".parse::<PeriodType>(), Ok(PeriodType::Month));
        assert_eq!("semi-annual".parse::<PeriodType>(), Ok(PeriodType::Semiannual));
        assert_eq!("year".parse::<PeriodType>(), Ok(PeriodType::Year));
        assert!("fortnight".parse::<PeriodType>().is_err());
    }

    #[test]
    fn load_bands() {
        assert_eq!(LoadBand::for_rooms(0), LoadBand::Light);
        assert_eq!(LoadBand::for_rooms(9), LoadBand::Light);
        assert_eq!(LoadBand::for_rooms(10), LoadBand::Moderate);
        assert_eq!(LoadBand::for_rooms(20), LoadBand::Moderate);
        assert_eq!(LoadBand::for_rooms(21), LoadBand::Heavy);
        assert_eq!(LoadBand::for_rooms(30), LoadBand::Heavy);
        assert_eq!(LoadBand::for_rooms(31), LoadBand::Overflow);
    }

    #[test]
    fn replace_returns_discarded_tasks() {
        let r = reservation(&["105"]);
        let old = CleaningTask {
            task_id: 1,
            room: "105".into(),
            cleaning_date: date("2025-03-03"),
            reservation_id: 1,
            completed: true,
        };
        let mut rs = ReservationState::new(r.clone(), vec![old.clone()]);
        let new = CleaningTask { task_id: 2, completed: false, ..old.clone() };
        let dropped = rs.replace(r, vec![new]);
        assert_eq!(dropped, vec![old]);
        assert!(rs.task(1).is_none());
        assert!(!rs.task(2).unwrap().completed);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            reservation: reservation(&["105", "107"]),
            tasks: vec![CleaningTask {
                task_id: 1,
                room: "105".into(),
                cleaning_date: date("2025-03-03"),
                reservation_id: 1,
                completed: false,
            }],
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
