use chrono::NaiveDate;

use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Is `room` free on `date`?
///
/// Per reservation holding the room:
/// - nights between check-in day (inclusive) and checkout day (exclusive) are occupied;
/// - the checkout day is a turnover day: free only once that reservation's
///   cleaning task for this room is completed;
/// - any other day is unconstrained by that reservation.
///
/// Pure: the answer depends on the arguments alone.
pub fn is_room_available(
    room: &str,
    date: NaiveDate,
    reservations: &[Reservation],
    tasks: &[CleaningTask],
) -> bool {
    reservations
        .iter()
        .filter(|r| r.has_room(room))
        .all(|r| !blocks(r, room, date, tasks))
}

fn blocks(reservation: &Reservation, room: &str, date: NaiveDate, tasks: &[CleaningTask]) -> bool {
    let check_in = reservation.check_in.date();
    let check_out = reservation.check_out.date();
    if check_in <= date && date < check_out {
        return true;
    }
    if date == check_out {
        let cleaned = tasks.iter().any(|t| {
            t.reservation_id == reservation.id
                && t.room == room
                && t.cleaning_date == date
                && t.completed
        });
        return !cleaned;
    }
    false
}

/// Every calendar date from `start` to `end`, both inclusive. Empty if `start > end`.
pub fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Availability of each room for each date in `[start, end]`.
pub fn availability_grid(
    rooms: &[String],
    start: NaiveDate,
    end: NaiveDate,
    reservations: &[Reservation],
    tasks: &[CleaningTask],
) -> AvailabilityGrid {
    let dates = dates_in_range(start, end);
    let rooms = rooms
        .iter()
        .map(|room| RoomAvailability {
            room: room.clone(),
            availability: dates
                .iter()
                .map(|d| is_room_available(room, *d, reservations, tasks))
                .collect(),
        })
        .collect();
    AvailabilityGrid { dates, rooms }
}
