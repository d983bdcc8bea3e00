use chrono::NaiveDate;

use crate::model::*;

const MS_PER_DAY: i64 = 86_400_000;

/// Nights of `reservation` falling inside the period, rounded up to whole days.
///
/// Both period bounds are taken at 00:00 of their date.
pub fn overlap_nights(reservation: &Reservation, start: NaiveDate, end: NaiveDate) -> i64 {
    let overlap_start = start_of(start).max(reservation.check_in);
    let overlap_end = start_of(end).min(reservation.check_out);
    if overlap_start >= overlap_end {
        return 0;
    }
    let ms = (overlap_end - overlap_start).num_milliseconds();
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

/// Reserved and available room nights over the inclusive period `[start, end]`.
pub fn occupancy(
    reservations: &[Reservation],
    total_rooms: usize,
    start: NaiveDate,
    end: NaiveDate,
) -> OccupancySummary {
    let reserved_room_nights: i64 = reservations
        .iter()
        .map(|r| overlap_nights(r, start, end) * r.distinct_rooms().len() as i64)
        .sum();

    let period_days = ((end - start).num_days() + 1).max(0);
    let available_room_nights = total_rooms as i64 * period_days;
    let occupancy_rate = if available_room_nights > 0 {
        round2(reserved_room_nights as f64 / available_room_nights as f64 * 100.0)
    } else {
        0.0
    };

    OccupancySummary {
        start_date: start,
        end_date: end,
        total_rooms,
        reserved_room_nights,
        available_room_nights,
        occupancy_rate,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
