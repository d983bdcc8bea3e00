use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::model::*;

/// Days ahead (inclusive) covered by the upcoming-cleaning view.
pub const UPCOMING_WINDOW_DAYS: u64 = 7;

/// Rooms to clean per checkout day, sorted by date. With a range, only
/// checkouts on `start..=end` count.
pub fn cleaning_load(
    reservations: &[Reservation],
    range: Option<(NaiveDate, NaiveDate)>,
) -> Vec<CleaningLoad> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for r in reservations {
        let day = r.checkout_date();
        if let Some((start, end)) = range
            && (day < start || day > end)
        {
            continue;
        }
        *per_day.entry(day).or_default() += r.distinct_rooms().len();
    }
    per_day
        .into_iter()
        .map(|(date, rooms)| CleaningLoad {
            date,
            rooms,
            band: LoadBand::for_rooms(rooms),
        })
        .collect()
}

/// Tasks due between `today` and `today + UPCOMING_WINDOW_DAYS`, grouped by
/// reservation and ordered by cleaning date.
pub fn upcoming_cleanings(
    today: NaiveDate,
    reservations: &[Reservation],
    tasks: &[CleaningTask],
) -> Vec<UpcomingCleaning> {
    let horizon = today
        .checked_add_days(Days::new(UPCOMING_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX);

    let mut groups: BTreeMap<ReservationId, Vec<CleaningTask>> = BTreeMap::new();
    for task in tasks {
        if task.cleaning_date >= today && task.cleaning_date <= horizon {
            groups.entry(task.reservation_id).or_default().push(task.clone());
        }
    }

    let mut upcoming: Vec<UpcomingCleaning> = groups
        .into_iter()
        .filter_map(|(reservation_id, mut tasks)| {
            tasks.sort_by_key(|t| (t.cleaning_date, t.task_id));
            let cleaning_date = tasks.first()?.cleaning_date;
            let customer_name = reservations
                .iter()
                .find(|r| r.id == reservation_id)
                .map(|r| r.customer_name.clone());
            Some(UpcomingCleaning {
                reservation_id,
                customer_name,
                cleaning_date,
                tasks,
            })
        })
        .collect();
    upcoming.sort_by_key(|g| (g.cleaning_date, g.reservation_id));
    upcoming
}
