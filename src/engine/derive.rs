use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::*;

/// Monotonic id source. Ids are never handed out twice, even when the
/// operation that drew them fails afterwards.
#[derive(Debug)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub fn starting_at(next: u64) -> Self {
        Self(AtomicU64::new(next.max(1)))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Move the sequence forward so that `next()` returns something greater than `seen`.
    pub fn observe(&self, seen: u64) {
        self.0.fetch_max(seen.saturating_add(1), Ordering::SeqCst);
    }
}

/// One pending cleaning task per distinct room, due on the checkout date.
pub fn derive_tasks(reservation: &Reservation, task_ids: &Sequence) -> Vec<CleaningTask> {
    let cleaning_date = reservation.checkout_date();
    reservation
        .distinct_rooms()
        .into_iter()
        .map(|room| CleaningTask {
            task_id: task_ids.next(),
            room: room.to_string(),
            cleaning_date,
            reservation_id: reservation.id,
            completed: false,
        })
        .collect()
}
