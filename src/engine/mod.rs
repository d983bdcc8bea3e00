mod availability;
mod derive;
mod error;
mod housekeeping;
mod mutations;
mod occupancy;
mod queries;
mod validate;

pub use availability::{availability_grid, dates_in_range, is_room_available};
pub use derive::{derive_tasks, Sequence};
pub use error::EngineError;
pub use housekeeping::{cleaning_load, upcoming_cleanings, UPCOMING_WINDOW_DAYS};
pub use occupancy::{occupancy, overlap_nights};
pub use queries::Snapshot;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::journal::{Journal, MemoryJournal, WalJournal};
use crate::limits::MAX_RESERVATIONS;
use crate::model::*;
use crate::wal::Wal;

pub type SharedReservationState = Arc<RwLock<ReservationState>>;

/// Owns reservations and their cleaning tasks.
///
/// Each reservation lives behind its own lock together with its tasks, so a
/// reader always sees a reservation and a task set that belong together.
pub struct Engine {
    pub(super) state: DashMap<ReservationId, SharedReservationState>,
    /// Reverse lookup: task id → owning reservation id.
    pub(super) task_index: DashMap<TaskId, ReservationId>,
    pub(super) journal: Box<dyn Journal>,
    pub(super) reservation_ids: Sequence,
    pub(super) task_ids: Sequence,
    /// Mutations hold this shared (taken before any entry lock); compaction holds it exclusively.
    pub(super) compaction_gate: RwLock<()>,
    /// Reservations stored plus creates in flight. Never exceeds `max_reservations`.
    pub(super) slots: AtomicUsize,
    pub(super) max_reservations: usize,
}

/// Apply an in-place event to a reservation entry (caller holds the write lock).
fn apply_to_reservation(
    rs: &mut ReservationState,
    event: &Event,
    task_index: &DashMap<TaskId, ReservationId>,
) {
    match event {
        Event::ReservationReplaced { reservation, tasks } => {
            for old in rs.replace(reservation.clone(), tasks.clone()) {
                task_index.remove(&old.task_id);
            }
            for t in tasks {
                task_index.insert(t.task_id, reservation.id);
            }
        }
        Event::TaskCompletionSet { task_id, completed, .. } => {
            if let Some(task) = rs.task_mut(*task_id) {
                task.completed = *completed;
            }
        }
        // Created/Deleted are handled at the DashMap level, sequences at the engine level
        Event::ReservationCreated { .. }
        | Event::ReservationDeleted { .. }
        | Event::SequencesAdvanced { .. } => {}
    }
}

impl Engine {
    /// Durable engine: replays the WAL at `wal_path`, then journals to it.
    /// Must be called inside a tokio runtime (spawns the WAL writer).
    pub fn new(wal_path: &Path) -> std::io::Result<Self> {
        let events = Wal::replay(wal_path)?;
        let journal = WalJournal::open(wal_path)?;
        let engine = Self::with_journal(Box::new(journal));
        engine.replay(&events);
        tracing::info!(
            "replayed {} events from {}: {} reservations",
            events.len(),
            wal_path.display(),
            engine.state.len()
        );
        Ok(engine)
    }

    /// Engine with nothing persisted.
    pub fn in_memory() -> Self {
        Self::with_journal(Box::new(MemoryJournal::new()))
    }

    pub fn with_journal(journal: Box<dyn Journal>) -> Self {
        Self {
            state: DashMap::new(),
            task_index: DashMap::new(),
            journal,
            reservation_ids: Sequence::starting_at(1),
            task_ids: Sequence::starting_at(1),
            compaction_gate: RwLock::new(()),
            slots: AtomicUsize::new(0),
            max_reservations: MAX_RESERVATIONS,
        }
    }

    /// Rebuild in-memory state from a journal history.
    ///
    /// We're the sole owner of these Arcs, so try_write always succeeds. Never
    /// use blocking_write here: this may run inside an async context.
    pub fn replay(&self, events: &[Event]) {
        for event in events {
            match event {
                Event::ReservationCreated { reservation, tasks } => {
                    self.insert_entry(reservation.clone(), tasks.clone());
                }
                Event::ReservationDeleted { id } => {
                    self.remove_entry(id);
                }
                Event::SequencesAdvanced { next_reservation_id, next_task_id } => {
                    self.reservation_ids.observe(next_reservation_id.saturating_sub(1));
                    self.task_ids.observe(next_task_id.saturating_sub(1));
                }
                other => {
                    let Some(id) = event_reservation_id(other) else { continue };
                    let Some(entry) = self.get_reservation_state(&id) else {
                        tracing::warn!("replay: event for unknown reservation {id}");
                        continue;
                    };
                    let Ok(mut guard) = entry.try_write() else {
                        tracing::warn!("replay: reservation {id} unexpectedly locked");
                        continue;
                    };
                    if let Event::ReservationReplaced { tasks, .. } = other {
                        self.observe_tasks(tasks);
                    }
                    apply_to_reservation(&mut guard, other, &self.task_index);
                }
            }
        }
        self.slots.store(self.state.len(), Ordering::SeqCst);
        metrics::gauge!(crate::observability::RESERVATIONS_ACTIVE).set(self.state.len() as f64);
    }

    /// Take a slot for a new reservation, or fail if the store is full.
    pub(super) fn claim_slot(&self) -> Result<(), EngineError> {
        self.slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_reservations).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| EngineError::LimitExceeded("too many reservations"))
    }

    pub(super) fn release_slot(&self) {
        self.slots.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn get_reservation_state(&self, id: &ReservationId) -> Option<SharedReservationState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn reservation_for_task(&self, task_id: &TaskId) -> Option<ReservationId> {
        self.task_index.get(task_id).map(|e| *e.value())
    }

    pub fn reservation_count(&self) -> usize {
        self.state.len()
    }

    /// Journal the event; only on success is it applied to memory.
    pub(super) async fn persist(&self, event: &Event) -> Result<(), EngineError> {
        self.journal
            .append(event)
            .await
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Journal + apply an in-place event in one call.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut ReservationState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.persist(event).await?;
        apply_to_reservation(rs, event, &self.task_index);
        Ok(())
    }

    pub(super) fn insert_entry(&self, reservation: Reservation, tasks: Vec<CleaningTask>) {
        let id = reservation.id;
        self.reservation_ids.observe(id);
        self.observe_tasks(&tasks);
        for t in &tasks {
            self.task_index.insert(t.task_id, id);
        }
        let rs = ReservationState::new(reservation, tasks);
        self.state.insert(id, Arc::new(RwLock::new(rs)));
    }

    pub(super) fn remove_entry(&self, id: &ReservationId) {
        if let Some((_, entry)) = self.state.remove(id) {
            match entry.try_read() {
                Ok(guard) => {
                    for t in &guard.tasks {
                        self.task_index.remove(&t.task_id);
                    }
                }
                Err(_) => self.task_index.retain(|_, rid| rid != id),
            }
        }
    }

    fn observe_tasks(&self, tasks: &[CleaningTask]) {
        if let Some(max) = tasks.iter().map(|t| t.task_id).max() {
            self.task_ids.observe(max);
        }
    }
}

/// Extract the reservation an in-place event targets.
fn event_reservation_id(event: &Event) -> Option<ReservationId> {
    match event {
        Event::ReservationReplaced { reservation, .. } => Some(reservation.id),
        Event::TaskCompletionSet { reservation_id, .. } => Some(*reservation_id),
        Event::ReservationCreated { .. }
        | Event::ReservationDeleted { .. }
        | Event::SequencesAdvanced { .. } => None,
    }
}
