use tracing::info;

use crate::model::*;

use super::derive::derive_tasks;
use super::validate::validate_draft;
use super::{Engine, EngineError};

impl Engine {
    /// Store a new reservation and derive its cleaning tasks.
    pub async fn create_reservation(
        &self,
        draft: ReservationDraft,
    ) -> Result<(Reservation, Vec<CleaningTask>), EngineError> {
        let mut reservation = validate_draft(draft, 0)?;
        let _gate = self.compaction_gate.read().await;
        self.claim_slot()?;
        reservation.id = self.reservation_ids.next();
        let tasks = derive_tasks(&reservation, &self.task_ids);

        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
            tasks: tasks.clone(),
        };
        if let Err(e) = self.persist(&event).await {
            self.release_slot();
            return Err(e);
        }
        self.insert_entry(reservation.clone(), tasks.clone());

        metrics::gauge!(crate::observability::RESERVATIONS_ACTIVE).set(self.state.len() as f64);
        info!(
            "reservation {} created: {} room(s), {} cleaning task(s) on {}",
            reservation.id,
            reservation.rooms.len(),
            tasks.len(),
            reservation.checkout_date()
        );
        Ok((reservation, tasks))
    }

    /// Replace every field of a reservation and regenerate its cleaning tasks.
    ///
    /// Regeneration is unconditional: prior tasks are discarded along with their
    /// completion state, even when rooms and dates are unchanged. The swap is a
    /// single event applied under the entry's write lock.
    pub async fn update_reservation(
        &self,
        id: ReservationId,
        draft: ReservationDraft,
    ) -> Result<(Reservation, Vec<CleaningTask>), EngineError> {
        let reservation = validate_draft(draft, id)?;
        let _gate = self.compaction_gate.read().await;
        let rs = self
            .get_reservation_state(&id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let mut guard = rs.write().await;
        // Deleted while we waited for the lock.
        if !self.state.contains_key(&id) {
            return Err(EngineError::ReservationNotFound(id));
        }

        let tasks = derive_tasks(&reservation, &self.task_ids);
        let event = Event::ReservationReplaced {
            reservation: reservation.clone(),
            tasks: tasks.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        info!(
            "reservation {id} updated: {} cleaning task(s) regenerated for {}",
            tasks.len(),
            reservation.checkout_date()
        );
        Ok((reservation, tasks))
    }

    /// Remove a reservation and every cleaning task it owns.
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.read().await;
        let rs = self
            .get_reservation_state(&id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let guard = rs.write().await;
        if !self.state.contains_key(&id) {
            return Err(EngineError::ReservationNotFound(id));
        }

        let event = Event::ReservationDeleted { id };
        self.persist(&event).await?;
        for t in &guard.tasks {
            self.task_index.remove(&t.task_id);
        }
        self.state.remove(&id);
        self.release_slot();
        let dropped = guard.tasks.len();
        drop(guard);

        metrics::gauge!(crate::observability::RESERVATIONS_ACTIVE).set(self.state.len() as f64);
        info!("reservation {id} deleted with {dropped} cleaning task(s)");
        Ok(())
    }

    /// Mark a cleaning task done (or not). Leaves the reservation untouched.
    pub async fn set_task_completion(
        &self,
        task_id: TaskId,
        completed: bool,
    ) -> Result<CleaningTask, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let reservation_id = self
            .reservation_for_task(&task_id)
            .ok_or(EngineError::TaskNotFound(task_id))?;
        let rs = self
            .get_reservation_state(&reservation_id)
            .ok_or(EngineError::TaskNotFound(task_id))?;
        let mut guard = rs.write().await;
        // The task may have been regenerated away while we waited.
        if guard.task(task_id).is_none() || !self.state.contains_key(&reservation_id) {
            return Err(EngineError::TaskNotFound(task_id));
        }

        let event = Event::TaskCompletionSet {
            task_id,
            reservation_id,
            completed,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        if completed {
            metrics::counter!(crate::observability::TASKS_COMPLETED_TOTAL).increment(1);
        }
        info!("cleaning task {task_id} (reservation {reservation_id}) completed={completed}");
        guard
            .task(task_id)
            .cloned()
            .ok_or(EngineError::TaskNotFound(task_id))
    }

    /// Rewrite the journal with only the events needed to recreate current state.
    ///
    /// Holds the compaction gate exclusively so no mutation lands between the
    /// snapshot and the file swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;
        let mut ids: Vec<ReservationId> = self.state.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();

        let mut events = Vec::with_capacity(ids.len() + 1);
        events.push(Event::SequencesAdvanced {
            next_reservation_id: self.reservation_ids.peek(),
            next_task_id: self.task_ids.peek(),
        });
        for id in ids {
            let Some(rs) = self.get_reservation_state(&id) else { continue };
            let guard = rs.read().await;
            events.push(Event::ReservationCreated {
                reservation: guard.reservation.clone(),
                tasks: guard.tasks.clone(),
            });
        }

        let count = events.len();
        self.journal
            .compact(events)
            .await
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.journal.appends_since_compact().await
    }
}
