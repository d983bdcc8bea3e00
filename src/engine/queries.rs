use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::availability::availability_grid;
use super::housekeeping::{cleaning_load, upcoming_cleanings};
use super::occupancy::occupancy;
use super::{Engine, EngineError};

/// Reservations and tasks read together. Each reservation's tasks were read
/// under the same lock as the reservation itself.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Sorted by id.
    pub reservations: Vec<Reservation>,
    /// Sorted by task id.
    pub tasks: Vec<CleaningTask>,
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), EngineError> {
    if start > end {
        return Err(EngineError::Validation("start date must not be after end date"));
    }
    if (end - start).num_days() + 1 > MAX_QUERY_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

impl Engine {
    pub async fn snapshot(&self) -> Snapshot {
        let entries: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut snap = Snapshot::default();
        for rs in entries {
            let guard = rs.read().await;
            snap.reservations.push(guard.reservation.clone());
            snap.tasks.extend(guard.tasks.iter().cloned());
        }
        snap.reservations.sort_by_key(|r| r.id);
        snap.tasks.sort_by_key(|t| t.task_id);
        snap
    }

    pub async fn list_reservations(&self) -> Vec<Reservation> {
        self.snapshot().await.reservations
    }

    pub async fn list_tasks(&self) -> Vec<CleaningTask> {
        self.snapshot().await.tasks
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        let rs = self
            .get_reservation_state(&id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.reservation.clone())
    }

    pub async fn tasks_for_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Vec<CleaningTask>, EngineError> {
        let rs = self
            .get_reservation_state(&id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.tasks.clone())
    }

    /// Availability of `rooms` for every date in `[start, end]`.
    pub async fn room_availability(
        &self,
        rooms: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AvailabilityGrid, EngineError> {
        check_range(start, end)?;
        let snap = self.snapshot().await;
        Ok(availability_grid(rooms, start, end, &snap.reservations, &snap.tasks))
    }

    /// Occupancy over the standard period of `period` type beginning on `start`.
    pub async fn occupancy_summary(
        &self,
        total_rooms: usize,
        period: PeriodType,
        start: NaiveDate,
    ) -> Result<OccupancySummary, EngineError> {
        let end = period
            .end_date(start)
            .ok_or(EngineError::Validation("period end out of range"))?;
        let reservations = self.list_reservations().await;
        Ok(occupancy(&reservations, total_rooms, start, end))
    }

    /// Rooms to clean per checkout day, optionally limited to `[start, end]`.
    pub async fn cleaning_load(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<CleaningLoad>, EngineError> {
        if let Some((start, end)) = range {
            check_range(start, end)?;
        }
        let reservations = self.list_reservations().await;
        Ok(cleaning_load(&reservations, range))
    }

    pub async fn upcoming_cleanings(&self, today: NaiveDate) -> Vec<UpcomingCleaning> {
        let snap = self.snapshot().await;
        upcoming_cleanings(today, &snap.reservations, &snap.tasks)
    }
}
