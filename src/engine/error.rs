use crate::model::{ReservationId, TaskId};

#[derive(Debug)]
pub enum EngineError {
    ReservationNotFound(ReservationId),
    TaskNotFound(TaskId),
    /// A required field is missing or malformed.
    Validation(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::ReservationNotFound(_) | EngineError::TaskNotFound(_)
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::ReservationNotFound(_) => write!(f, "Reservation not found"),
            EngineError::TaskNotFound(_) => write!(f, "Task not found"),
            EngineError::Validation(msg) => write!(f, "invalid reservation: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
