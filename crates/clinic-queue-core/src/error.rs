//! Errors surfaced by the queue operations.

use thiserror::Error;

use crate::db::DbError;
use crate::models::TurnState;

/// Failure of a queue operation. Rejected mutations never leave partial writes.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Referenced turn, patient or clinic does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested state is not one of the six recognised values
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Recognised state, but no edge from the current one
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TurnState, to: TurnState },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ticket number collision. Retryable.
    #[error("Duplicate ticket number: {0}")]
    DuplicateTicket(String),

    /// Role or clinic-scope violation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl QueueError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::DuplicateTicket(_) | QueueError::RateLimited { .. })
    }
}

impl From<DbError> for QueueError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateTicket(ticket) => QueueError::DuplicateTicket(ticket),
            DbError::NotFound(what) => QueueError::NotFound(what),
            other => QueueError::Database(other),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for QueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        QueueError::Lock(e.to_string())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_keep_their_kind() {
        let err: QueueError = DbError::DuplicateTicket("GEN-1-1109-004".into()).into();
        assert!(matches!(err, QueueError::DuplicateTicket(ref t) if t == "GEN-1-1109-004"));
        assert!(err.is_retryable());

        let err: QueueError = DbError::NotFound("turn 9".into()).into();
        assert!(matches!(err, QueueError::NotFound(_)));

        let err: QueueError = DbError::Constraint("trigger".into()).into();
        assert!(matches!(err, QueueError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = QueueError::InvalidTransition {
            from: TurnState::Done,
            to: TurnState::Called,
        };
        assert_eq!(err.to_string(), "Invalid transition from done to called");
    }
}
