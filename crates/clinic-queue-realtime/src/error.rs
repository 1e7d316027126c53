//! Real-time layer errors.

use thiserror::Error;

use crate::router::ConnectionId;

#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Bad or expired credential; the connection attempt is rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Invalid client message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// The hub task has stopped.
    #[error("Hub is not running")]
    HubClosed,
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
