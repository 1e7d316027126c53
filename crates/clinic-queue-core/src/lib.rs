//! Clinic Queue Core Library
//!
//! Turn lifecycle for a clinic patient queue: ticket numbering, state
//! transitions, the audit trail and the read-side projections.
//!
//! # Architecture
//!
//! ```text
//!   createTurn / changeState / callNext
//!                 │
//!          AccessPolicy + RateLimit
//!                 │
//!     ┌───────────┴───────────┐
//!     ▼                       ▼
//! SequenceGenerator     TurnStateMachine
//!     │                       │
//!     └───────────┬───────────┘
//!                 ▼
//!   ┌─────────────────────────────┐
//!   │  one transaction:           │
//!   │    turn row + history row   │
//!   └─────────────┬───────────────┘
//!                 │ commit
//!                 ▼
//!          EventPublisher ──► realtime fan-out
//!
//!   QueueQueries (activeQueue, next, waitingList, statistics, publicBoard)
//!     read independently from the same store
//! ```
//!
//! # Core Principle
//!
//! **No transition is published without being durably applied, and no
//! applied transition skips history.**
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`store`]: persistence boundary consumed by the lifecycle
//! - [`models`]: domain types (Turn, HistoryEntry, Clinic, Patient, Actor)
//! - [`lifecycle`]: sequence generator, state machine, history recorder
//! - [`queries`]: queue, next ticket, statistics, public board
//! - [`service`]: [`TurnService`], the operations exposed to callers
//! - [`events`]: events emitted after a mutation commits

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod queries;
pub mod rate_limit;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, QueueConfig};
pub use db::{Database, DbError, DbResult};
pub use error::{QueueError, QueueResult};
pub use events::{EventPublisher, NullPublisher, RecordingPublisher, TurnEvent};
pub use models::{
    Actor, Clinic, HistoryEntry, NewPatient, Patient, Priority, Role, Turn, TurnDetails, TurnState,
};
pub use policy::AccessPolicy;
pub use queries::{BoardEntry, ClinicStats, QueueQueries};
pub use rate_limit::{FixedWindowLimiter, RateLimitConfig};
pub use service::{CreateTurnRequest, TurnService};
pub use store::QueueStore;
