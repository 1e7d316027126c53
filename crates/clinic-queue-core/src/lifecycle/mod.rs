//! Turn lifecycle: ticket numbering, state transitions and the audit trail.
//!
//! - [`sequence`]: daily ticket numbers per clinic
//! - [`state_machine`]: legal transitions and set-once timestamps
//! - [`history`]: append-only record of every creation and transition

pub mod history;
pub mod sequence;
pub mod state_machine;

pub use history::HistoryRecorder;
pub use sequence::{clinic_prefix, format_ticket_number, SequenceGenerator, TicketAllocation};
pub use state_machine::{allowed_targets, apply_transition, can_transition, parse_state};
