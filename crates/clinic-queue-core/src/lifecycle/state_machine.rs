//! Turn state machine.
//!
//! ```text
//! waiting ──► called ──► in_progress ──► done
//!    │         │  ▲          │
//!    │         └──┘ re-call  │
//!    │         │             │
//!    └─────────┴─────────────┴──► absent | cancelled
//! ```
//!
//! `done`, `absent` and `cancelled` are sinks. Milestone timestamps are set
//! the first time their state is entered and never overwritten.

use chrono::{DateTime, Utc};

use crate::error::{QueueError, QueueResult};
use crate::models::{Turn, TurnState};

use TurnState::*;

/// States reachable in one step from `from`.
pub fn allowed_targets(from: TurnState) -> &'static [TurnState] {
    match from {
        Waiting => &[Called, Absent, Cancelled],
        Called => &[Called, InProgress, Absent, Cancelled],
        InProgress => &[Done, Absent, Cancelled],
        Done | Absent | Cancelled => &[],
    }
}

pub fn can_transition(from: TurnState, to: TurnState) -> bool {
    allowed_targets(from).contains(&to)
}

/// Parse a requested state name, English or Spanish.
pub fn parse_state(requested: &str) -> QueueResult<TurnState> {
    requested
        .parse()
        .map_err(|_| QueueError::InvalidState(requested.to_string()))
}

/// Compute the turn after moving it to `to`.
///
/// Pure: the input is untouched and nothing is persisted. A rejected
/// transition therefore has no side effects.
pub fn apply_transition(
    turn: &Turn,
    to: TurnState,
    actor_id: i64,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> QueueResult<Turn> {
    if !can_transition(turn.state, to) {
        return Err(QueueError::InvalidTransition {
            from: turn.state,
            to,
        });
    }

    let mut next = turn.clone();
    next.state = to;

    match to {
        Called => {
            next.called_at.get_or_insert(now);
        }
        InProgress => {
            next.attendance_started_at.get_or_insert(now);
            next.attended_by.get_or_insert(actor_id);
        }
        Done | Absent | Cancelled => {
            next.attendance_ended_at.get_or_insert(now);
        }
        Waiting => {}
    }

    if let Some(note) = note {
        next.notes = Some(note.to_string());
    }

    Ok(next)
}
