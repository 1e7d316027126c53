//! Turn history (audit trail) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::turn::TurnState;

/// Immutable audit record of a turn creation or transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub turn_id: i64,
    /// User who performed the change
    pub actor_id: i64,
    /// `None` for the creation entry
    pub prior_state: Option<TurnState>,
    pub new_state: TurnState,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Whether this entry records the creation of the turn.
    pub fn is_creation(&self) -> bool {
        self.prior_state.is_none()
    }
}

/// Values needed to append a history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub turn_id: i64,
    pub actor_id: i64,
    pub prior_state: Option<TurnState>,
    pub new_state: TurnState,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
