//! Turn (queue ticket) models.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Queue state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Registered, waiting to be called
    Waiting,
    /// Called to the consulting room
    Called,
    /// Patient is being attended
    InProgress,
    /// Attendance finished
    Done,
    /// Patient did not show up
    Absent,
    /// Ticket cancelled
    Cancelled,
}

impl TurnState {
    /// All recognised states, in lifecycle order.
    pub const ALL: [TurnState; 6] = [
        TurnState::Waiting,
        TurnState::Called,
        TurnState::InProgress,
        TurnState::Done,
        TurnState::Absent,
        TurnState::Cancelled,
    ];

    /// States that keep a ticket in the active queue.
    pub const ACTIVE: [TurnState; 3] = [TurnState::Waiting, TurnState::Called, TurnState::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Waiting => "waiting",
            TurnState::Called => "called",
            TurnState::InProgress => "in_progress",
            TurnState::Done => "done",
            TurnState::Absent => "absent",
            TurnState::Cancelled => "cancelled",
        }
    }

    /// Terminal states are sinks: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Absent | TurnState::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Whether the public board shows a ticket entering this state.
    pub fn is_publicly_visible(&self) -> bool {
        !matches!(self, TurnState::Waiting)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a state name that is not one of the six recognised values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown turn state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for TurnState {
    type Err = UnknownState;

    /// Accepts the English names and the legacy Spanish ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waiting" | "espera" => Ok(TurnState::Waiting),
            "called" | "llamando" => Ok(TurnState::Called),
            "in_progress" | "atendiendo" => Ok(TurnState::InProgress),
            "done" | "finalizado" => Ok(TurnState::Done),
            "absent" | "ausente" => Ok(TurnState::Absent),
            "cancelled" | "cancelado" => Ok(TurnState::Cancelled),
            _ => Err(UnknownState(s.to_string())),
        }
    }
}

/// Priority tier. Declaration order is ascending urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
            Priority::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised priority name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown priority: {0}")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "urgent" | "urgente" => Ok(Priority::Urgent),
            "emergency" | "emergencia" => Ok(Priority::Emergency),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

/// A queue ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Row id
    pub id: i64,
    /// Human-readable ticket, e.g. `CLI-3-1016-001`
    pub ticket_number: String,
    /// Daily sequence within the clinic (1-based)
    pub sequence: u32,
    pub patient_id: i64,
    pub clinic_id: i64,
    /// Staff member who registered the turn
    pub created_by: i64,
    /// Staff member who started the attendance
    pub attended_by: Option<i64>,
    pub state: TurnState,
    /// Fixed at creation
    pub priority: Priority,
    /// Reason for the visit
    pub reason: Option<String>,
    /// Latest observation attached to a transition
    pub notes: Option<String>,
    /// Calendar day the ticket belongs to
    pub date: NaiveDate,
    pub registered_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub attendance_started_at: Option<DateTime<Utc>>,
    pub attendance_ended_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Queue ordering: higher priority first, then earliest registration.
    pub fn queue_order(a: &Turn, b: &Turn) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then(a.registered_at.cmp(&b.registered_at))
            .then(a.id.cmp(&b.id))
    }

    /// Minutes between registration and start of attendance.
    pub fn wait_minutes(&self) -> Option<f64> {
        let started = self.attendance_started_at?;
        Some(minutes_between(self.registered_at, started))
    }

    /// Minutes between start and end of attendance.
    pub fn attendance_minutes(&self) -> Option<f64> {
        let started = self.attendance_started_at?;
        let ended = self.attendance_ended_at?;
        Some(minutes_between(started, ended))
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Values needed to insert a new turn.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub ticket_number: String,
    pub sequence: u32,
    pub patient_id: i64,
    pub clinic_id: i64,
    pub created_by: i64,
    pub priority: Priority,
    pub reason: Option<String>,
    pub date: NaiveDate,
    pub registered_at: DateTime<Utc>,
}

/// A turn together with the display names the UI and broadcasts need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnDetails {
    #[serde(flatten)]
    pub turn: Turn,
    pub patient_name: String,
    pub clinic_name: String,
}
