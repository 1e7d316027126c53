//! Domain events emitted after a turn mutation commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, TurnDetails, TurnState};

/// A committed change to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A new ticket was issued.
    Created { turn: TurnDetails },
    /// Generic refresh after any mutation.
    Updated { turn: TurnDetails },
    /// Transition delta for dashboards.
    StateChanged {
        turn: TurnDetails,
        prior_state: TurnState,
        new_state: TurnState,
        changed_at: DateTime<Utc>,
    },
    /// The ticket entered `called`; drives audible and visual alerts.
    CalledAnnouncement {
        turn: TurnDetails,
        message: String,
        priority: Priority,
    },
}

impl TurnEvent {
    /// Outbound event name on the real-time channel.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Created { .. } => "turn.created",
            TurnEvent::Updated { .. } => "turn.updated",
            TurnEvent::StateChanged { .. } => "turn.stateChanged",
            TurnEvent::CalledAnnouncement { .. } => "turn.called",
        }
    }

    pub fn turn(&self) -> &TurnDetails {
        match self {
            TurnEvent::Created { turn }
            | TurnEvent::Updated { turn }
            | TurnEvent::StateChanged { turn, .. }
            | TurnEvent::CalledAnnouncement { turn, .. } => turn,
        }
    }

    /// Announcement for a ticket that was just called.
    pub fn called(turn: TurnDetails) -> Self {
        let message = format!(
            "Ticket {} is being called to {}",
            turn.turn.ticket_number, turn.clinic_name
        );
        let priority = turn.turn.priority;
        TurnEvent::CalledAnnouncement {
            turn,
            message,
            priority,
        }
    }
}

/// Sink for committed turn events.
///
/// Publishing never fails the mutation that produced the event; delivery
/// problems are the publisher's own concern.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: TurnEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: TurnEvent) {}
}

impl<P: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<P> {
    fn publish(&self, event: TurnEvent) {
        (**self).publish(event)
    }
}

/// Keeps every event in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: std::sync::Mutex<Vec<TurnEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far.
    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of the events published so far.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TurnEvent::name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: TurnEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
