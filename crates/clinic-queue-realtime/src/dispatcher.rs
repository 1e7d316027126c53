//! Fan-out of turn events to channels.
//!
//! | Event | Channels |
//! |-------|----------|
//! | `turn.created` | global, clinic, public-screen |
//! | `turn.updated` | clinic; public-screen once the turn left `waiting` |
//! | `turn.stateChanged` | global |
//! | `turn.called` | global |
//!
//! Delivery is at most once per connection and publish: no queueing for
//! offline clients and no replay. A client that reconnects re-fetches state
//! through the queue queries.

use std::collections::HashSet;

use clinic_queue_core::TurnEvent;
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::messages::ServerMessage;
use crate::router::{ConnectionId, SubscriptionRouter};

/// Channels that must receive `event`.
pub fn routes(event: &TurnEvent) -> Vec<Channel> {
    let clinic = Channel::Clinic(event.turn().turn.clinic_id);
    match event {
        TurnEvent::Created { .. } => vec![Channel::Global, clinic, Channel::PublicScreen],
        TurnEvent::Updated { turn } => {
            if turn.turn.state.is_publicly_visible() {
                vec![clinic, Channel::PublicScreen]
            } else {
                vec![clinic]
            }
        }
        TurnEvent::StateChanged { .. } | TurnEvent::CalledAnnouncement { .. } => vec![Channel::Global],
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub event: &'static str,
    pub channels: Vec<Channel>,
    /// Connections the message was queued for
    pub delivered: usize,
    /// Connections found closed and removed
    pub dropped: Vec<ConnectionId>,
}

/// Pushes events to every member of their target channels.
#[derive(Debug, Default)]
pub struct BroadcastDispatcher;

impl BroadcastDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Never fails: a closed subscriber is dropped and counted.
    pub fn publish(&self, router: &mut SubscriptionRouter, event: TurnEvent) -> DeliveryReport {
        let name = event.name();
        let channels = routes(&event);

        let mut recipients = Vec::new();
        let mut seen = HashSet::new();
        for channel in &channels {
            for id in router.members(*channel) {
                if seen.insert(id) {
                    recipients.push(id);
                }
            }
        }

        let message = ServerMessage::from(event);
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for id in recipients {
            if router.send(id, message.clone()) {
                delivered += 1;
            } else {
                dropped.push(id);
            }
        }

        if !dropped.is_empty() {
            warn!(event = name, dropped = dropped.len(), "Dropped closed subscribers");
        }
        debug!(
            event = name,
            channels = ?channels.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            delivered,
            "Dispatched event"
        );

        DeliveryReport {
            event: name,
            channels,
            delivered,
            dropped,
        }
    }
}
