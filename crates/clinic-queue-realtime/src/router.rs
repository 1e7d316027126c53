//! Channel membership of live connections.
//!
//! The router owns one outbox per connection. Membership lives only as long
//! as the connection: a reconnecting client starts with no channels and must
//! join again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{authenticate, CredentialVerifier, Viewer};
use crate::channel::Channel;
use crate::error::{RealtimeError, RealtimeResult};
use crate::messages::{ClientCommand, ServerMessage};

pub type ConnectionId = Uuid;

/// Sending half of a connection's message queue.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

struct Connection {
    viewer: Viewer,
    outbox: Outbox,
    /// Explicit memberships; `Global` is implicit and never stored
    channels: HashSet<Channel>,
}

/// Tracks which connection belongs to which channels.
pub struct SubscriptionRouter {
    verifier: Arc<dyn CredentialVerifier>,
    connections: HashMap<ConnectionId, Connection>,
}

impl SubscriptionRouter {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            connections: HashMap::new(),
        }
    }

    /// Accept a connection. A credential that fails verification rejects it.
    pub fn connect(&mut self, credential: Option<&str>, outbox: Outbox) -> RealtimeResult<ConnectionId> {
        let viewer = authenticate(self.verifier.as_ref(), credential)?;
        let id = Uuid::new_v4();

        info!(
            connection = %id,
            staff = viewer.actor().map(|a| a.id),
            "Client connected"
        );
        self.connections.insert(
            id,
            Connection {
                viewer,
                outbox,
                channels: HashSet::new(),
            },
        );
        Ok(id)
    }

    /// Drop a connection and every membership it held.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            info!(connection = %id, "Client disconnected");
        }
        removed
    }

    fn connection_mut(&mut self, id: ConnectionId) -> RealtimeResult<&mut Connection> {
        self.connections
            .get_mut(&id)
            .ok_or(RealtimeError::UnknownConnection(id))
    }

    /// Idempotent. Staff only.
    pub fn join_clinic(&mut self, id: ConnectionId, clinic_id: i64) -> RealtimeResult<()> {
        let connection = self.connection_mut(id)?;
        if !connection.viewer.is_staff() {
            return Err(RealtimeError::Forbidden(format!(
                "anonymous viewers cannot join clinic {}",
                clinic_id
            )));
        }
        if connection.channels.insert(Channel::Clinic(clinic_id)) {
            debug!(connection = %id, channel = %Channel::Clinic(clinic_id), "Joined channel");
        }
        Ok(())
    }

    /// No-op when not a member.
    pub fn leave_clinic(&mut self, id: ConnectionId, clinic_id: i64) -> RealtimeResult<()> {
        let connection = self.connection_mut(id)?;
        if connection.channels.remove(&Channel::Clinic(clinic_id)) {
            debug!(connection = %id, channel = %Channel::Clinic(clinic_id), "Left channel");
        }
        Ok(())
    }

    pub fn join_public_screen(&mut self, id: ConnectionId) -> RealtimeResult<()> {
        let connection = self.connection_mut(id)?;
        if connection.channels.insert(Channel::PublicScreen) {
            debug!(connection = %id, channel = %Channel::PublicScreen, "Joined channel");
        }
        Ok(())
    }

    /// Apply a client command and acknowledge it on the connection's outbox.
    pub fn handle_command(&mut self, id: ConnectionId, command: ClientCommand) -> RealtimeResult<()> {
        let ack = match command {
            ClientCommand::JoinClinic { clinic_id } => {
                self.join_clinic(id, clinic_id)?;
                Some(ServerMessage::JoinedClinic {
                    clinic_id,
                    message: format!("Joined clinic {}", clinic_id),
                })
            }
            ClientCommand::LeaveClinic { clinic_id } => {
                self.leave_clinic(id, clinic_id)?;
                None
            }
            ClientCommand::JoinPublicScreen => {
                self.join_public_screen(id)?;
                Some(ServerMessage::JoinedPublicScreen {
                    message: "Joined public screen".into(),
                })
            }
            ClientCommand::RequestUpdate { clinic_id } => {
                self.connection_mut(id)?;
                Some(ServerMessage::FetchTurns { clinic_id })
            }
        };

        if let Some(ack) = ack {
            self.send(id, ack);
        }
        Ok(())
    }

    /// Whether `id` receives messages for `channel`.
    pub fn is_member(&self, id: ConnectionId, channel: Channel) -> bool {
        match self.connections.get(&id) {
            None => false,
            Some(_) if channel == Channel::Global => true,
            Some(connection) => connection.channels.contains(&channel),
        }
    }

    /// Connections belonging to `channel`.
    pub fn members(&self, channel: Channel) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| channel == Channel::Global || c.channels.contains(&channel))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Explicit memberships of a connection.
    pub fn channels_of(&self, id: ConnectionId) -> Option<Vec<Channel>> {
        self.connections
            .get(&id)
            .map(|c| c.channels.iter().copied().collect())
    }

    pub fn viewer(&self, id: ConnectionId) -> Option<&Viewer> {
        self.connections.get(&id).map(|c| &c.viewer)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a message for one connection.
    ///
    /// Returns `false` if the connection is unknown or its receiver is gone;
    /// a gone receiver also drops the connection.
    pub fn send(&mut self, id: ConnectionId, message: ServerMessage) -> bool {
        let Some(connection) = self.connections.get(&id) else {
            return false;
        };
        if connection.outbox.send(message).is_ok() {
            return true;
        }
        self.connections.remove(&id);
        debug!(connection = %id, "Dropped connection with closed outbox");
        false
    }
}
