//! The message-passing hub.
//!
//! ```text
//!  HubHandle ──┐
//!  HubHandle ──┼──► mpsc<HubMessage> ──► Hub task
//!  TurnService ┘        (FIFO)            ├─ SubscriptionRouter
//!                                         └─ BroadcastDispatcher ──► outboxes
//! ```
//!
//! One task owns the router; every connect, command, disconnect and publish
//! is a message on a single queue and is handled in arrival order.

use std::sync::Arc;

use clinic_queue_core::{EventPublisher, TurnEvent};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::auth::CredentialVerifier;
use crate::channel::Channel;
use crate::dispatcher::BroadcastDispatcher;
use crate::error::{RealtimeError, RealtimeResult};
use crate::messages::{ClientCommand, ServerMessage};
use crate::router::{ConnectionId, Outbox, SubscriptionRouter};

/// Snapshot of the hub's connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub public_screens: usize,
}

pub enum HubMessage {
    Connect {
        credential: Option<String>,
        outbox: Outbox,
        reply: oneshot::Sender<RealtimeResult<ConnectionId>>,
    },
    Command {
        connection: ConnectionId,
        command: ClientCommand,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Publish(TurnEvent),
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Owns the router; run it with [`Hub::run`].
pub struct Hub {
    router: SubscriptionRouter,
    dispatcher: BroadcastDispatcher,
    inbox: mpsc::UnboundedReceiver<HubMessage>,
}

impl Hub {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> (Hub, HubHandle) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let hub = Hub {
            router: SubscriptionRouter::new(verifier),
            dispatcher: BroadcastDispatcher::new(),
            inbox,
        };
        (hub, HubHandle { tx })
    }

    /// Process messages until every handle is dropped.
    pub async fn run(mut self) {
        info!("Realtime hub started");
        while let Some(message) = self.inbox.recv().await {
            self.handle(message);
        }
        info!("Realtime hub stopped");
    }

    fn handle(&mut self, message: HubMessage) {
        match message {
            HubMessage::Connect {
                credential,
                outbox,
                reply,
            } => {
                let result = self.router.connect(credential.as_deref(), outbox);
                if let Err(e) = &result {
                    warn!(error = %e, "Connection rejected");
                }
                if let Err(Ok(id)) = reply.send(result) {
                    // Caller went away before learning its id
                    self.router.disconnect(id);
                }
            }
            HubMessage::Command {
                connection,
                command,
            } => {
                if let Err(e) = self.router.handle_command(connection, command) {
                    warn!(connection = %connection, error = %e, "Command rejected");
                    self.router.send(
                        connection,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
            HubMessage::Disconnect { connection } => {
                self.router.disconnect(connection);
            }
            HubMessage::Publish(event) => {
                self.dispatcher.publish(&mut self.router, event);
            }
            HubMessage::Stats { reply } => {
                let _ = reply.send(HubStats {
                    connections: self.router.connection_count(),
                    public_screens: self.router.members(Channel::PublicScreen).len(),
                });
            }
        }
    }
}

/// A client's end of a connection.
pub struct ClientConnection {
    pub id: ConnectionId,
    pub receiver: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Cloneable sender into the hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubMessage>,
}

impl HubHandle {
    fn send(&self, message: HubMessage) -> RealtimeResult<()> {
        self.tx.send(message).map_err(|_| RealtimeError::HubClosed)
    }

    /// Open a connection, optionally presenting a bearer credential.
    pub async fn connect(&self, credential: Option<&str>) -> RealtimeResult<ClientConnection> {
        let (outbox, receiver) = mpsc::unbounded_channel();
        let (reply, response) = oneshot::channel();
        self.send(HubMessage::Connect {
            credential: credential.map(str::to_string),
            outbox,
            reply,
        })?;
        let id = response.await.map_err(|_| RealtimeError::HubClosed)??;
        Ok(ClientConnection { id, receiver })
    }

    pub fn command(&self, connection: ConnectionId, command: ClientCommand) -> RealtimeResult<()> {
        self.send(HubMessage::Command {
            connection,
            command,
        })
    }

    /// Parse a raw JSON frame from a client and forward it.
    pub fn command_json(&self, connection: ConnectionId, text: &str) -> RealtimeResult<()> {
        self.command(connection, ClientCommand::parse(text)?)
    }

    pub fn disconnect(&self, connection: ConnectionId) -> RealtimeResult<()> {
        self.send(HubMessage::Disconnect { connection })
    }

    pub fn publish_event(&self, event: TurnEvent) -> RealtimeResult<()> {
        self.send(HubMessage::Publish(event))
    }

    /// Connection counts. Resolves after every earlier message was handled.
    pub async fn stats(&self) -> RealtimeResult<HubStats> {
        let (reply, response) = oneshot::channel();
        self.send(HubMessage::Stats { reply })?;
        response.await.map_err(|_| RealtimeError::HubClosed)
    }
}

impl EventPublisher for HubHandle {
    fn publish(&self, event: TurnEvent) {
        let name = event.name();
        if self.publish_event(event).is_err() {
            warn!(event = name, "Hub closed, event not broadcast");
        }
    }
}
