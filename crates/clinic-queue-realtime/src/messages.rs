//! Wire messages exchanged with connected clients.
//!
//! **Client → Server:**
//! ```json
//! { "type": "join_clinic", "clinicId": 3 }
//! { "type": "leave_clinic", "clinicId": 3 }
//! { "type": "join_public_screen" }
//! { "type": "request_update", "clinicId": 3 }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "event": "turn.created", "data": { "ticketNumber": "CLI-3-1109-001", ... } }
//! { "event": "turn.called", "data": { "turn": { ... }, "message": "...", "priority": "urgent" } }
//! { "event": "joined.clinic", "data": { "clinicId": 3, "message": "..." } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinic_queue_core::{Priority, TurnDetails, TurnEvent, TurnState};

use crate::error::RealtimeResult;

/// Commands a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinClinic {
        #[serde(rename = "clinicId", alias = "clinic_id")]
        clinic_id: i64,
    },
    LeaveClinic {
        #[serde(rename = "clinicId", alias = "clinic_id")]
        clinic_id: i64,
    },
    JoinPublicScreen,
    /// Ask the server for a re-fetch hint after reconnecting
    RequestUpdate {
        #[serde(default, rename = "clinicId", alias = "clinic_id")]
        clinic_id: Option<i64>,
    },
}

impl ClientCommand {
    pub fn parse(text: &str) -> RealtimeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedPayload {
    pub turn: TurnDetails,
    pub prior_state: TurnState,
    pub new_state: TurnState,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalledPayload {
    pub turn: TurnDetails,
    pub message: String,
    pub priority: Priority,
}

/// Messages pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "turn.created")]
    TurnCreated(TurnDetails),
    #[serde(rename = "turn.updated")]
    TurnUpdated(TurnDetails),
    #[serde(rename = "turn.stateChanged")]
    TurnStateChanged(StateChangedPayload),
    #[serde(rename = "turn.called")]
    TurnCalled(CalledPayload),
    #[serde(rename = "joined.clinic", rename_all = "camelCase")]
    JoinedClinic { clinic_id: i64, message: String },
    #[serde(rename = "joined.publicScreen")]
    JoinedPublicScreen { message: String },
    /// Tells the client to re-fetch authoritative state over the query API
    #[serde(rename = "request.fetchTurns", rename_all = "camelCase")]
    FetchTurns { clinic_id: Option<i64> },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::TurnCreated(_) => "turn.created",
            ServerMessage::TurnUpdated(_) => "turn.updated",
            ServerMessage::TurnStateChanged(_) => "turn.stateChanged",
            ServerMessage::TurnCalled(_) => "turn.called",
            ServerMessage::JoinedClinic { .. } => "joined.clinic",
            ServerMessage::JoinedPublicScreen { .. } => "joined.publicScreen",
            ServerMessage::FetchTurns { .. } => "request.fetchTurns",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<TurnEvent> for ServerMessage {
    fn from(event: TurnEvent) -> Self {
        match event {
            TurnEvent::Created { turn } => ServerMessage::TurnCreated(turn),
            TurnEvent::Updated { turn } => ServerMessage::TurnUpdated(turn),
            TurnEvent::StateChanged {
                turn,
                prior_state,
                new_state,
                changed_at,
            } => ServerMessage::TurnStateChanged(StateChangedPayload {
                turn,
                prior_state,
                new_state,
                changed_at,
            }),
            TurnEvent::CalledAnnouncement {
                turn,
                message,
                priority,
            } => ServerMessage::TurnCalled(CalledPayload {
                turn,
                message,
                priority,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RealtimeError;
    use serde_json::json;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ClientCommand::parse(r#"{"type":"join_clinic","clinicId":4}"#).unwrap(),
            ClientCommand::JoinClinic { clinic_id: 4 }
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"leave_clinic","clinic_id":4}"#).unwrap(),
            ClientCommand::LeaveClinic { clinic_id: 4 }
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"join_public_screen"}"#).unwrap(),
            ClientCommand::JoinPublicScreen
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"request_update"}"#).unwrap(),
            ClientCommand::RequestUpdate { clinic_id: None }
        );
        assert!(matches!(
            ClientCommand::parse(r#"{"type":"subscribe_all"}"#),
            Err(RealtimeError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_ack_shape() {
        let ack = ServerMessage::JoinedClinic {
            clinic_id: 4,
            message: "Joined clinic 4".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&ack.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "joined.clinic", "data": { "clinicId": 4, "message": "Joined clinic 4" } })
        );
        assert_eq!(value["event"], ack.name());
    }
}
