//! Hub integration tests: turn mutations fanned out to live connections.

use std::sync::Arc;

use chrono::Utc;
use clinic_queue_core::{
    Actor, CreateTurnRequest, Database, NewPatient, QueueConfig, Role, TurnService, TurnState,
};
use clinic_queue_realtime::{
    ClientCommand, ClientConnection, Hub, HubHandle, RealtimeError, ServerMessage,
    StaticTokenVerifier,
};

const NURSE_TOKEN: &str = "nurse-token";

struct Setup {
    hub: HubHandle,
    service: TurnService<Database>,
    clinic_id: i64,
    other_clinic_id: i64,
    patient_id: i64,
}

fn nurse() -> Actor {
    Actor::new(10, Role::Nurse)
}

fn doctor(clinic_id: i64) -> Actor {
    Actor::new(20, Role::Clinician).assigned_to(clinic_id)
}

fn setup() -> Setup {
    let verifier = StaticTokenVerifier::new().with_token(NURSE_TOKEN, nurse());
    let (hub, handle) = Hub::new(Arc::new(verifier));
    tokio::spawn(hub.run());

    let db = Database::open_in_memory().unwrap();
    let clinic = db.insert_clinic("Pediatría", None, Utc::now()).unwrap();
    let other = db.insert_clinic("Odontología", None, Utc::now()).unwrap();
    let patient = db.insert_patient(&NewPatient::new("Ana"), Utc::now()).unwrap();

    let service = TurnService::new(db, QueueConfig::default()).with_publisher(Arc::new(handle.clone()));
    Setup {
        hub: handle,
        service,
        clinic_id: clinic.id,
        other_clinic_id: other.id,
        patient_id: patient.id,
    }
}

/// Everything queued for `conn` once the hub has handled all earlier messages.
async fn drain(hub: &HubHandle, conn: &mut ClientConnection) -> Vec<ServerMessage> {
    hub.stats().await.unwrap();
    let mut messages = Vec::new();
    while let Ok(message) = conn.receiver.try_recv() {
        messages.push(message);
    }
    messages
}

fn names(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(ServerMessage::name).collect()
}

#[tokio::test]
async fn test_public_screen_sees_updates_only_once_visible() {
    let s = setup();
    let mut screen = s.hub.connect(None).await.unwrap();
    s.hub.command(screen.id, ClientCommand::JoinPublicScreen).unwrap();
    assert_eq!(names(&drain(&s.hub, &mut screen).await), vec!["joined.publicScreen"]);

    let turn = s
        .service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();
    let after_create = drain(&s.hub, &mut screen).await;
    assert_eq!(names(&after_create), vec!["turn.created"]);

    let doc = doctor(s.clinic_id);
    s.service.transition(turn.turn.id, TurnState::Called, &doc, None).unwrap();
    assert_eq!(
        names(&drain(&s.hub, &mut screen).await),
        vec!["turn.stateChanged", "turn.updated", "turn.called"]
    );

    s.service
        .transition(turn.turn.id, TurnState::InProgress, &doc, None)
        .unwrap();
    let after_start = drain(&s.hub, &mut screen).await;
    assert_eq!(names(&after_start), vec!["turn.stateChanged", "turn.updated"]);
    match &after_start[1] {
        ServerMessage::TurnUpdated(details) => {
            assert_eq!(details.turn.state, TurnState::InProgress);
            assert_eq!(details.patient_name, "Ana");
        }
        other => panic!("expected turn.updated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_clinic_staff_receive_their_clinic_only() {
    let s = setup();
    let mut staff = s.hub.connect(Some(NURSE_TOKEN)).await.unwrap();
    s.hub
        .command_json(staff.id, &format!(r#"{{"type":"join_clinic","clinicId":{}}}"#, s.clinic_id))
        .unwrap();
    let mut other_staff = s.hub.connect(Some(NURSE_TOKEN)).await.unwrap();
    s.hub
        .command(other_staff.id, ClientCommand::JoinClinic { clinic_id: s.other_clinic_id })
        .unwrap();

    let turn = s
        .service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();
    s.service
        .change_state(turn.turn.id, "cancelado", &nurse(), Some("went home"))
        .unwrap();

    // Global + clinic membership still yields a single created message
    assert_eq!(
        names(&drain(&s.hub, &mut staff).await),
        vec![
            "joined.clinic",
            "turn.created",
            "turn.updated",
            "turn.stateChanged",
            "turn.updated"
        ]
    );
    // Other clinic: only the global events
    assert_eq!(
        names(&drain(&s.hub, &mut other_staff).await),
        vec!["joined.clinic", "turn.created", "turn.stateChanged"]
    );
}

#[tokio::test]
async fn test_new_waiting_turn_refreshes_clinic_but_not_screen() {
    let s = setup();
    let mut screen = s.hub.connect(None).await.unwrap();
    s.hub.command(screen.id, ClientCommand::JoinPublicScreen).unwrap();
    let mut staff = s.hub.connect(Some(NURSE_TOKEN)).await.unwrap();
    s.hub
        .command(staff.id, ClientCommand::JoinClinic { clinic_id: s.clinic_id })
        .unwrap();
    drain(&s.hub, &mut screen).await;
    drain(&s.hub, &mut staff).await;

    let turn = s
        .service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();

    let on_screen = drain(&s.hub, &mut screen).await;
    assert!(!names(&on_screen).contains(&"turn.updated"));
    assert_eq!(names(&on_screen), vec!["turn.created"]);

    let on_dashboard = drain(&s.hub, &mut staff).await;
    assert_eq!(names(&on_dashboard), vec!["turn.created", "turn.updated"]);
    match &on_dashboard[1] {
        ServerMessage::TurnUpdated(details) => {
            assert_eq!(details.turn.id, turn.turn.id);
            assert_eq!(details.turn.state, TurnState::Waiting);
        }
        other => panic!("expected turn.updated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_state_changed_payload() {
    let s = setup();
    let mut viewer = s.hub.connect(None).await.unwrap();
    let turn = s
        .service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();
    s.service
        .call_next(s.clinic_id, &doctor(s.clinic_id))
        .unwrap()
        .unwrap();

    let messages = drain(&s.hub, &mut viewer).await;
    let changed = messages
        .iter()
        .find_map(|m| match m {
            ServerMessage::TurnStateChanged(payload) => Some(payload.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(changed.prior_state, TurnState::Waiting);
    assert_eq!(changed.new_state, TurnState::Called);
    assert_eq!(changed.turn.turn.id, turn.turn.id);

    let json: serde_json::Value =
        serde_json::from_str(&messages.last().unwrap().to_json().unwrap()).unwrap();
    assert_eq!(json["event"], "turn.called");
    assert_eq!(json["data"]["priority"], "normal");
    assert!(json["data"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Ticket PED-"));
}

#[tokio::test]
async fn test_bad_credential_rejects_connection() {
    let s = setup();
    let result = s.hub.connect(Some("stolen")).await;
    assert!(matches!(result, Err(RealtimeError::AuthenticationFailed(_))));
    assert_eq!(s.hub.stats().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_anonymous_cannot_join_clinic() {
    let s = setup();
    let mut viewer = s.hub.connect(None).await.unwrap();
    s.hub
        .command(viewer.id, ClientCommand::JoinClinic { clinic_id: s.clinic_id })
        .unwrap();

    let messages = drain(&s.hub, &mut viewer).await;
    assert!(matches!(&messages[..], [ServerMessage::Error { .. }]));
}

#[tokio::test]
async fn test_disconnect_and_reconnect() {
    let s = setup();
    let mut staff = s.hub.connect(Some(NURSE_TOKEN)).await.unwrap();
    s.hub
        .command(staff.id, ClientCommand::JoinClinic { clinic_id: s.clinic_id })
        .unwrap();
    s.hub.command(staff.id, ClientCommand::JoinPublicScreen).unwrap();
    assert_eq!(s.hub.stats().await.unwrap().public_screens, 1);

    s.hub.disconnect(staff.id).unwrap();
    let stats = s.hub.stats().await.unwrap();
    assert_eq!(stats.connections, 0);
    assert_eq!(stats.public_screens, 0);

    // Reconnecting starts from scratch
    let mut again = s.hub.connect(Some(NURSE_TOKEN)).await.unwrap();
    assert_ne!(again.id, staff.id);
    s.hub
        .command(again.id, ClientCommand::RequestUpdate { clinic_id: Some(s.clinic_id) })
        .unwrap();
    s.service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();

    assert_eq!(
        names(&drain(&s.hub, &mut again).await),
        vec!["request.fetchTurns", "turn.created"]
    );
    let _ = drain(&s.hub, &mut staff).await;
}

#[tokio::test]
async fn test_dropped_client_does_not_fail_mutation() {
    let s = setup();
    let gone = s.hub.connect(None).await.unwrap();
    let mut live = s.hub.connect(None).await.unwrap();
    drop(gone.receiver);

    let turn = s
        .service
        .create_turn(CreateTurnRequest::new(s.patient_id, s.clinic_id), &nurse())
        .unwrap();
    assert_eq!(turn.turn.state, TurnState::Waiting);

    assert_eq!(names(&drain(&s.hub, &mut live).await), vec!["turn.created"]);
    assert_eq!(s.hub.stats().await.unwrap().connections, 1);
}

#[tokio::test]
async fn test_hub_closed() {
    let verifier = StaticTokenVerifier::new();
    let (hub, handle) = Hub::new(Arc::new(verifier));
    drop(hub);

    assert!(matches!(handle.connect(None).await, Err(RealtimeError::HubClosed)));
    assert!(handle.stats().await.is_err());

    // Mutations still succeed when nobody can be told about them
    let db = Database::open_in_memory().unwrap();
    let clinic = db.insert_clinic("General", None, Utc::now()).unwrap();
    let patient = db.insert_patient(&NewPatient::new("Eva"), Utc::now()).unwrap();
    let service = TurnService::new(db, QueueConfig::default()).with_publisher(Arc::new(handle));
    assert!(service
        .create_turn(CreateTurnRequest::new(patient.id, clinic.id), &nurse())
        .is_ok());
}
