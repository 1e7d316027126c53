//! Clinic queue demo.
//!
//! Wires the turn service to the realtime hub, attaches a kiosk display and
//! a staff dashboard, and walks a few patients through the queue.
//!
//! ```bash
//! RUST_LOG=clinic_queue_core=debug,clinic_queue_realtime=debug \
//!   CLINIC_QUEUE_DB_PATH=:memory: cargo run --bin clinic-queue-demo
//! ```

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_queue_core::{
    Actor, CreateTurnRequest, Database, NewPatient, Priority, QueueConfig, Role, TurnService,
    TurnState,
};
use clinic_queue_realtime::{ClientCommand, ClientConnection, Hub, HubHandle, StaticTokenVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_queue_core=info,clinic_queue_realtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = QueueConfig::from_env().context("invalid CLINIC_QUEUE_* configuration")?;
    info!(db_path = %config.db_path, "Opening queue database");
    let db = Database::open(&config.db_path).context("failed to open database")?;

    let nurse = Actor::new(1, Role::Nurse);
    let staff_token = env::var("CLINIC_QUEUE_DEMO_TOKEN").unwrap_or_else(|_| "demo-staff-token".into());
    let verifier = StaticTokenVerifier::new().with_token(&staff_token, nurse.clone());

    let (hub, handle) = Hub::new(Arc::new(verifier));
    let hub_task = tokio::spawn(hub.run());

    let service = Arc::new(
        TurnService::new(db, config).with_publisher(Arc::new(handle.clone())),
    );

    let (clinic_id, patients) = seed(&service)?;
    let doctor = Actor::new(2, Role::Clinician).assigned_to(clinic_id);

    let screen = handle.connect(None).await?;
    handle.command(screen.id, ClientCommand::JoinPublicScreen)?;
    let dashboard = handle.connect(Some(&staff_token)).await?;
    handle.command(dashboard.id, ClientCommand::JoinClinic { clinic_id })?;

    let printers = vec![print_messages("screen", screen), print_messages("dashboard", dashboard)];

    let worker = Arc::clone(&service);
    tokio::task::spawn_blocking(move || -> Result<()> {
        let priorities = [Priority::Normal, Priority::Emergency, Priority::Urgent];
        for (patient_id, priority) in patients.into_iter().zip(priorities) {
            worker.create_turn(
                CreateTurnRequest::new(patient_id, clinic_id)
                    .priority(priority)
                    .reason("General consultation"),
                &nurse,
            )?;
        }

        if let Some(called) = worker.call_next(clinic_id, &doctor)? {
            worker.transition(called.turn.id, TurnState::InProgress, &doctor, None)?;
            worker.transition(called.turn.id, TurnState::Done, &doctor, Some("Discharged"))?;
        }
        if let Some(next) = worker.call_next(clinic_id, &doctor)? {
            worker.change_state(next.turn.id, "ausente", &doctor, Some("No show"))?;
        }
        Ok(())
    })
    .await??;

    let stats = service.statistics(clinic_id, None)?;
    println!("statistics: {}", serde_json::to_string_pretty(&stats)?);
    let waiting = service.waiting_list(None, None)?;
    println!("still waiting: {}", waiting.len());
    let board = service.public_board(None, None)?;
    println!("public board: {}", serde_json::to_string_pretty(&board)?);
    for turn in service.list_active_queue(clinic_id, None)? {
        let history = service.history(turn.turn.id)?;
        println!(
            "{} ({}) {} history entries",
            turn.turn.ticket_number,
            turn.turn.state,
            history.len()
        );
    }

    shutdown(handle, service, hub_task, printers).await
}

const DEMO_CLINIC: &str = "Clínica Níño Feliz";
const DEMO_PATIENTS: [&str; 3] = ["Ana Pérez", "Bruno Díaz", "Carla Ruiz"];

/// Register the demo clinic and patients, reusing rows left by earlier runs.
fn seed(service: &TurnService<Database>) -> Result<(i64, Vec<i64>)> {
    let store = service.store()?;
    let now = Utc::now();

    let clinic = match store.list_clinics()?.into_iter().find(|c| c.name == DEMO_CLINIC) {
        Some(existing) => existing,
        None => store.insert_clinic(DEMO_CLINIC, Some("Planta baja"), now)?,
    };

    let known = store.list_patients()?;
    let mut patients = Vec::new();
    for name in DEMO_PATIENTS {
        let id = match known.iter().find(|p| p.name == name) {
            Some(existing) => existing.id,
            None => store.insert_patient(&NewPatient::new(name), now)?.id,
        };
        patients.push(id);
    }
    info!(clinic_id = clinic.id, patients = patients.len(), "Seeded demo data");
    Ok((clinic.id, patients))
}

fn print_messages(label: &'static str, mut connection: ClientConnection) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = connection.receiver.recv().await {
            match message.to_json() {
                Ok(json) => println!("[{}] {}", label, json),
                Err(e) => eprintln!("[{}] unserializable message: {}", label, e),
            }
        }
    })
}

/// Drop every hub handle so the hub stops, then wait for the printers.
async fn shutdown(
    handle: HubHandle,
    service: Arc<TurnService<Database>>,
    hub_task: JoinHandle<()>,
    printers: Vec<JoinHandle<()>>,
) -> Result<()> {
    let stats = handle.stats().await?;
    info!(connections = stats.connections, "Shutting down");
    drop(handle);
    drop(service);
    hub_task.await?;
    for printer in printers {
        printer.await?;
    }
    Ok(())
}
