//! The queue operations exposed to callers.
//!
//! Every mutation runs as one transaction covering the turn write and its
//! history entry. Events are published only after that transaction commits;
//! a rejected mutation writes nothing and publishes nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::db::DbError;
use crate::error::{QueueError, QueueResult};
use crate::events::{EventPublisher, NullPublisher, TurnEvent};
use crate::lifecycle::{apply_transition, parse_state, HistoryRecorder, SequenceGenerator};
use crate::models::{Actor, Clinic, HistoryEntry, NewTurn, Priority, TurnDetails, TurnState};
use crate::policy::AccessPolicy;
use crate::queries::{BoardEntry, ClinicStats, QueueQueries};
use crate::rate_limit::FixedWindowLimiter;
use crate::store::QueueStore;

/// Longest accepted visit reason, in characters.
pub const MAX_REASON_LEN: usize = 500;
/// Longest accepted transition note, in characters.
pub const MAX_NOTE_LEN: usize = 1000;

/// Parameters of a new turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTurnRequest {
    pub patient_id: i64,
    pub clinic_id: i64,
    pub reason: Option<String>,
    pub priority: Priority,
}

impl CreateTurnRequest {
    pub fn new(patient_id: i64, clinic_id: i64) -> Self {
        Self {
            patient_id,
            clinic_id,
            reason: None,
            priority: Priority::Normal,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Turn lifecycle facade over a [`QueueStore`].
pub struct TurnService<S> {
    store: Mutex<S>,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn EventPublisher>,
    create_limiter: Option<FixedWindowLimiter>,
}

impl<S: QueueStore> TurnService<S> {
    /// Service on the system clock, publishing nowhere.
    pub fn new(store: S, config: QueueConfig) -> Self {
        let create_limiter = config
            .create_rate_limit
            .map(|limit| FixedWindowLimiter::new("turn_creation", limit));
        Self {
            store: Mutex::new(store),
            config,
            clock: Arc::new(SystemClock),
            publisher: Arc::new(NullPublisher),
            create_limiter,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn policy(&self) -> &AccessPolicy {
        &self.config.policy
    }

    /// Exclusive access to the underlying store.
    pub fn store(&self) -> QueueResult<MutexGuard<'_, S>> {
        Ok(self.store.lock()?)
    }

    fn queries<'a>(&self, store: &'a S) -> QueueQueries<'a, S> {
        QueueQueries::new(store, self.config.public_board_limit)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Issue a new ticket in `waiting`.
    ///
    /// A ticket collision is retried with a fresh count up to
    /// `max_ticket_attempts` times before `DuplicateTicket` is returned.
    pub fn create_turn(&self, request: CreateTurnRequest, actor: &Actor) -> QueueResult<TurnDetails> {
        self.policy().check_create(actor)?;
        let now = self.clock.now();
        if let Some(limiter) = &self.create_limiter {
            limiter.check(actor.id, now)?;
        }
        let reason = normalize_text("reason", request.reason.as_deref(), MAX_REASON_LEN)?;
        let date = self.clock.today();

        let details = {
            let store = self.store.lock()?;
            let clinic = require_clinic(&*store, request.clinic_id)?;
            if store.get_patient(request.patient_id)?.is_none() {
                return Err(QueueError::NotFound(format!("patient {}", request.patient_id)));
            }

            let max_attempts = self.config.max_ticket_attempts.max(1);
            let mut attempt = 1;
            loop {
                match insert_turn(&*store, &clinic, &request, reason.clone(), actor, date, now) {
                    Ok(details) => break details,
                    Err(DbError::DuplicateTicket(ticket)) if attempt < max_attempts => {
                        warn!(
                            clinic_id = clinic.id,
                            %ticket,
                            attempt,
                            "Ticket number taken, retrying"
                        );
                        attempt += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        info!(
            turn_id = details.turn.id,
            ticket = %details.turn.ticket_number,
            clinic_id = details.turn.clinic_id,
            priority = %details.turn.priority,
            actor_id = actor.id,
            "Turn created"
        );
        self.publisher.publish(TurnEvent::Created {
            turn: details.clone(),
        });
        self.publisher.publish(TurnEvent::Updated {
            turn: details.clone(),
        });
        Ok(details)
    }

    /// Move a turn to the state named `requested` (English or Spanish).
    pub fn change_state(
        &self,
        turn_id: i64,
        requested: &str,
        actor: &Actor,
        note: Option<&str>,
    ) -> QueueResult<TurnDetails> {
        self.policy().check_transition(actor)?;
        let target = parse_state(requested)?;
        self.run_transition(turn_id, target, actor, note)
    }

    /// Move a turn to `target`.
    pub fn transition(
        &self,
        turn_id: i64,
        target: TurnState,
        actor: &Actor,
        note: Option<&str>,
    ) -> QueueResult<TurnDetails> {
        self.policy().check_transition(actor)?;
        self.run_transition(turn_id, target, actor, note)
    }

    fn run_transition(
        &self,
        turn_id: i64,
        target: TurnState,
        actor: &Actor,
        note: Option<&str>,
    ) -> QueueResult<TurnDetails> {
        let note = normalize_text("note", note, MAX_NOTE_LEN)?;
        let now = self.clock.now();

        let (details, prior) = {
            let store = self.store.lock()?;
            transition_turn(&*store, self.policy(), turn_id, target, actor, note.as_deref(), now)?
        };

        self.publish_transition(details.clone(), prior, now);
        Ok(details)
    }

    /// Call the next waiting patient of a clinic. `None` if nobody is waiting.
    pub fn call_next(&self, clinic_id: i64, actor: &Actor) -> QueueResult<Option<TurnDetails>> {
        self.policy().check_call(actor, clinic_id)?;
        let now = self.clock.now();
        let date = self.clock.today();

        let called = {
            let store = self.store.lock()?;
            require_clinic(&*store, clinic_id)?;
            match self.queries(&*store).next(clinic_id, date)? {
                None => None,
                Some(next) => Some(transition_turn(
                    &*store,
                    self.policy(),
                    next.turn.id,
                    TurnState::Called,
                    actor,
                    None,
                    now,
                )?),
            }
        };

        Ok(called.map(|(details, prior)| {
            self.publish_transition(details.clone(), prior, now);
            details
        }))
    }

    fn publish_transition(&self, details: TurnDetails, prior: TurnState, now: DateTime<Utc>) {
        let new_state = details.turn.state;
        info!(
            turn_id = details.turn.id,
            ticket = %details.turn.ticket_number,
            prior = %prior,
            new = %new_state,
            "Turn state changed"
        );

        self.publisher.publish(TurnEvent::StateChanged {
            turn: details.clone(),
            prior_state: prior,
            new_state,
            changed_at: now,
        });
        self.publisher.publish(TurnEvent::Updated {
            turn: details.clone(),
        });
        if new_state == TurnState::Called {
            self.publisher.publish(TurnEvent::called(details));
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Active queue of a clinic; today unless `date` is given.
    pub fn list_active_queue(&self, clinic_id: i64, date: Option<NaiveDate>) -> QueueResult<Vec<TurnDetails>> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let store = self.store.lock()?;
        require_clinic(&*store, clinic_id)?;
        Ok(self.queries(&*store).active_queue(clinic_id, date)?)
    }

    pub fn next_turn(&self, clinic_id: i64, date: Option<NaiveDate>) -> QueueResult<Option<TurnDetails>> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let store = self.store.lock()?;
        require_clinic(&*store, clinic_id)?;
        Ok(self.queries(&*store).next(clinic_id, date)?)
    }

    pub fn statistics(&self, clinic_id: i64, date: Option<NaiveDate>) -> QueueResult<ClinicStats> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let store = self.store.lock()?;
        require_clinic(&*store, clinic_id)?;
        Ok(self.queries(&*store).statistics(clinic_id, date)?)
    }

    /// Waiting tickets across clinics (or one clinic), next to be called first.
    pub fn waiting_list(&self, date: Option<NaiveDate>, clinic_id: Option<i64>) -> QueueResult<Vec<TurnDetails>> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let store = self.store.lock()?;
        Ok(self.queries(&*store).waiting_list(date, clinic_id)?)
    }

    pub fn public_board(&self, date: Option<NaiveDate>, clinic_id: Option<i64>) -> QueueResult<Vec<BoardEntry>> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let store = self.store.lock()?;
        Ok(self.queries(&*store).public_board(date, clinic_id)?)
    }

    /// Audit trail of a turn, oldest first.
    pub fn history(&self, turn_id: i64) -> QueueResult<Vec<HistoryEntry>> {
        let store = self.store.lock()?;
        if store.get_turn(turn_id)?.is_none() {
            return Err(QueueError::NotFound(format!("turn {}", turn_id)));
        }
        Ok(HistoryRecorder::new(&*store).history_for(turn_id)?)
    }

    pub fn get_turn(&self, turn_id: i64) -> QueueResult<TurnDetails> {
        let store = self.store.lock()?;
        store
            .get_turn_details(turn_id)?
            .ok_or_else(|| QueueError::NotFound(format!("turn {}", turn_id)))
    }
}

fn require_clinic<S: QueueStore>(store: &S, clinic_id: i64) -> QueueResult<Clinic> {
    store
        .get_clinic(clinic_id)?
        .ok_or_else(|| QueueError::NotFound(format!("clinic {}", clinic_id)))
}

/// Trim, map blank to `None` and enforce a character limit.
fn normalize_text(field: &str, value: Option<&str>, max_chars: usize) -> QueueResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max_chars {
        return Err(QueueError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(Some(value.to_string()))
}

/// One creation attempt. The count is read outside the write transaction,
/// so a concurrent creation can take the ticket first.
fn insert_turn<S: QueueStore>(
    store: &S,
    clinic: &Clinic,
    request: &CreateTurnRequest,
    reason: Option<String>,
    actor: &Actor,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TurnDetails, DbError> {
    let allocation = SequenceGenerator::new(store).next_ticket_number(clinic.id, &clinic.name, date)?;
    let new_turn = NewTurn {
        ticket_number: allocation.ticket_number,
        sequence: allocation.sequence,
        patient_id: request.patient_id,
        clinic_id: clinic.id,
        created_by: actor.id,
        priority: request.priority,
        reason,
        date,
        registered_at: now,
    };

    store.in_transaction(|s| -> Result<TurnDetails, DbError> {
        let turn = s.insert_turn(&new_turn)?;
        HistoryRecorder::new(s).record_creation(turn.id, actor.id, now)?;
        s.get_turn_details(turn.id)?
            .ok_or_else(|| DbError::NotFound(format!("turn {}", turn.id)))
    })
}

/// Load, authorize against the turn's clinic, apply and record one transition.
fn transition_turn<S: QueueStore>(
    store: &S,
    policy: &AccessPolicy,
    turn_id: i64,
    target: TurnState,
    actor: &Actor,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> QueueResult<(TurnDetails, TurnState)> {
    store.in_transaction(|s| -> QueueResult<(TurnDetails, TurnState)> {
        let current = s
            .get_turn(turn_id)?
            .ok_or_else(|| QueueError::NotFound(format!("turn {}", turn_id)))?;
        policy.check_clinic_scope(actor, current.clinic_id)?;
        let updated = apply_transition(&current, target, actor.id, note, now)?;

        s.update_turn(&updated)?;
        HistoryRecorder::new(s).record(turn_id, Some(current.state), target, actor.id, note, now)?;

        let details = s
            .get_turn_details(turn_id)?
            .ok_or_else(|| QueueError::NotFound(format!("turn {}", turn_id)))?;
        Ok((details, current.state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Database;
    use crate::events::RecordingPublisher;
    use crate::models::{NewPatient, Role};
    use chrono::TimeZone;

    struct Fixture {
        service: TurnService<Database>,
        events: Arc<RecordingPublisher>,
        clinic_id: i64,
        patient_id: i64,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let created = Utc.with_ymd_and_hms(2024, 11, 9, 7, 0, 0).unwrap();
        let clinic = db.insert_clinic("Medicina General", None, created).unwrap();
        let patient = db.insert_patient(&NewPatient::new("Ana"), created).unwrap();

        let events = Arc::new(RecordingPublisher::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 11, 9, 8, 0, 0).unwrap()));
        let service = TurnService::new(db, QueueConfig::default())
            .with_clock(clock)
            .with_publisher(events.clone());

        Fixture {
            service,
            events,
            clinic_id: clinic.id,
            patient_id: patient.id,
        }
    }

    fn nurse() -> Actor {
        Actor::new(10, Role::Nurse)
    }

    #[test]
    fn test_create_turn() {
        let f = setup();
        let details = f
            .service
            .create_turn(
                CreateTurnRequest::new(f.patient_id, f.clinic_id).reason("  chest pain "),
                &nurse(),
            )
            .unwrap();

        assert_eq!(details.turn.state, TurnState::Waiting);
        assert_eq!(details.turn.ticket_number, format!("MED-{}-1109-001", f.clinic_id));
        assert_eq!(details.turn.reason.as_deref(), Some("chest pain"));
        assert_eq!(details.patient_name, "Ana");
        assert_eq!(f.events.names(), vec!["turn.created", "turn.updated"]);

        let history = f.service.history(details.turn.id).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_creation());
        assert_eq!(history[0].new_state, TurnState::Waiting);
    }

    #[test]
    fn test_create_rejects_wrong_role_before_io() {
        let f = setup();
        let err = f
            .service
            .create_turn(
                CreateTurnRequest::new(f.patient_id, 999),
                &Actor::new(3, Role::Receptionist),
            )
            .unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_create_missing_references() {
        let f = setup();
        assert!(matches!(
            f.service.create_turn(CreateTurnRequest::new(f.patient_id, 999), &nurse()),
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            f.service.create_turn(CreateTurnRequest::new(999, f.clinic_id), &nurse()),
            Err(QueueError::NotFound(_))
        ));
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_reason_too_long() {
        let f = setup();
        let err = f
            .service
            .create_turn(
                CreateTurnRequest::new(f.patient_id, f.clinic_id).reason("x".repeat(501)),
                &nurse(),
            )
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(_)));

        // 500 multi-byte characters are fine
        assert!(f
            .service
            .create_turn(
                CreateTurnRequest::new(f.patient_id, f.clinic_id).reason("é".repeat(500)),
                &nurse(),
            )
            .is_ok());
    }

    #[test]
    fn test_rate_limited_creation() {
        let db = Database::open_in_memory().unwrap();
        let clinic = db.insert_clinic("General", None, Utc::now()).unwrap();
        let patient = db.insert_patient(&NewPatient::new("Ana"), Utc::now()).unwrap();
        let config = QueueConfig {
            create_rate_limit: Some(crate::rate_limit::RateLimitConfig {
                limit: 2,
                window_secs: 60,
            }),
            ..QueueConfig::default()
        };
        let service = TurnService::new(db, config);

        for _ in 0..2 {
            service
                .create_turn(CreateTurnRequest::new(patient.id, clinic.id), &nurse())
                .unwrap();
        }
        let err = service
            .create_turn(CreateTurnRequest::new(patient.id, clinic.id), &nurse())
            .unwrap_err();
        assert!(matches!(err, QueueError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_transition_has_no_side_effects() {
        let f = setup();
        let turn = f
            .service
            .create_turn(CreateTurnRequest::new(f.patient_id, f.clinic_id), &nurse())
            .unwrap();
        f.events.clear();

        let err = f
            .service
            .change_state(turn.turn.id, "done", &nurse(), Some("skip"))
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                from: TurnState::Waiting,
                to: TurnState::Done
            }
        ));
        assert!(matches!(
            f.service.change_state(turn.turn.id, "paused", &nurse(), None),
            Err(QueueError::InvalidState(_))
        ));
        assert!(matches!(
            f.service.change_state(777, "called", &nurse(), None),
            Err(QueueError::NotFound(_))
        ));

        assert_eq!(f.service.history(turn.turn.id).unwrap().len(), 1);
        assert_eq!(f.service.get_turn(turn.turn.id).unwrap().turn.notes, None);
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn test_note_becomes_history_comment() {
        let f = setup();
        let turn = f
            .service
            .create_turn(CreateTurnRequest::new(f.patient_id, f.clinic_id), &nurse())
            .unwrap();
        let updated = f
            .service
            .change_state(turn.turn.id, "cancelado", &nurse(), Some("left the building"))
            .unwrap();

        assert_eq!(updated.turn.state, TurnState::Cancelled);
        assert_eq!(updated.turn.notes.as_deref(), Some("left the building"));
        let history = f.service.history(turn.turn.id).unwrap();
        assert_eq!(history[1].comment.as_deref(), Some("left the building"));
        assert_eq!(
            f.events.names(),
            vec!["turn.created", "turn.updated", "turn.stateChanged", "turn.updated"]
        );
    }

    #[test]
    fn test_call_next_requires_assignment() {
        let f = setup();
        f.service
            .create_turn(CreateTurnRequest::new(f.patient_id, f.clinic_id), &nurse())
            .unwrap();

        let unassigned = Actor::new(20, Role::Clinician);
        assert!(matches!(
            f.service.call_next(f.clinic_id, &unassigned),
            Err(QueueError::Forbidden(_))
        ));

        let doctor = Actor::new(20, Role::Clinician).assigned_to(f.clinic_id);
        let called = f.service.call_next(f.clinic_id, &doctor).unwrap().unwrap();
        assert_eq!(called.turn.state, TurnState::Called);
        assert!(f.service.call_next(f.clinic_id, &doctor).unwrap().is_none());
    }

    #[test]
    fn test_clinician_limited_to_assigned_clinic() {
        let f = setup();
        let turn = f
            .service
            .create_turn(CreateTurnRequest::new(f.patient_id, f.clinic_id), &nurse())
            .unwrap();
        f.events.clear();

        let elsewhere = Actor::new(9, Role::Clinician).assigned_to(f.clinic_id + 1);
        for target in ["called", "cancelled"] {
            assert!(matches!(
                f.service.change_state(turn.turn.id, target, &elsewhere, None),
                Err(QueueError::Forbidden(_))
            ));
        }
        assert!(matches!(
            f.service
                .transition(turn.turn.id, TurnState::Called, &Actor::new(9, Role::Clinician), None),
            Err(QueueError::Forbidden(_))
        ));
        assert_eq!(f.service.history(turn.turn.id).unwrap().len(), 1);
        assert!(f.events.events().is_empty());

        let here = Actor::new(9, Role::Clinician).assigned_to(f.clinic_id);
        let called = f
            .service
            .transition(turn.turn.id, TurnState::Called, &here, None)
            .unwrap();
        assert_eq!(called.turn.state, TurnState::Called);

        // Nurses are not bound to a clinic by default
        let started = f
            .service
            .transition(turn.turn.id, TurnState::InProgress, &nurse(), None)
            .unwrap();
        assert_eq!(started.turn.state, TurnState::InProgress);
    }

    #[test]
    fn test_unauthorized_change_is_forbidden_before_parsing() {
        let f = setup();
        let err = f
            .service
            .change_state(1, "paused", &Actor::new(3, Role::Receptionist), None)
            .unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
    }

    #[test]
    fn test_history_of_unknown_turn() {
        let f = setup();
        assert!(matches!(f.service.history(5), Err(QueueError::NotFound(_))));
    }
}
