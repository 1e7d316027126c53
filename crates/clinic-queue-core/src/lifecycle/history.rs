//! Audit trail for turn creations and transitions.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::DbResult;
use crate::models::{HistoryEntry, NewHistoryEntry, TurnState};
use crate::store::QueueStore;

/// Comment stored on the entry written when a turn is issued.
pub const CREATION_COMMENT: &str = "Turn created";

/// Appends history entries through a [`QueueStore`].
pub struct HistoryRecorder<'a, S> {
    store: &'a S,
}

impl<'a, S: QueueStore> HistoryRecorder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append one entry. Fails only if the turn does not exist.
    pub fn record(
        &self,
        turn_id: i64,
        prior_state: Option<TurnState>,
        new_state: TurnState,
        actor_id: i64,
        comment: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> DbResult<HistoryEntry> {
        let entry = self.store.append_history(&NewHistoryEntry {
            turn_id,
            actor_id,
            prior_state,
            new_state,
            comment: comment.map(str::to_string),
            recorded_at,
        })?;

        debug!(
            turn_id,
            prior = prior_state.map(|s| s.as_str()).unwrap_or("-"),
            new = new_state.as_str(),
            "Recorded history entry"
        );
        Ok(entry)
    }

    /// Record the issuing of a turn.
    pub fn record_creation(
        &self,
        turn_id: i64,
        actor_id: i64,
        recorded_at: DateTime<Utc>,
    ) -> DbResult<HistoryEntry> {
        self.record(
            turn_id,
            None,
            TurnState::Waiting,
            actor_id,
            Some(CREATION_COMMENT),
            recorded_at,
        )
    }

    /// Entries for a turn, oldest first.
    pub fn history_for(&self, turn_id: i64) -> DbResult<Vec<HistoryEntry>> {
        self.store.history_for(turn_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, DbError};
    use crate::models::{NewPatient, NewTurn, Priority};
    use chrono::NaiveDate;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let clinic = db.insert_clinic("General", None, Utc::now()).unwrap();
        let patient = db.insert_patient(&NewPatient::new("Ana"), Utc::now()).unwrap();
        let turn = db
            .insert_turn(&NewTurn {
                ticket_number: "GEN-1-1109-001".into(),
                sequence: 1,
                patient_id: patient.id,
                clinic_id: clinic.id,
                created_by: 2,
                priority: Priority::Urgent,
                reason: Some("fever".into()),
                date: NaiveDate::from_ymd_opt(2024, 11, 9).unwrap(),
                registered_at: Utc::now(),
            })
            .unwrap();
        (db, turn.id)
    }

    #[test]
    fn test_creation_then_transitions() {
        let (db, turn_id) = setup();
        let recorder = HistoryRecorder::new(&db);

        let created = recorder.record_creation(turn_id, 2, Utc::now()).unwrap();
        assert!(created.is_creation());
        assert_eq!(created.comment.as_deref(), Some(CREATION_COMMENT));

        recorder
            .record(turn_id, Some(TurnState::Waiting), TurnState::Called, 5, None, Utc::now())
            .unwrap();
        recorder
            .record(
                turn_id,
                Some(TurnState::Called),
                TurnState::Called,
                5,
                Some("second call"),
                Utc::now(),
            )
            .unwrap();

        let history = recorder.history_for(turn_id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].prior_state, Some(TurnState::Called));
        assert_eq!(history[2].comment.as_deref(), Some("second call"));
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_missing_turn() {
        let (db, _) = setup();
        let recorder = HistoryRecorder::new(&db);
        assert!(matches!(
            recorder.record_creation(404, 2, Utc::now()),
            Err(DbError::NotFound(_))
        ));
        assert!(recorder.history_for(404).unwrap().is_empty());
    }
}
