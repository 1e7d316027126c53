//! Turn history database operations (append-only).

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{constraint_or_sqlite, Database, DbError, DbResult};
use crate::models::{HistoryEntry, NewHistoryEntry, TurnState};

impl Database {
    /// Append a history entry. Fails with `NotFound` if the turn is absent.
    pub fn append_history(&self, entry: &NewHistoryEntry) -> DbResult<HistoryEntry> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM turns WHERE id = ?)",
            [entry.turn_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DbError::NotFound(format!("turn {}", entry.turn_id)));
        }

        self.conn
            .execute(
                r#"
                INSERT INTO turn_history (
                    turn_id, actor_id, prior_state, new_state, comment, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.turn_id,
                    entry.actor_id,
                    entry.prior_state.map(|s| s.as_str()),
                    entry.new_state.as_str(),
                    entry.comment,
                    entry.recorded_at,
                ],
            )
            .map_err(constraint_or_sqlite)?;

        Ok(HistoryEntry {
            id: self.conn.last_insert_rowid(),
            turn_id: entry.turn_id,
            actor_id: entry.actor_id,
            prior_state: entry.prior_state,
            new_state: entry.new_state,
            comment: entry.comment.clone(),
            recorded_at: entry.recorded_at,
        })
    }

    /// History of a turn, oldest first. Empty if the turn has none.
    pub fn history_for(&self, turn_id: i64) -> DbResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, turn_id, actor_id, prior_state, new_state, comment, recorded_at
            FROM turn_history
            WHERE turn_id = ?
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map([turn_id], HistoryRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

struct HistoryRow {
    id: i64,
    turn_id: i64,
    actor_id: i64,
    prior_state: Option<String>,
    new_state: String,
    comment: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            turn_id: row.get(1)?,
            actor_id: row.get(2)?,
            prior_state: row.get(3)?,
            new_state: row.get(4)?,
            comment: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }
}

fn parse_state(s: &str) -> DbResult<TurnState> {
    s.parse().map_err(|e| DbError::Constraint(format!("{}", e)))
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryEntry {
            id: row.id,
            turn_id: row.turn_id,
            actor_id: row.actor_id,
            prior_state: row.prior_state.as_deref().map(parse_state).transpose()?,
            new_state: parse_state(&row.new_state)?,
            comment: row.comment,
            recorded_at: row.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPatient, NewTurn, Priority};
    use chrono::NaiveDate;

    fn setup_turn() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let clinic = db.insert_clinic("General", None, Utc::now()).unwrap();
        let patient = db.insert_patient(&NewPatient::new("Max"), Utc::now()).unwrap();
        let turn = db
            .insert_turn(&NewTurn {
                ticket_number: "GEN-1-1109-001".into(),
                sequence: 1,
                patient_id: patient.id,
                clinic_id: clinic.id,
                created_by: 3,
                priority: Priority::Normal,
                reason: None,
                date: NaiveDate::from_ymd_opt(2024, 11, 9).unwrap(),
                registered_at: Utc::now(),
            })
            .unwrap();
        (db, turn.id)
    }

    fn entry(turn_id: i64, prior: Option<TurnState>, new: TurnState) -> NewHistoryEntry {
        NewHistoryEntry {
            turn_id,
            actor_id: 3,
            prior_state: prior,
            new_state: new,
            comment: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read_in_order() {
        let (db, turn_id) = setup_turn();
        db.append_history(&entry(turn_id, None, TurnState::Waiting)).unwrap();
        db.append_history(&entry(turn_id, Some(TurnState::Waiting), TurnState::Called))
            .unwrap();
        db.append_history(&entry(turn_id, Some(TurnState::Called), TurnState::InProgress))
            .unwrap();

        let history = db.history_for(turn_id).unwrap();
        let states: Vec<_> = history.iter().map(|h| h.new_state).collect();
        assert_eq!(
            states,
            vec![TurnState::Waiting, TurnState::Called, TurnState::InProgress]
        );
        assert!(history[0].is_creation());
        assert_eq!(history[2].prior_state, Some(TurnState::Called));
    }

    #[test]
    fn test_empty_history_is_not_an_error() {
        let (db, turn_id) = setup_turn();
        assert!(db.history_for(turn_id).unwrap().is_empty());
        assert!(db.history_for(12345).unwrap().is_empty());
    }

    #[test]
    fn test_append_for_missing_turn() {
        let (db, _) = setup_turn();
        let result = db.append_history(&entry(999, None, TurnState::Waiting));
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
