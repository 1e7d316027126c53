//! Turn database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_or_sqlite, is_unique_violation, Database, DbError, DbResult};
use crate::models::{NewTurn, Turn, TurnDetails};

const TURN_COLUMNS: &str = r#"
    t.id, t.ticket_number, t.sequence, t.patient_id, t.clinic_id, t.created_by,
    t.attended_by, t.state, t.priority, t.reason, t.notes, t.turn_date,
    t.registered_at, t.called_at, t.attendance_started_at, t.attendance_ended_at
"#;

impl Database {
    /// Insert a new turn in the `waiting` state.
    ///
    /// A clash on the ticket number or on the daily sequence is reported as
    /// [`DbError::DuplicateTicket`] so the caller can retry.
    pub fn insert_turn(&self, turn: &NewTurn) -> DbResult<Turn> {
        let result = self.conn.execute(
            r#"
            INSERT INTO turns (
                ticket_number, sequence, patient_id, clinic_id, created_by,
                state, priority, reason, turn_date, registered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'waiting', ?6, ?7, ?8, ?9)
            "#,
            params![
                turn.ticket_number,
                turn.sequence,
                turn.patient_id,
                turn.clinic_id,
                turn.created_by,
                turn.priority.as_str(),
                turn.reason,
                turn.date,
                turn.registered_at,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(DbError::DuplicateTicket(turn.ticket_number.clone()))
            }
            Err(e) => return Err(constraint_or_sqlite(e)),
        }

        let id = self.conn.last_insert_rowid();
        self.get_turn(id)?
            .ok_or_else(|| DbError::NotFound(format!("turn {}", id)))
    }

    /// Persist the mutable fields of a turn.
    ///
    /// Ticket number, clinic, patient, date and priority never change and
    /// are not written.
    pub fn update_turn(&self, turn: &Turn) -> DbResult<()> {
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE turns SET
                    state = ?2,
                    attended_by = ?3,
                    notes = ?4,
                    called_at = ?5,
                    attendance_started_at = ?6,
                    attendance_ended_at = ?7
                WHERE id = ?1
                "#,
                params![
                    turn.id,
                    turn.state.as_str(),
                    turn.attended_by,
                    turn.notes,
                    turn.called_at,
                    turn.attendance_started_at,
                    turn.attendance_ended_at,
                ],
            )
            .map_err(constraint_or_sqlite)?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("turn {}", turn.id)));
        }
        Ok(())
    }

    /// Get a turn by ID.
    pub fn get_turn(&self, id: i64) -> DbResult<Option<Turn>> {
        let sql = format!("SELECT {} FROM turns t WHERE t.id = ?", TURN_COLUMNS);
        self.conn
            .query_row(&sql, [id], TurnRow::from_row)
            .optional()?
            .map(Turn::try_from)
            .transpose()
    }

    /// Get a turn with its patient and clinic names.
    pub fn get_turn_details(&self, id: i64) -> DbResult<Option<TurnDetails>> {
        let sql = format!(
            r#"
            SELECT {}, p.name, c.name
            FROM turns t
            JOIN patients p ON p.id = t.patient_id
            JOIN clinics c ON c.id = t.clinic_id
            WHERE t.id = ?
            "#,
            TURN_COLUMNS
        );
        self.conn
            .query_row(&sql, [id], DetailsRow::from_row)
            .optional()?
            .map(TurnDetails::try_from)
            .transpose()
    }

    /// Count turns registered for a clinic on a given day.
    pub fn count_turns_for_day(&self, clinic_id: i64, date: NaiveDate) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE clinic_id = ?1 AND turn_date = ?2",
            params![clinic_id, date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// List every turn of a day, optionally restricted to one clinic,
    /// ordered by clinic then id.
    pub fn list_turns(&self, date: NaiveDate, clinic_id: Option<i64>) -> DbResult<Vec<TurnDetails>> {
        let sql = format!(
            r#"
            SELECT {}, p.name, c.name
            FROM turns t
            JOIN patients p ON p.id = t.patient_id
            JOIN clinics c ON c.id = t.clinic_id
            WHERE t.turn_date = ?1 AND (?2 IS NULL OR t.clinic_id = ?2)
            ORDER BY t.clinic_id, t.id
            "#,
            TURN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![date, clinic_id], DetailsRow::from_row)?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(row?.try_into()?);
        }
        Ok(turns)
    }
}

/// Intermediate row struct for database mapping.
struct TurnRow {
    id: i64,
    ticket_number: String,
    sequence: u32,
    patient_id: i64,
    clinic_id: i64,
    created_by: i64,
    attended_by: Option<i64>,
    state: String,
    priority: String,
    reason: Option<String>,
    notes: Option<String>,
    date: NaiveDate,
    registered_at: DateTime<Utc>,
    called_at: Option<DateTime<Utc>>,
    attendance_started_at: Option<DateTime<Utc>>,
    attendance_ended_at: Option<DateTime<Utc>>,
}

impl TurnRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            ticket_number: row.get(1)?,
            sequence: row.get(2)?,
            patient_id: row.get(3)?,
            clinic_id: row.get(4)?,
            created_by: row.get(5)?,
            attended_by: row.get(6)?,
            state: row.get(7)?,
            priority: row.get(8)?,
            reason: row.get(9)?,
            notes: row.get(10)?,
            date: row.get(11)?,
            registered_at: row.get(12)?,
            called_at: row.get(13)?,
            attendance_started_at: row.get(14)?,
            attendance_ended_at: row.get(15)?,
        })
    }
}

impl TryFrom<TurnRow> for Turn {
    type Error = DbError;

    fn try_from(row: TurnRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse()
            .map_err(|e| DbError::Constraint(format!("{}", e)))?;
        let priority = row
            .priority
            .parse()
            .map_err(|e| DbError::Constraint(format!("{}", e)))?;

        Ok(Turn {
            id: row.id,
            ticket_number: row.ticket_number,
            sequence: row.sequence,
            patient_id: row.patient_id,
            clinic_id: row.clinic_id,
            created_by: row.created_by,
            attended_by: row.attended_by,
            state,
            priority,
            reason: row.reason,
            notes: row.notes,
            date: row.date,
            registered_at: row.registered_at,
            called_at: row.called_at,
            attendance_started_at: row.attendance_started_at,
            attendance_ended_at: row.attendance_ended_at,
        })
    }
}

struct DetailsRow {
    turn: TurnRow,
    patient_name: String,
    clinic_name: String,
}

impl DetailsRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            turn: TurnRow::from_row(row)?,
            patient_name: row.get(16)?,
            clinic_name: row.get(17)?,
        })
    }
}

impl TryFrom<DetailsRow> for TurnDetails {
    type Error = DbError;

    fn try_from(row: DetailsRow) -> Result<Self, Self::Error> {
        Ok(TurnDetails {
            turn: row.turn.try_into()?,
            patient_name: row.patient_name,
            clinic_name: row.clinic_name,
        })
    }
}
