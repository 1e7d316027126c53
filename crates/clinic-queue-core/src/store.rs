//! Persistence boundary consumed by the turn lifecycle.
//!
//! The lifecycle code only talks to a [`QueueStore`]. [`Database`] is the
//! SQLite implementation; tests wrap it to inject storage behaviour such as
//! concurrent inserts.

use chrono::NaiveDate;

use crate::db::{Database, DbError, DbResult};
use crate::models::{Clinic, HistoryEntry, NewHistoryEntry, NewTurn, Patient, Turn, TurnDetails};

/// Storage operations required by the queue core.
pub trait QueueStore {
    /// Run `f` atomically: either every write inside it commits or none does.
    fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>;

    fn get_clinic(&self, id: i64) -> DbResult<Option<Clinic>>;

    fn get_patient(&self, id: i64) -> DbResult<Option<Patient>>;

    /// Number of turns already registered for `(clinic_id, date)`.
    fn count_turns_for_day(&self, clinic_id: i64, date: NaiveDate) -> DbResult<u32>;

    /// Insert a turn; a ticket clash is `DbError::DuplicateTicket`.
    fn insert_turn(&self, turn: &NewTurn) -> DbResult<Turn>;

    fn get_turn(&self, id: i64) -> DbResult<Option<Turn>>;

    fn update_turn(&self, turn: &Turn) -> DbResult<()>;

    fn get_turn_details(&self, id: i64) -> DbResult<Option<TurnDetails>>;

    /// All turns of a day, optionally for one clinic.
    fn list_turns(&self, date: NaiveDate, clinic_id: Option<i64>) -> DbResult<Vec<TurnDetails>>;

    fn append_history(&self, entry: &NewHistoryEntry) -> DbResult<HistoryEntry>;

    fn history_for(&self, turn_id: i64) -> DbResult<Vec<HistoryEntry>>;
}

impl QueueStore for Database {
    fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        Database::in_transaction(self, f)
    }

    fn get_clinic(&self, id: i64) -> DbResult<Option<Clinic>> {
        Database::get_clinic(self, id)
    }

    fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        Database::get_patient(self, id)
    }

    fn count_turns_for_day(&self, clinic_id: i64, date: NaiveDate) -> DbResult<u32> {
        Database::count_turns_for_day(self, clinic_id, date)
    }

    fn insert_turn(&self, turn: &NewTurn) -> DbResult<Turn> {
        Database::insert_turn(self, turn)
    }

    fn get_turn(&self, id: i64) -> DbResult<Option<Turn>> {
        Database::get_turn(self, id)
    }

    fn update_turn(&self, turn: &Turn) -> DbResult<()> {
        Database::update_turn(self, turn)
    }

    fn get_turn_details(&self, id: i64) -> DbResult<Option<TurnDetails>> {
        Database::get_turn_details(self, id)
    }

    fn list_turns(&self, date: NaiveDate, clinic_id: Option<i64>) -> DbResult<Vec<TurnDetails>> {
        Database::list_turns(self, date, clinic_id)
    }

    fn append_history(&self, entry: &NewHistoryEntry) -> DbResult<HistoryEntry> {
        Database::append_history(self, entry)
    }

    fn history_for(&self, turn_id: i64) -> DbResult<Vec<HistoryEntry>> {
        Database::history_for(self, turn_id)
    }
}
