//! Clinic database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::Clinic;

impl Database {
    /// Insert a new clinic and return it with its assigned id.
    pub fn insert_clinic(
        &self,
        name: &str,
        location: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> DbResult<Clinic> {
        self.conn.execute(
            "INSERT INTO clinics (name, location, created_at) VALUES (?1, ?2, ?3)",
            params![name, location, created_at],
        )?;
        Ok(Clinic {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            location: location.map(str::to_string),
            created_at,
        })
    }

    /// Get a clinic by ID.
    pub fn get_clinic(&self, id: i64) -> DbResult<Option<Clinic>> {
        self.conn
            .query_row(
                "SELECT id, name, location, created_at FROM clinics WHERE id = ?",
                [id],
                clinic_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all clinics by id.
    pub fn list_clinics(&self) -> DbResult<Vec<Clinic>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, location, created_at FROM clinics ORDER BY id")?;
        let rows = stmt.query_map([], clinic_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn clinic_from_row(row: &Row<'_>) -> rusqlite::Result<Clinic> {
    Ok(Clinic {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_clinic() {
        let db = Database::open_in_memory().unwrap();
        let clinic = db
            .insert_clinic("Clínica Niño Feliz", Some("Ala B"), Utc::now())
            .unwrap();

        let retrieved = db.get_clinic(clinic.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Clínica Niño Feliz");
        assert_eq!(retrieved.location.as_deref(), Some("Ala B"));
    }

    #[test]
    fn test_get_missing_clinic() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_clinic(42).unwrap().is_none());
    }

    #[test]
    fn test_list_clinics() {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinic("A", None, Utc::now()).unwrap();
        db.insert_clinic("B", None, Utc::now()).unwrap();
        let names: Vec<String> = db.list_clinics().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
