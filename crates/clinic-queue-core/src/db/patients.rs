//! Patient database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{NewPatient, Patient};

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &NewPatient, created_at: DateTime<Utc>) -> DbResult<Patient> {
        self.conn.execute(
            r#"
            INSERT INTO patients (name, age, gender, document_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                patient.name,
                patient.age,
                patient.gender,
                patient.document_id,
                created_at,
            ],
        )?;
        Ok(Patient {
            id: self.conn.last_insert_rowid(),
            name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender.clone(),
            document_id: patient.document_id.clone(),
            created_at,
        })
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, age, gender, document_id, created_at
                FROM patients
                WHERE id = ?
                "#,
                [id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all patients by id.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, age, gender, document_id, created_at FROM patients ORDER BY id",
        )?;
        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        document_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_patient() {
        let db = Database::open_in_memory().unwrap();
        let mut new = NewPatient::new("María José");
        new.age = Some(34);
        let patient = db.insert_patient(&new, Utc::now()).unwrap();

        let retrieved = db.get_patient(patient.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "María José");
        assert_eq!(retrieved.age, Some(34));
        assert_eq!(retrieved.gender, None);
    }

    #[test]
    fn test_list_patients() {
        let db = Database::open_in_memory().unwrap();
        for name in ["Max", "Bella"] {
            db.insert_patient(&NewPatient::new(name), Utc::now()).unwrap();
        }
        let names: Vec<String> = db.list_patients().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Max", "Bella"]);
    }

    #[test]
    fn test_missing_patient() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_patient(42).unwrap().is_none());
    }
}
