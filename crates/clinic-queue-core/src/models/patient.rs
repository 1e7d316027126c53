//! Patient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    /// Full name (the only field shown on public displays)
    pub name: String,
    /// Age in years
    pub age: Option<u32>,
    pub gender: Option<String>,
    /// National or clinic document number
    pub document_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values needed to register a patient.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub document_id: Option<String>,
}

impl NewPatient {
    /// Create a new patient record with only the required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
