//! Clinic models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service location with its own daily queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: i64,
    /// Display name; also the source of the ticket prefix
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}
