//! Acting users as seen by the core.
//!
//! Authentication lives outside this crate; an [`Actor`] is trusted as
//! already validated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Nurse,
    Clinician,
    Receptionist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Nurse => "nurse",
            Role::Clinician => "clinician",
            Role::Receptionist => "receptionist",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive; legacy Spanish role names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrador" => Ok(Role::Admin),
            "nurse" | "enfermero" | "enfermera" => Ok(Role::Nurse),
            "clinician" | "medico" | "médico" => Ok(Role::Clinician),
            "receptionist" | "recepcion" | "recepción" => Ok(Role::Receptionist),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i64,
    pub role: Role,
    /// Clinic a clinician is bound to
    pub assigned_clinic_id: Option<i64>,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self {
            id,
            role,
            assigned_clinic_id: None,
        }
    }

    pub fn assigned_to(mut self, clinic_id: i64) -> Self {
        self.assigned_clinic_id = Some(clinic_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_are_case_insensitive() {
        assert_eq!("Enfermero".parse::<Role>().unwrap(), Role::Nurse);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("medico".parse::<Role>().unwrap(), Role::Clinician);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_actor_builder() {
        let actor = Actor::new(4, Role::Clinician).assigned_to(2);
        assert_eq!(actor.assigned_clinic_id, Some(2));
    }
}
