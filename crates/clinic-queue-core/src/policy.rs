//! Role checks layered in front of the queue operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};
use crate::models::{Actor, Role};

/// Which roles may perform which queue operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub create_roles: HashSet<Role>,
    pub call_roles: HashSet<Role>,
    pub transition_roles: HashSet<Role>,
    /// Roles that may only move turns of the clinic they are assigned to
    pub clinic_scoped_roles: HashSet<Role>,
    /// Enforce clinic assignment: for every `call_next` caller, and for
    /// transitions made by a `clinic_scoped_roles` member
    pub call_requires_assignment: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            create_roles: [Role::Nurse, Role::Admin].into_iter().collect(),
            call_roles: [Role::Clinician].into_iter().collect(),
            transition_roles: [Role::Admin, Role::Nurse, Role::Clinician].into_iter().collect(),
            clinic_scoped_roles: [Role::Clinician].into_iter().collect(),
            call_requires_assignment: true,
        }
    }
}

impl AccessPolicy {
    /// A policy that lets every role do everything.
    pub fn permissive() -> Self {
        let all: HashSet<Role> = [Role::Admin, Role::Nurse, Role::Clinician, Role::Receptionist]
            .into_iter()
            .collect();
        Self {
            create_roles: all.clone(),
            call_roles: all.clone(),
            transition_roles: all,
            clinic_scoped_roles: HashSet::new(),
            call_requires_assignment: false,
        }
    }

    pub fn check_create(&self, actor: &Actor) -> QueueResult<()> {
        require(&self.create_roles, actor, "create turns")
    }

    pub fn check_transition(&self, actor: &Actor) -> QueueResult<()> {
        require(&self.transition_roles, actor, "change turn state")
    }

    pub fn check_call(&self, actor: &Actor, clinic_id: i64) -> QueueResult<()> {
        require(&self.call_roles, actor, "call patients")?;
        if self.call_requires_assignment {
            require_assignment(actor, clinic_id)?;
        }
        Ok(())
    }

    /// Whether `actor` may move a turn that belongs to `clinic_id`.
    pub fn check_clinic_scope(&self, actor: &Actor, clinic_id: i64) -> QueueResult<()> {
        if self.call_requires_assignment && self.clinic_scoped_roles.contains(&actor.role) {
            require_assignment(actor, clinic_id)?;
        }
        Ok(())
    }
}

fn require_assignment(actor: &Actor, clinic_id: i64) -> QueueResult<()> {
    if actor.assigned_clinic_id == Some(clinic_id) {
        Ok(())
    } else {
        Err(QueueError::Forbidden(format!(
            "user {} is not assigned to clinic {}",
            actor.id, clinic_id
        )))
    }
}

fn require(roles: &HashSet<Role>, actor: &Actor, what: &str) -> QueueResult<()> {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        Err(QueueError::Forbidden(format!(
            "role {} may not {}",
            actor.role, what
        )))
    }
}
