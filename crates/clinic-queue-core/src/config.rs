//! Queue configuration.
//!
//! Loaded from `CLINIC_QUEUE_*` environment variables with defaults for
//! everything:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CLINIC_QUEUE_DB_PATH` | `clinic-queue.db` |
//! | `CLINIC_QUEUE_CREATE_ROLES` | `nurse,admin` |
//! | `CLINIC_QUEUE_CALL_ROLES` | `clinician` |
//! | `CLINIC_QUEUE_TRANSITION_ROLES` | `admin,nurse,clinician` |
//! | `CLINIC_QUEUE_CLINIC_SCOPED_ROLES` | `clinician` |
//! | `CLINIC_QUEUE_CALL_REQUIRES_ASSIGNMENT` | `true` |
//! | `CLINIC_QUEUE_MAX_TICKET_ATTEMPTS` | `3` |
//! | `CLINIC_QUEUE_CREATE_LIMIT` | `30` (0 disables) |
//! | `CLINIC_QUEUE_CREATE_WINDOW_SECS` | `60` |
//! | `CLINIC_QUEUE_PUBLIC_BOARD_LIMIT` | `10` |

use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;
use crate::policy::AccessPolicy;
use crate::rate_limit::RateLimitConfig;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{key} must be at least 1")]
    Zero { key: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the turn service and its queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// SQLite database file
    pub db_path: String,
    pub policy: AccessPolicy,
    /// Attempts at generating a fresh ticket before giving up
    pub max_ticket_attempts: u32,
    /// Per-actor creation limit; `None` disables it
    pub create_rate_limit: Option<RateLimitConfig>,
    /// Maximum entries on the public board
    pub public_board_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: "clinic-queue.db".to_string(),
            policy: AccessPolicy::default(),
            max_ticket_attempts: 3,
            create_rate_limit: Some(RateLimitConfig::default()),
            public_board_limit: 10,
        }
    }
}

impl QueueConfig {
    /// Load from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_limit = RateLimitConfig::default();

        let policy = AccessPolicy {
            create_roles: roles(&lookup, "CLINIC_QUEUE_CREATE_ROLES")?
                .unwrap_or(defaults.policy.create_roles),
            call_roles: roles(&lookup, "CLINIC_QUEUE_CALL_ROLES")?
                .unwrap_or(defaults.policy.call_roles),
            transition_roles: roles(&lookup, "CLINIC_QUEUE_TRANSITION_ROLES")?
                .unwrap_or(defaults.policy.transition_roles),
            clinic_scoped_roles: roles(&lookup, "CLINIC_QUEUE_CLINIC_SCOPED_ROLES")?
                .unwrap_or(defaults.policy.clinic_scoped_roles),
            call_requires_assignment: parsed(&lookup, "CLINIC_QUEUE_CALL_REQUIRES_ASSIGNMENT")?
                .unwrap_or(defaults.policy.call_requires_assignment),
        };

        let max_ticket_attempts = parsed(&lookup, "CLINIC_QUEUE_MAX_TICKET_ATTEMPTS")?
            .unwrap_or(defaults.max_ticket_attempts);
        if max_ticket_attempts == 0 {
            return Err(ConfigError::Zero {
                key: "CLINIC_QUEUE_MAX_TICKET_ATTEMPTS".into(),
            });
        }

        let limit: u32 = parsed(&lookup, "CLINIC_QUEUE_CREATE_LIMIT")?.unwrap_or(default_limit.limit);
        let window_secs: u64 = parsed(&lookup, "CLINIC_QUEUE_CREATE_WINDOW_SECS")?
            .unwrap_or(default_limit.window_secs);
        if window_secs == 0 {
            return Err(ConfigError::Zero {
                key: "CLINIC_QUEUE_CREATE_WINDOW_SECS".into(),
            });
        }
        let create_rate_limit = (limit > 0).then_some(RateLimitConfig { limit, window_secs });

        Ok(Self {
            db_path: lookup("CLINIC_QUEUE_DB_PATH").unwrap_or(defaults.db_path),
            policy,
            max_ticket_attempts,
            create_rate_limit,
            public_board_limit: parsed(&lookup, "CLINIC_QUEUE_PUBLIC_BOARD_LIMIT")?
                .unwrap_or(defaults.public_board_limit),
        })
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Comma-separated role list.
fn roles<F>(lookup: &F, key: &str) -> ConfigResult<Option<HashSet<Role>>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Role>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: s.to_string(),
            })
        })
        .collect::<ConfigResult<HashSet<Role>>>()
        .map(Some)
}
