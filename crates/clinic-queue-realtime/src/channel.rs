//! Broadcast channel identity.

use std::fmt;
use std::str::FromStr;

/// A logical broadcast group.
///
/// Every connection is implicitly in [`Channel::Global`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Global,
    Clinic(i64),
    PublicScreen,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Global => f.write_str("global"),
            Channel::Clinic(id) => write!(f, "clinic:{}", id),
            Channel::PublicScreen => f.write_str("public-screen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Channel::Global),
            "public-screen" => Ok(Channel::PublicScreen),
            _ => s
                .strip_prefix("clinic:")
                .and_then(|id| id.parse().ok())
                .map(Channel::Clinic)
                .ok_or_else(|| UnknownChannel(s.to_string())),
        }
    }
}
