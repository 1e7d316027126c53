//! Connection authentication.
//!
//! A connection without a credential is an anonymous viewer: it receives
//! broadcasts but may only join the public screen. A connection that
//! presents a credential must pass verification or it is rejected.

use std::collections::HashMap;

use clinic_queue_core::Actor;
use sha2::{Digest, Sha256};

use crate::error::{RealtimeError, RealtimeResult};

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    /// Kiosk display or unauthenticated client
    Anonymous,
    Staff(Actor),
}

impl Viewer {
    pub fn is_staff(&self) -> bool {
        matches!(self, Viewer::Staff(_))
    }

    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Viewer::Staff(actor) => Some(actor),
            Viewer::Anonymous => None,
        }
    }
}

/// Validates bearer credentials presented at connection time.
pub trait CredentialVerifier: Send + Sync {
    /// The actor the token belongs to, or `AuthenticationFailed`.
    fn verify(&self, token: &str) -> RealtimeResult<Actor>;
}

/// Resolve the viewer for an optional credential. Blank counts as absent.
pub fn authenticate(verifier: &dyn CredentialVerifier, credential: Option<&str>) -> RealtimeResult<Viewer> {
    match credential.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(Viewer::Anonymous),
        Some(token) => verifier.verify(token).map(Viewer::Staff),
    }
}

/// SHA-256 hex fingerprint of a token.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Verifier over a fixed set of issued tokens.
///
/// Only fingerprints are stored, never the tokens themselves.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Actor>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, actor: Actor) -> Self {
        self.issue(token, actor);
        self
    }

    pub fn issue(&mut self, token: &str, actor: Actor) {
        self.tokens.insert(fingerprint(token), actor);
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.tokens.remove(&fingerprint(token)).is_some()
    }
}

impl CredentialVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> RealtimeResult<Actor> {
        self.tokens
            .get(&fingerprint(token))
            .cloned()
            .ok_or_else(|| RealtimeError::AuthenticationFailed("unknown or revoked token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_queue_core::Role;

    #[test]
    fn test_fingerprint() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_authenticate() {
        let nurse = Actor::new(3, Role::Nurse);
        let mut verifier = StaticTokenVerifier::new().with_token("s3cret", nurse.clone());

        assert_eq!(authenticate(&verifier, None).unwrap(), Viewer::Anonymous);
        assert_eq!(authenticate(&verifier, Some("  ")).unwrap(), Viewer::Anonymous);
        assert_eq!(authenticate(&verifier, Some("s3cret")).unwrap(), Viewer::Staff(nurse));
        assert!(matches!(
            authenticate(&verifier, Some("guess")),
            Err(RealtimeError::AuthenticationFailed(_))
        ));

        assert!(verifier.revoke("s3cret"));
        assert!(authenticate(&verifier, Some("s3cret")).is_err());
    }
}
