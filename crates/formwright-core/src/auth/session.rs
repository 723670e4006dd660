//! Session entity

use super::state::{AuthEvent, AuthState, InvalidTransition};
use super::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque serialized browser/session state (cookies, storage) for one identity.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionArtifact(serde_json::Value);

impl SessionArtifact {
    /// Wrap a serialized session state
    #[must_use]
    pub fn new(state: serde_json::Value) -> Self {
        Self(state)
    }

    /// The serialized state
    #[must_use]
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

// Artifacts carry cookies; never print them
impl fmt::Debug for SessionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionArtifact([REDACTED])")
    }
}

/// One identity's session as seen by the auth manager.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Opaque account key
    pub identity: String,
    /// Current lifecycle state
    pub state: AuthState,
    /// When the artifact was obtained
    pub created_at: Option<DateTime<Utc>>,
    /// When the artifact stops being trusted
    pub expires_at: Option<DateTime<Utc>>,
    /// The artifact, once authenticated
    pub cached_artifact: Option<SessionArtifact>,
    /// Why the last attempt failed
    pub last_error: Option<AuthError>,
    /// States visited during the current attempt, oldest first
    pub history: Vec<AuthState>,
}

impl AuthSession {
    /// A fresh, unauthenticated session
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: AuthState::Unauthenticated,
            created_at: None,
            expires_at: None,
            cached_artifact: None,
            last_error: None,
            history: vec![AuthState::Unauthenticated],
        }
    }

    /// Rebuild an authenticated session from a cache entry
    #[must_use]
    pub fn restored(
        identity: impl Into<String>,
        artifact: SessionArtifact,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            state: AuthState::Authenticated,
            created_at: Some(created_at),
            expires_at: Some(expires_at),
            cached_artifact: Some(artifact),
            last_error: None,
            history: vec![AuthState::Authenticated],
        }
    }

    /// Feed an event through the state machine
    pub fn apply(&mut self, event: AuthEvent) -> Result<AuthState, InvalidTransition> {
        let next = self.state.on(event)?;
        self.state = next;
        self.history.push(next);
        Ok(next)
    }

    /// Move to `Failed`, recording `error`
    pub fn fail(&mut self, error: AuthError) {
        if self.apply(AuthEvent::Rejected).is_err() {
            self.state = AuthState::Failed;
            self.history.push(AuthState::Failed);
        }
        self.last_error = Some(error);
    }

    /// Record a newly obtained artifact valid for `ttl`
    pub fn store_artifact(&mut self, artifact: SessionArtifact, now: DateTime<Utc>, ttl: Duration) {
        self.created_at = Some(now);
        self.expires_at = Some(now + ttl);
        self.cached_artifact = Some(artifact);
        self.last_error = None;
    }

    /// Whether `expires_at` has passed at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Authenticated, holding an artifact, and not yet expired
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.state == AuthState::Authenticated
            && self.cached_artifact.is_some()
            && !self.is_expired_at(now)
    }
}
