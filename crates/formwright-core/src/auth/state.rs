//! Authentication lifecycle states and transitions
//!
//! The transition function is pure: it neither waits nor performs I/O.
//! [`super::AuthManager`] feeds it events as logins, challenges and
//! deadlines resolve.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one identity's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No attempt has started
    Unauthenticated,
    /// Credentials submitted to the identity provider
    LoggingIn,
    /// Waiting for a second factor to be completed out of band
    AwaitingChallenge,
    /// Session artifact is usable
    Authenticated,
    /// Session reached `expires_at` or was rejected downstream
    Expired,
    /// The attempt ended without a session
    Failed,
}

impl AuthState {
    /// Whether an attempt is in progress
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::LoggingIn | Self::AwaitingChallenge)
    }

    /// Lowercase name for display
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::LoggingIn => "logging_in",
            Self::AwaitingChallenge => "awaiting_challenge",
            Self::Authenticated => "authenticated",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Apply `event`, returning the next state.
    pub fn on(self, event: AuthEvent) -> Result<AuthState, InvalidTransition> {
        use AuthEvent as E;
        use AuthState as S;

        let next = match (self, event) {
            (S::Unauthenticated | S::Expired, E::Begin) => S::LoggingIn,
            (S::LoggingIn, E::ChallengeIssued) => S::AwaitingChallenge,
            (S::LoggingIn, E::Accepted) => S::Authenticated,
            (S::AwaitingChallenge, E::ChallengeCompleted) => S::Authenticated,
            (S::AwaitingChallenge, E::ChallengeTimedOut) => S::Failed,
            // A malformed credential fails before the provider is contacted
            (S::Unauthenticated | S::LoggingIn | S::AwaitingChallenge, E::Rejected) => S::Failed,
            (S::Authenticated, E::Expire) => S::Expired,
            (s, E::Restart) if !s.is_in_flight() => S::Unauthenticated,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    /// Start (or restart after expiry) a login
    Begin,
    /// Provider asked for a second factor
    ChallengeIssued,
    /// Provider accepted the credential outright
    Accepted,
    /// Second factor completed before the deadline
    ChallengeCompleted,
    /// Second-factor deadline passed
    ChallengeTimedOut,
    /// Credential malformed or refused
    Rejected,
    /// Session reached expiry or was refused by the target
    Expire,
    /// Discard the previous attempt
    Restart,
}

/// An event that is not valid in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    /// State the event arrived in
    pub from: AuthState,
    /// The rejected event
    pub event: AuthEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {:?} is not valid in state {}", self.event, self.from)
    }
}

impl std::error::Error for InvalidTransition {}
