//! Authentication lifecycle
//!
//! Provides:
//! - A pure state machine over login, second factor, expiry and failure
//! - A token cache contract with memory and file implementations
//! - [`AuthManager`], which drives the machine and guarantees at most one
//!   login attempt in flight per identity

mod cache;
mod manager;
mod provider;
mod session;
mod state;

#[cfg(test)]
mod tests;

pub use cache::{CachedSession, FileTokenCache, MemoryTokenCache, TokenCache};
pub use manager::{AuthConfig, AuthManager, AuthStatus};
pub use provider::{
    ChallengeHandle, ChallengeResolution, ChallengeSender, IdentityProvider, LoginError,
    LoginOutcome,
};
pub use session::{AuthSession, SessionArtifact};
pub use state::{AuthEvent, AuthState, InvalidTransition};

use thiserror::Error;

/// Authentication failures surfaced to callers.
///
/// `Clone` because every caller joined to one in-flight attempt receives
/// the same result.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Login refused, malformed credential, or provider unavailable after retries
    #[error("login failed for {identity}: {reason}")]
    LoginFailed {
        /// Identity being authenticated
        identity: String,
        /// What went wrong
        reason: String,
    },

    /// Second factor not completed before the deadline
    #[error("second-factor challenge for {identity} not completed within {timeout_secs}s")]
    ChallengeTimeout {
        /// Identity being authenticated
        identity: String,
        /// Configured deadline
        timeout_secs: u64,
    },

    /// Cached session expired or refused and no credential is available
    #[error("session for {0} expired; re-authentication required")]
    ReauthRequired(String),

    /// Nothing cached and no credential available
    #[error("no cached session or credential for {0}")]
    CredentialRequired(String),

    /// Token cache failure
    #[error("token cache error: {0}")]
    Cache(String),

    /// An event arrived in a state that does not accept it
    #[error("invalid auth transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),
}

impl AuthError {
    /// Whether the user has to step in (log in interactively, supply a credential)
    #[must_use]
    pub fn needs_user(&self) -> bool {
        matches!(
            self,
            AuthError::ReauthRequired(_)
                | AuthError::CredentialRequired(_)
                | AuthError::ChallengeTimeout { .. }
        )
    }
}

/// Whether `target` sits behind one of the protected `domains`.
///
/// Matches the host exactly or as a subdomain, ignoring scheme, port, path
/// and case.
///
/// ```
/// use formwright_core::auth::is_auth_required;
///
/// let domains = ["office.com".to_string()];
/// assert!(is_auth_required("https://portal.office.com/app", &domains));
/// assert!(!is_auth_required("https://notoffice.com/", &domains));
/// ```
#[must_use]
pub fn is_auth_required(target: &str, domains: &[String]) -> bool {
    let Some(host) = host_of(target) else {
        return false;
    };
    domains.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches('.').to_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.')))
    })
}

fn host_of(target: &str) -> Option<String> {
    let rest = target
        .split_once("://")
        .map_or(target, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = authority.split(':').next()?.to_lowercase();
    (!host.is_empty()).then_some(host)
}
