//! Error types for formwright-core
//!
//! This module provides the crate error and its CLI formatting.

use crate::auth::AuthError;
use crate::coordinator::NavigatorError;
use thiserror::Error;

/// Core error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Authentication failed or needs the user
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// The navigator could not read or fill the form
    #[error("navigator error: {0}")]
    Navigator(#[from] NavigatorError),

    /// Invalid configuration or input file
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A worker panicked or was cancelled
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Human-readable message plus, where one exists, what to do about it
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Auth(AuthError::ChallengeTimeout {
                identity,
                timeout_secs,
            }) => format!(
                "🔐 Second-factor approval for {} did not arrive within {}s.",
                identity, timeout_secs
            ),
            Error::Auth(AuthError::ReauthRequired(identity)) => {
                format!("🔐 The session for {} has expired.", identity)
            }
            Error::Auth(AuthError::CredentialRequired(identity)) => {
                format!("🔐 No session or credential is available for {}.", identity)
            }
            Error::Auth(e) => format!("🔐 Authentication failed: {}", e),
            Error::Navigator(e) => format!("🌐 Could not work with the form: {}", e),
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::Internal(msg) => format!("❌ Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Auth(AuthError::ChallengeTimeout { .. }) => Some(
                "💡 Approve the sign-in prompt sooner, or raise auth.two_fa_timeout_secs."
                    .to_string(),
            ),
            Error::Auth(AuthError::ReauthRequired(identity))
            | Error::Auth(AuthError::CredentialRequired(identity)) => Some(format!(
                "💡 Run `formwright auth import {} <state.json>` with a fresh browser session.",
                identity
            )),
            Error::Auth(AuthError::Cache(_)) => {
                Some("💡 Check permissions on the session directory, or run `formwright auth clear`.".to_string())
            }
            Error::Configuration(_) => Some(
                "💡 Check config/default.toml, your --config file and FORMWRIGHT_* variables."
                    .to_string(),
            ),
            Error::Navigator(NavigatorError::NoForm(_)) => {
                Some("💡 Make sure the manifest has a form entry for this target.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    output.push('\n');

    if let Some(suggestion) = error.suggestion() {
        output.push('\n');
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}
