//! Formwright Core - Authentication and job coordination
//!
//! This crate provides:
//! - Auth: the session lifecycle state machine, token caches and the
//!   single-flight [`AuthManager`]
//! - Credentials: secret handling and identity → credential lookup
//! - Coordinator: a bounded worker pool that fills forms through a
//!   [`Navigator`] using batched value generation
//! - Error: the crate error and CLI formatting

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod coordinator;
pub mod credentials;
pub mod error;

pub use auth::{
    is_auth_required, AuthConfig, AuthError, AuthManager, AuthSession, AuthState, AuthStatus,
    FileTokenCache, IdentityProvider, MemoryTokenCache, TokenCache,
};
pub use coordinator::{
    ConcurrencyCoordinator, CoordinatorConfig, FieldReport, Job, JobResult, JobStatus, Navigator,
    NavigatorError, ScenarioResult,
};
pub use credentials::{Credential, CredentialSource, SecureString, StaticCredentials};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
