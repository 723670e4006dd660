//! Browser-side collaborator

use super::job::FieldReport;
use crate::auth::AuthSession;
use formwright_llm::{FieldDescriptor, PageContext};
use std::collections::HashMap;
use thiserror::Error;

/// Navigator failures
#[derive(Debug, Clone, Error)]
pub enum NavigatorError {
    /// The target could not be opened
    #[error("target not reachable: {0}")]
    Unreachable(String),

    /// The target has no form the navigator recognises
    #[error("no form found at {0}")]
    NoForm(String),

    /// Anything else the navigator reports
    #[error("navigator error: {0}")]
    Other(String),
}

/// Opens targets, reads their forms and fills them in.
///
/// The coordinator never interprets pages itself; everything it knows about
/// a form comes through this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    /// Fields of the form at `target`
    async fn detect_fields(&self, target: &str) -> Result<Vec<FieldDescriptor>, NavigatorError>;

    /// Credentials or instructions displayed next to the form
    async fn page_context(&self, target: &str) -> Result<Option<PageContext>, NavigatorError>;

    /// Fill the form, optionally inside an authenticated session
    async fn apply_values(
        &self,
        target: &str,
        session: Option<AuthSession>,
        values: &HashMap<String, String>,
    ) -> Result<FieldReport, NavigatorError>;

    /// Whether the target refused the session during the last fill
    async fn current_session_rejected(&self, target: &str) -> Result<bool, NavigatorError>;
}
