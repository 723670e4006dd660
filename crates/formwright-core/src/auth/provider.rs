//! Identity provider collaborator
//!
//! The provider drives the real login (usually a browser). When it needs a
//! second factor it returns a [`ChallengeHandle`]; whoever completes the
//! challenge out of band resolves it through the paired [`ChallengeSender`].

use super::session::SessionArtifact;
use crate::credentials::Credential;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// How a second-factor challenge ended
#[derive(Debug)]
pub enum ChallengeResolution {
    /// Completed; the provider produced a session
    Completed(SessionArtifact),
    /// Denied or cancelled by the user or provider
    Denied(String),
}

/// Receiving end of a pending challenge
#[derive(Debug)]
pub struct ChallengeHandle {
    rx: oneshot::Receiver<ChallengeResolution>,
}

/// Sending end of a pending challenge
#[derive(Debug)]
pub struct ChallengeSender {
    tx: oneshot::Sender<ChallengeResolution>,
}

impl ChallengeHandle {
    /// Create a linked sender/handle pair
    #[must_use]
    pub fn pair() -> (ChallengeSender, ChallengeHandle) {
        let (tx, rx) = oneshot::channel();
        (ChallengeSender { tx }, ChallengeHandle { rx })
    }

    /// Wait for the resolution. `None` if the sender was dropped unresolved.
    pub async fn wait(self) -> Option<ChallengeResolution> {
        self.rx.await.ok()
    }
}

impl ChallengeSender {
    /// Report the challenge completed
    pub fn complete(self, artifact: SessionArtifact) {
        let _ = self.tx.send(ChallengeResolution::Completed(artifact));
    }

    /// Report the challenge denied
    pub fn deny(self, reason: impl Into<String>) {
        let _ = self.tx.send(ChallengeResolution::Denied(reason.into()));
    }
}

/// Result of submitting a credential
#[derive(Debug)]
pub enum LoginOutcome {
    /// Accepted with no second factor
    Accepted(SessionArtifact),
    /// A second factor is required
    Challenge(ChallengeHandle),
}

/// Login step failure
#[derive(Debug, Clone, Error)]
pub enum LoginError {
    /// The provider refused the credential
    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered with an error
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The login step exceeded its deadline
    #[error("login timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl LoginError {
    /// Transient failures are worth another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LoginError::Rejected(_))
    }
}

/// External identity provider
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// Submit `credential` for `identity`
    async fn login(
        &self,
        identity: &str,
        credential: &Credential,
    ) -> Result<LoginOutcome, LoginError>;
}
