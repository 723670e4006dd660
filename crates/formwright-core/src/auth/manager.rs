//! Auth manager: drives the lifecycle and enforces single-flight logins

use super::cache::{CachedSession, TokenCache};
use super::provider::{ChallengeResolution, IdentityProvider, LoginError, LoginOutcome};
use super::session::{AuthSession, SessionArtifact};
use super::state::{AuthEvent, AuthState};
use super::AuthError;
use crate::credentials::Credential;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use formwright_llm::retry::{retry_with_backoff, RetryConfig};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Auth timing policy
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    /// Bound on one login step
    pub login_timeout: Duration,
    /// Bound on the second-factor wait (never retried)
    pub two_fa_timeout: Duration,
    /// Login step attempts, including the first
    pub retry_attempts: u32,
    /// Delay before the first login retry
    pub retry_delay: Duration,
    /// Lifetime of a session from creation
    pub session_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(60),
            two_fa_timeout: Duration::from_secs(300),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            session_ttl: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl AuthConfig {
    /// Set the login step bound
    #[must_use]
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the second-factor bound
    #[must_use]
    pub fn with_two_fa_timeout(mut self, timeout: Duration) -> Self {
        self.two_fa_timeout = timeout;
        self
    }

    /// Set the login step attempts
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the first retry delay
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the session lifetime
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn login_retry(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.retry_attempts.saturating_sub(1))
            .with_initial_delay(self.retry_delay)
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.session_ttl).unwrap_or_else(|_| chrono::Duration::days(30))
    }
}

/// Cache-derived status for one identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStatus {
    /// Identity asked about
    pub identity: String,
    /// `Authenticated`, `Expired` or `Unauthenticated`
    pub state: AuthState,
    /// Cached expiry, if any
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole days until expiry (negative once expired)
    pub days_remaining: Option<i64>,
}

impl AuthStatus {
    /// Whether the cached session is still within its lifetime
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }
}

type SharedAttempt = Shared<BoxFuture<'static, Result<AuthSession, AuthError>>>;

struct InFlight {
    id: u64,
    attempt: SharedAttempt,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn TokenCache>,
    config: AuthConfig,
    sessions: DashMap<String, AuthSession>,
    in_flight: DashMap<String, InFlight>,
    next_attempt_id: AtomicU64,
    login_attempts: AtomicU64,
}

/// Owner of every identity's session.
///
/// Cheap to clone; clones share state. For any identity at most one login
/// attempt runs at a time: concurrent callers join the running attempt and
/// all observe its result. Attempts run on their own task, so a caller
/// giving up does not cancel the login for the others.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

impl AuthManager {
    /// Create a manager
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<dyn TokenCache>,
        config: AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                cache,
                config,
                sessions: DashMap::new(),
                in_flight: DashMap::new(),
                next_attempt_id: AtomicU64::new(1),
                login_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// The timing policy
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// Login attempts started since creation
    #[must_use]
    pub fn login_attempts(&self) -> u64 {
        self.inner.login_attempts.load(Ordering::SeqCst)
    }

    /// Snapshot of the live session for `identity`
    #[must_use]
    pub fn session(&self, identity: &str) -> Option<AuthSession> {
        self.inner.sessions.get(identity).map(|s| s.clone())
    }

    /// Start a fresh login for `identity`, or join the one already running.
    pub async fn authenticate(
        &self,
        identity: &str,
        credential: &Credential,
    ) -> Result<AuthSession, AuthError> {
        self.join_or_start(identity, credential.clone(), true).await
    }

    /// Get a usable session for `identity`, logging in only when needed.
    ///
    /// Order: running attempt, live session, cache, then login with
    /// `credential`. An expired session with no credential yields
    /// [`AuthError::ReauthRequired`]; nothing at all yields
    /// [`AuthError::CredentialRequired`].
    pub async fn acquire(
        &self,
        identity: &str,
        credential: Option<&Credential>,
    ) -> Result<AuthSession, AuthError> {
        if let Some(attempt) = self.running(identity) {
            debug!(identity, "joining login in progress");
            return attempt.await;
        }

        let now = Utc::now();
        let mut expired = false;

        if let Some(live) = self.session(identity) {
            if live.is_usable_at(now) {
                return Ok(live);
            }
            expired = live.state == AuthState::Expired;
            if live.state == AuthState::Authenticated {
                self.expire(identity);
                expired = true;
            }
        }

        match self.inner.cache.get(identity).await {
            Ok(Some(entry)) if entry.is_valid_at(now) => {
                let session = AuthSession::restored(
                    identity,
                    entry.artifact,
                    entry.created_at,
                    entry.expires_at,
                );
                debug!(identity, expires_at = %entry.expires_at, "restored cached session");
                self.publish(&session);
                return Ok(session);
            }
            Ok(Some(entry)) => {
                info!(identity, expired_at = %entry.expires_at, "cached session expired");
                let mut session = AuthSession::restored(
                    identity,
                    entry.artifact,
                    entry.created_at,
                    entry.expires_at,
                );
                session.apply(AuthEvent::Expire)?;
                self.publish(&session);
                if let Err(e) = self.inner.cache.clear(identity).await {
                    warn!(identity, error = %e, "failed to drop expired cache entry");
                }
                expired = true;
            }
            Ok(None) => {}
            Err(e) => warn!(identity, error = %e, "token cache unreadable, treating as miss"),
        }

        match credential {
            Some(credential) => self.join_or_start(identity, credential.clone(), false).await,
            None if expired => Err(AuthError::ReauthRequired(identity.to_string())),
            None => Err(AuthError::CredentialRequired(identity.to_string())),
        }
    }

    /// A downstream operation found the session refused: expire it and drop
    /// the cache entry so the next [`acquire`](Self::acquire) logs in again.
    pub async fn report_rejected(&self, identity: &str) -> Result<(), AuthError> {
        info!(identity, "session rejected by target");
        self.expire(identity);
        self.inner.cache.clear(identity).await
    }

    /// Status reconstructed from the cache alone, with no network access
    pub async fn get_auth_status(&self, identity: &str) -> Result<AuthStatus, AuthError> {
        let now = Utc::now();
        let status = match self.inner.cache.get(identity).await? {
            Some(entry) => AuthStatus {
                identity: identity.to_string(),
                state: if entry.is_valid_at(now) {
                    AuthState::Authenticated
                } else {
                    AuthState::Expired
                },
                expires_at: Some(entry.expires_at),
                days_remaining: Some((entry.expires_at - now).num_days()),
            },
            None => AuthStatus {
                identity: identity.to_string(),
                state: AuthState::Unauthenticated,
                expires_at: None,
                days_remaining: None,
            },
        };
        Ok(status)
    }

    /// Store an artifact obtained outside the manager (e.g. an exported
    /// browser state) as a fresh session.
    pub async fn import_session(
        &self,
        identity: &str,
        artifact: SessionArtifact,
    ) -> Result<AuthSession, AuthError> {
        let now = Utc::now();
        let session = AuthSession::restored(identity, artifact, now, now + self.inner.config.ttl());
        self.persist(&session).await?;
        self.publish(&session);
        Ok(session)
    }

    /// Forget `identity`'s session, live and cached
    pub async fn clear(&self, identity: &str) -> Result<(), AuthError> {
        self.inner.sessions.remove(identity);
        self.inner.cache.clear(identity).await
    }

    /// Forget every session
    pub async fn clear_all(&self) -> Result<(), AuthError> {
        self.inner.sessions.clear();
        self.inner.cache.clear_all().await
    }

    fn running(&self, identity: &str) -> Option<SharedAttempt> {
        self.inner
            .in_flight
            .get(identity)
            .map(|f| f.attempt.clone())
    }

    fn expire(&self, identity: &str) {
        if let Some(mut session) = self.inner.sessions.get_mut(identity) {
            if session.state == AuthState::Authenticated {
                // Authenticated always accepts Expire
                let _ = session.apply(AuthEvent::Expire);
            }
        }
    }

    fn publish(&self, session: &AuthSession) {
        self.inner
            .sessions
            .insert(session.identity.clone(), session.clone());
    }

    async fn persist(&self, session: &AuthSession) -> Result<(), AuthError> {
        persist(&self.inner, session).await
    }

    /// Join the running attempt for `identity` or spawn a new one.
    ///
    /// With `force` unset, a usable live session short-circuits the login.
    fn join_or_start(&self, identity: &str, credential: Credential, force: bool) -> SharedAttempt {
        match self.inner.in_flight.entry(identity.to_string()) {
            Entry::Occupied(running) => {
                debug!(identity, "joining login in progress");
                running.get().attempt.clone()
            }
            Entry::Vacant(slot) => {
                let prior = self.inner.sessions.get(identity).map(|s| s.clone());
                if let Some(live) = prior.as_ref().filter(|s| !force && s.is_usable_at(Utc::now())) {
                    let live = live.clone();
                    return futures::future::ready(Ok(live)).boxed().shared();
                }

                let id = self.inner.next_attempt_id.fetch_add(1, Ordering::Relaxed);
                let inner = Arc::clone(&self.inner);
                let key = identity.to_string();
                let handle = tokio::spawn(async move {
                    let result = run_attempt(&inner, &key, credential, prior).await;
                    inner.in_flight.remove_if(&key, |_, f| f.id == id);
                    result
                });

                let failed_identity = identity.to_string();
                let attempt = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(AuthError::LoginFailed {
                            identity: failed_identity,
                            reason: format!("login task aborted: {e}"),
                        })
                    })
                }
                .boxed()
                .shared();

                slot.insert(InFlight {
                    id,
                    attempt: attempt.clone(),
                });
                attempt
            }
        }
    }
}

async fn persist(inner: &Inner, session: &AuthSession) -> Result<(), AuthError> {
    let (Some(artifact), Some(created_at), Some(expires_at)) = (
        session.cached_artifact.clone(),
        session.created_at,
        session.expires_at,
    ) else {
        return Ok(());
    };
    inner
        .cache
        .put(CachedSession {
            identity: session.identity.clone(),
            artifact,
            created_at,
            expires_at,
        })
        .await
}

/// One complete login attempt, from `Begin` to a terminal state.
async fn run_attempt(
    inner: &Inner,
    identity: &str,
    credential: Credential,
    prior: Option<AuthSession>,
) -> Result<AuthSession, AuthError> {
    inner.login_attempts.fetch_add(1, Ordering::SeqCst);

    let mut session = match prior {
        Some(mut expired) if expired.state == AuthState::Expired => {
            expired.history = vec![AuthState::Expired];
            expired.last_error = None;
            expired
        }
        _ => AuthSession::new(identity),
    };

    let finish_failed = |mut session: AuthSession, error: AuthError| {
        warn!(identity, error = %error, "authentication failed");
        session.fail(error.clone());
        inner.sessions.insert(identity.to_string(), session);
        Err(error)
    };

    if let Err(reason) = credential.validate() {
        let error = AuthError::LoginFailed {
            identity: identity.to_string(),
            reason: format!("malformed credential: {reason}"),
        };
        return finish_failed(session, error);
    }

    session.apply(AuthEvent::Begin)?;
    inner.sessions.insert(identity.to_string(), session.clone());
    info!(identity, provider = inner.provider.name(), "logging in");

    let config = &inner.config;
    let login_timeout = config.login_timeout;
    let provider = inner.provider.as_ref();
    let credential = &credential;

    let outcome = retry_with_backoff(
        &config.login_retry(),
        |_| async move {
            tokio::time::timeout(login_timeout, provider.login(identity, credential))
                .await
                .unwrap_or(Err(LoginError::TimedOut(login_timeout)))
        },
        LoginError::is_retryable,
    )
    .await;

    let artifact = match outcome {
        Err(e) => {
            let error = AuthError::LoginFailed {
                identity: identity.to_string(),
                reason: format!("{} after {} attempt(s)", e.last_error, e.attempts),
            };
            return finish_failed(session, error);
        }
        Ok(LoginOutcome::Accepted(artifact)) => {
            session.apply(AuthEvent::Accepted)?;
            artifact
        }
        Ok(LoginOutcome::Challenge(handle)) => {
            session.apply(AuthEvent::ChallengeIssued)?;
            inner.sessions.insert(identity.to_string(), session.clone());
            info!(
                identity,
                timeout_secs = config.two_fa_timeout.as_secs(),
                "waiting for second-factor completion"
            );

            match tokio::time::timeout(config.two_fa_timeout, handle.wait()).await {
                Ok(Some(ChallengeResolution::Completed(artifact))) => {
                    session.apply(AuthEvent::ChallengeCompleted)?;
                    artifact
                }
                Ok(Some(ChallengeResolution::Denied(reason))) => {
                    let error = AuthError::LoginFailed {
                        identity: identity.to_string(),
                        reason: format!("challenge denied: {reason}"),
                    };
                    return finish_failed(session, error);
                }
                Ok(None) => {
                    let error = AuthError::LoginFailed {
                        identity: identity.to_string(),
                        reason: "challenge abandoned".to_string(),
                    };
                    return finish_failed(session, error);
                }
                Err(_) => {
                    session.apply(AuthEvent::ChallengeTimedOut)?;
                    let error = AuthError::ChallengeTimeout {
                        identity: identity.to_string(),
                        timeout_secs: config.two_fa_timeout.as_secs(),
                    };
                    warn!(identity, error = %error, "authentication failed");
                    session.last_error = Some(error.clone());
                    inner.sessions.insert(identity.to_string(), session);
                    return Err(error);
                }
            }
        }
    };

    session.store_artifact(artifact, Utc::now(), config.ttl());
    if let Err(e) = persist(inner, &session).await {
        warn!(identity, error = %e, "session not cached; it will not survive a restart");
    }
    inner.sessions.insert(identity.to_string(), session.clone());
    info!(identity, expires_at = ?session.expires_at, "authenticated");
    Ok(session)
}
