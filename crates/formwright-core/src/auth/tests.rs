use super::*;
use crate::credentials::Credential;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Step {
    Accept,
    Reject,
    Unavailable,
    Stall(Duration),
    ChallengeCompletesAfter(Duration),
    ChallengeDenied,
    ChallengeNeverCompletes,
}

#[derive(Default)]
struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    parked: Mutex<Vec<ChallengeSender>>,
}

impl ScriptedProvider {
    fn with_steps(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn artifact(identity: &str) -> SessionArtifact {
    SessionArtifact::new(serde_json::json!({"cookies": [{"name": "sid", "value": identity}]}))
}

#[async_trait::async_trait]
impl IdentityProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn login(
        &self,
        identity: &str,
        _credential: &Credential,
    ) -> Result<LoginOutcome, LoginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Accept);
        match step {
            Step::Accept => Ok(LoginOutcome::Accepted(artifact(identity))),
            Step::Reject => Err(LoginError::Rejected("bad password".into())),
            Step::Unavailable => Err(LoginError::Unavailable("502 from idp".into())),
            Step::Stall(d) => {
                tokio::time::sleep(d).await;
                Ok(LoginOutcome::Accepted(artifact(identity)))
            }
            Step::ChallengeCompletesAfter(d) => {
                let (tx, handle) = ChallengeHandle::pair();
                let done = artifact(identity);
                tokio::spawn(async move {
                    tokio::time::sleep(d).await;
                    tx.complete(done);
                });
                Ok(LoginOutcome::Challenge(handle))
            }
            Step::ChallengeDenied => {
                let (tx, handle) = ChallengeHandle::pair();
                tx.deny("user pressed deny");
                Ok(LoginOutcome::Challenge(handle))
            }
            Step::ChallengeNeverCompletes => {
                let (tx, handle) = ChallengeHandle::pair();
                self.parked.lock().unwrap().push(tx);
                Ok(LoginOutcome::Challenge(handle))
            }
        }
    }
}

fn manager(provider: Arc<ScriptedProvider>) -> (AuthManager, Arc<MemoryTokenCache>) {
    let cache = Arc::new(MemoryTokenCache::new());
    let config = AuthConfig::default()
        .with_login_timeout(Duration::from_secs(10))
        .with_two_fa_timeout(Duration::from_secs(60))
        .with_retry_delay(Duration::from_millis(100));
    (AuthManager::new(provider, cache.clone(), config), cache)
}

fn good() -> Credential {
    Credential::new("qa@example.com", "hunter2!")
}

// ---------------------------------------------------------------------------
// State machine

#[test]
fn test_happy_transitions() {
    use AuthEvent as E;
    use AuthState as S;

    assert_eq!(S::Unauthenticated.on(E::Begin).unwrap(), S::LoggingIn);
    assert_eq!(S::LoggingIn.on(E::Accepted).unwrap(), S::Authenticated);
    assert_eq!(S::LoggingIn.on(E::ChallengeIssued).unwrap(), S::AwaitingChallenge);
    assert_eq!(
        S::AwaitingChallenge.on(E::ChallengeCompleted).unwrap(),
        S::Authenticated
    );
    assert_eq!(S::AwaitingChallenge.on(E::ChallengeTimedOut).unwrap(), S::Failed);
    assert_eq!(S::Authenticated.on(E::Expire).unwrap(), S::Expired);
    assert_eq!(S::Expired.on(E::Begin).unwrap(), S::LoggingIn);
    assert_eq!(S::Failed.on(E::Restart).unwrap(), S::Unauthenticated);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    use AuthEvent as E;
    use AuthState as S;

    let err = S::Authenticated.on(E::Begin).unwrap_err();
    assert_eq!(err.from, S::Authenticated);
    assert_eq!(err.event, E::Begin);

    assert!(S::Unauthenticated.on(E::Accepted).is_err());
    assert!(S::Failed.on(E::Begin).is_err());
    assert!(S::LoggingIn.on(E::Restart).is_err());
    assert!(S::AwaitingChallenge.on(E::Restart).is_err());
    assert!(S::Expired.on(E::Expire).is_err());
}

#[test]
fn test_in_flight_states() {
    assert!(AuthState::LoggingIn.is_in_flight());
    assert!(AuthState::AwaitingChallenge.is_in_flight());
    assert!(!AuthState::Authenticated.is_in_flight());
    assert_eq!(AuthState::AwaitingChallenge.to_string(), "awaiting_challenge");
}

#[test]
fn test_session_fail_from_any_state() {
    let mut session = AuthSession::restored("a", artifact("a"), Utc::now(), Utc::now());
    session.fail(AuthError::ReauthRequired("a".into()));
    assert_eq!(session.state, AuthState::Failed);
    assert!(session.last_error.is_some());
}

// ---------------------------------------------------------------------------
// Manager

#[tokio::test]
async fn test_accepted_login() {
    let provider = ScriptedProvider::with_steps([Step::Accept]);
    let (auth, cache) = manager(provider.clone());

    let session = auth.authenticate("qa", &good()).await.unwrap();

    assert_eq!(session.state, AuthState::Authenticated);
    assert_eq!(
        session.history,
        vec![
            AuthState::Unauthenticated,
            AuthState::LoggingIn,
            AuthState::Authenticated
        ]
    );
    assert!(session.cached_artifact.is_some());
    assert!(session.expires_at.unwrap() > Utc::now());
    assert_eq!(provider.calls(), 1);
    assert!(cache.get("qa").await.unwrap().is_some());
    assert_eq!(auth.login_attempts(), 1);
}

#[tokio::test]
async fn test_malformed_credential_fails_without_contacting_provider() {
    let provider = ScriptedProvider::with_steps([]);
    let (auth, _) = manager(provider.clone());

    let err = auth
        .authenticate("qa", &Credential::new("not an email@", "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::LoginFailed { .. }));
    assert_eq!(provider.calls(), 0);
    assert_eq!(auth.session("qa").unwrap().state, AuthState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_challenge_completed() {
    let provider =
        ScriptedProvider::with_steps([Step::ChallengeCompletesAfter(Duration::from_secs(20))]);
    let (auth, _) = manager(provider);

    let session = auth.authenticate("qa", &good()).await.unwrap();

    assert_eq!(session.state, AuthState::Authenticated);
    assert!(session.history.contains(&AuthState::AwaitingChallenge));
}

#[tokio::test(start_paused = true)]
async fn test_challenge_timeout_fails() {
    let provider = ScriptedProvider::with_steps([Step::ChallengeNeverCompletes]);
    let (auth, cache) = manager(provider.clone());

    let err = auth.authenticate("qa", &good()).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::ChallengeTimeout { timeout_secs: 60, .. }
    ));
    assert!(err.needs_user());
    let session = auth.session("qa").unwrap();
    assert_eq!(session.state, AuthState::Failed);
    assert_eq!(
        session.history,
        vec![
            AuthState::Unauthenticated,
            AuthState::LoggingIn,
            AuthState::AwaitingChallenge,
            AuthState::Failed
        ]
    );
    // second factor is never retried
    assert_eq!(provider.calls(), 1);
    assert!(cache.get("qa").await.unwrap().is_none());
}

#[tokio::test]
async fn test_challenge_denied() {
    let provider = ScriptedProvider::with_steps([Step::ChallengeDenied]);
    let (auth, _) = manager(provider);

    let err = auth.authenticate("qa", &good()).await.unwrap_err();
    assert!(matches!(err, AuthError::LoginFailed { ref reason, .. } if reason.contains("denied")));
}

#[tokio::test(start_paused = true)]
async fn test_transient_login_failure_is_retried() {
    let provider = ScriptedProvider::with_steps([Step::Unavailable, Step::Unavailable, Step::Accept]);
    let (auth, _) = manager(provider.clone());

    let session = auth.authenticate("qa", &good()).await.unwrap();

    assert_eq!(session.state, AuthState::Authenticated);
    assert_eq!(provider.calls(), 3);
    assert_eq!(auth.login_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_gives_up_after_configured_attempts() {
    let provider = ScriptedProvider::with_steps([
        Step::Unavailable,
        Step::Unavailable,
        Step::Unavailable,
        Step::Accept,
    ]);
    let (auth, _) = manager(provider.clone());

    let err = auth.authenticate("qa", &good()).await.unwrap_err();

    assert!(matches!(err, AuthError::LoginFailed { ref reason, .. } if reason.contains("3 attempt")));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_rejected_credential_is_not_retried() {
    let provider = ScriptedProvider::with_steps([Step::Reject, Step::Accept]);
    let (auth, _) = manager(provider.clone());

    assert!(auth.authenticate("qa", &good()).await.is_err());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_login_times_out_and_retries() {
    let provider = ScriptedProvider::with_steps([Step::Stall(Duration::from_secs(3600))]);
    let (auth, _) = manager(provider.clone());

    let session = auth.authenticate("qa", &good()).await.unwrap();

    assert_eq!(session.state, AuthState::Authenticated);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_report_rejected_expires_and_clears_cache() {
    let provider = ScriptedProvider::with_steps([]);
    let (auth, cache) = manager(provider);
    auth.authenticate("qa", &good()).await.unwrap();

    auth.report_rejected("qa").await.unwrap();

    assert_eq!(auth.session("qa").unwrap().state, AuthState::Expired);
    assert!(cache.get("qa").await.unwrap().is_none());

    let err = auth.acquire("qa", None).await.unwrap_err();
    assert!(matches!(err, AuthError::ReauthRequired(_)));
}

#[tokio::test]
async fn test_acquire_prefers_live_then_cache() {
    let provider = ScriptedProvider::with_steps([]);
    let (auth, cache) = manager(provider.clone());

    let now = Utc::now();
    cache
        .put(CachedSession {
            identity: "qa".into(),
            artifact: artifact("qa"),
            created_at: now,
            expires_at: now + chrono::Duration::days(3),
        })
        .await
        .unwrap();

    let restored = auth.acquire("qa", Some(&good())).await.unwrap();
    assert_eq!(restored.state, AuthState::Authenticated);
    assert_eq!(provider.calls(), 0);

    let live = auth.acquire("qa", None).await.unwrap();
    assert_eq!(live.expires_at, restored.expires_at);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_acquire_without_anything_needs_credential() {
    let (auth, _) = manager(ScriptedProvider::with_steps([]));
    let err = auth.acquire("nobody", None).await.unwrap_err();
    assert!(matches!(err, AuthError::CredentialRequired(ref id) if id == "nobody"));
    assert!(err.needs_user());
}

#[tokio::test]
async fn test_auth_status_from_cache() {
    let (auth, _) = manager(ScriptedProvider::with_steps([]));

    let status = auth.get_auth_status("qa").await.unwrap();
    assert_eq!(status.state, AuthState::Unauthenticated);
    assert!(status.expires_at.is_none());

    auth.authenticate("qa", &good()).await.unwrap();
    let status = auth.get_auth_status("qa").await.unwrap();
    assert!(status.is_authenticated());
    assert!(matches!(status.days_remaining, Some(29 | 30)));
}

#[tokio::test]
async fn test_import_and_clear() {
    let (auth, cache) = manager(ScriptedProvider::with_steps([]));

    let session = auth.import_session("qa", artifact("qa")).await.unwrap();
    assert_eq!(session.state, AuthState::Authenticated);
    assert!(cache.get("qa").await.unwrap().is_some());

    auth.clear("qa").await.unwrap();
    assert!(auth.session("qa").is_none());
    assert!(cache.get("qa").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Protected domains

#[test]
fn test_is_auth_required() {
    let domains = vec!["office.com".to_string(), ".corp.example".to_string()];

    assert!(is_auth_required("https://office.com/", &domains));
    assert!(is_auth_required("https://login.OFFICE.com:8443/x?y", &domains));
    assert!(is_auth_required("http://intra.corp.example", &domains));
    assert!(is_auth_required("portal.office.com/path", &domains));

    assert!(!is_auth_required("https://myoffice.com/", &domains));
    assert!(!is_auth_required("https://office.com.evil.io/", &domains));
    assert!(!is_auth_required("", &domains));
    assert!(!is_auth_required("https://office.com/", &[]));
}
