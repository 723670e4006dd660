//! Coordinator bounds: worker parallelism and per-identity login exclusivity

use formwright_core::auth::{
    AuthConfig, AuthManager, AuthSession, IdentityProvider, LoginError, LoginOutcome,
    MemoryTokenCache, SessionArtifact,
};
use formwright_core::{
    ConcurrencyCoordinator, Credential, FieldReport, Job, JobStatus, Navigator, NavigatorError,
    StaticCredentials,
};
use formwright_llm::{
    BatchedGenerationClient, FieldDescriptor, MockBackend, PageContext, RateWindow,
    RateWindowConfig, SemanticType,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks how many fills run at once
#[derive(Default)]
struct TrackingNavigator {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl Navigator for TrackingNavigator {
    async fn detect_fields(&self, _target: &str) -> Result<Vec<FieldDescriptor>, NavigatorError> {
        Ok(vec![
            FieldDescriptor::new("email", SemanticType::Email).required(),
            FieldDescriptor::new("phone", SemanticType::Phone),
        ])
    }

    async fn page_context(&self, _target: &str) -> Result<Option<PageContext>, NavigatorError> {
        Ok(None)
    }

    async fn apply_values(
        &self,
        _target: &str,
        _session: Option<AuthSession>,
        values: &HashMap<String, String>,
    ) -> Result<FieldReport, NavigatorError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let mut report = FieldReport::default();
        for name in values.keys() {
            report.record_applied(name.as_str());
        }
        Ok(report)
    }

    async fn current_session_rejected(&self, _target: &str) -> Result<bool, NavigatorError> {
        Ok(false)
    }
}

/// Records overlapping logins per identity
#[derive(Default)]
struct TrackingProvider {
    active: Mutex<HashMap<String, usize>>,
    overlaps: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl IdentityProvider for TrackingProvider {
    fn name(&self) -> &str {
        "tracking"
    }

    async fn login(
        &self,
        identity: &str,
        _credential: &Credential,
    ) -> Result<LoginOutcome, LoginError> {
        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(identity.to_string()).or_insert(0);
            *count += 1;
            if *count > 1 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.calls.lock().unwrap().push(identity.to_string());

        tokio::time::sleep(Duration::from_millis(40)).await;

        if let Some(count) = self.active.lock().unwrap().get_mut(identity) {
            *count -= 1;
        }
        Ok(LoginOutcome::Accepted(SessionArtifact::new(
            serde_json::json!({ "identity": identity }),
        )))
    }
}

const IDENTITIES: [&str; 5] = ["ana", "ben", "cho", "dev", "eli"];

fn coordinator(
    navigator: Arc<TrackingNavigator>,
    provider: Arc<TrackingProvider>,
    backend: &MockBackend,
) -> ConcurrencyCoordinator {
    let credentials = IDENTITIES.iter().fold(StaticCredentials::new(), |acc, id| {
        acc.with(*id, Credential::new(format!("{id}@example.com"), "pw-1234"))
    });
    let window = Arc::new(RateWindow::new(RateWindowConfig {
        calls_per_minute: 100,
        ..RateWindowConfig::default()
    }));
    ConcurrencyCoordinator::new(
        navigator,
        Arc::new(BatchedGenerationClient::new(
            Some(Arc::new(backend.clone())),
            window,
        )),
        AuthManager::new(
            provider,
            Arc::new(MemoryTokenCache::new()),
            AuthConfig::default(),
        ),
        Arc::new(credentials),
    )
}

fn jobs() -> Vec<Job> {
    // two jobs per identity, interleaved
    (0..2)
        .flat_map(|round| {
            IDENTITIES.iter().map(move |id| {
                Job::new(format!("{id}-{round}"), format!("https://forms.test/{id}"))
                    .with_identity(*id)
            })
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_bound_is_respected() {
    let navigator = Arc::new(TrackingNavigator::default());
    let provider = Arc::new(TrackingProvider::default());
    let backend = MockBackend::new();
    let coordinator = coordinator(navigator.clone(), provider, &backend);

    let results = coordinator.run(jobs(), 3).await;

    assert_eq!(results.len(), 10);
    assert!(navigator.peak.load(Ordering::SeqCst) <= 3);
    assert!(results.iter().all(|r| r.status == JobStatus::Succeeded));

    let ids: HashSet<&str> = results.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(backend.call_count(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_login_per_identity() {
    let navigator = Arc::new(TrackingNavigator::default());
    let provider = Arc::new(TrackingProvider::default());
    let backend = MockBackend::new();
    let coordinator = coordinator(navigator, provider.clone(), &backend);

    let results = coordinator.run(jobs(), 10).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(provider.overlaps.load(Ordering::SeqCst), 0);

    let mut logged_in = provider.calls.lock().unwrap().clone();
    logged_in.sort();
    assert_eq!(logged_in, IDENTITIES.to_vec());
    assert_eq!(coordinator.auth().login_attempts(), 5);
}

#[tokio::test]
async fn serial_run_never_overlaps() {
    let navigator = Arc::new(TrackingNavigator::default());
    let provider = Arc::new(TrackingProvider::default());
    let backend = MockBackend::new();
    let coordinator = coordinator(navigator.clone(), provider, &backend);

    let results = coordinator.run(jobs(), 1).await;

    assert_eq!(results.len(), 10);
    assert_eq!(navigator.peak.load(Ordering::SeqCst), 1);
}
