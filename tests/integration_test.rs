//! End-to-end: shared rate window, cached sessions and the CLI binary

use formwright_core::auth::{
    AuthConfig, AuthManager, AuthSession, FileTokenCache, IdentityProvider, LoginError,
    LoginOutcome, SessionArtifact,
};
use formwright_core::{
    ConcurrencyCoordinator, Credential, FieldReport, Job, JobStatus, Navigator, NavigatorError,
    StaticCredentials,
};
use formwright_llm::{
    BatchedGenerationClient, FallbackReason, FieldDescriptor, MockBackend, PageContext,
    RateWindow, RateWindowConfig, SemanticType,
};
use std::collections::HashMap;
use std::process::Command;
use std::sync::Arc;

struct NoLogin;

#[async_trait::async_trait]
impl IdentityProvider for NoLogin {
    fn name(&self) -> &str {
        "none"
    }

    async fn login(&self, _: &str, _: &Credential) -> Result<LoginOutcome, LoginError> {
        Err(LoginError::Rejected("no interactive login".into()))
    }
}

struct OneForm;

#[async_trait::async_trait]
impl Navigator for OneForm {
    async fn detect_fields(&self, _: &str) -> Result<Vec<FieldDescriptor>, NavigatorError> {
        Ok(vec![
            FieldDescriptor::new("email", SemanticType::Email).required(),
            FieldDescriptor::new("name", SemanticType::Name),
        ])
    }

    async fn page_context(&self, _: &str) -> Result<Option<PageContext>, NavigatorError> {
        Ok(None)
    }

    async fn apply_values(
        &self,
        _: &str,
        session: Option<AuthSession>,
        values: &HashMap<String, String>,
    ) -> Result<FieldReport, NavigatorError> {
        let mut report = FieldReport::default();
        if session.is_none() {
            report.record_failed("email", "login wall");
            return Ok(report);
        }
        for name in values.keys() {
            report.record_applied(name.as_str());
        }
        Ok(report)
    }

    async fn current_session_rejected(&self, _: &str) -> Result<bool, NavigatorError> {
        Ok(false)
    }
}

#[tokio::test]
async fn imported_session_and_shared_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let auth = AuthManager::new(
        Arc::new(NoLogin),
        Arc::new(FileTokenCache::new(dir.path())),
        AuthConfig::default(),
    );
    auth.import_session(
        "qa",
        SessionArtifact::new(serde_json::json!({ "cookies": [{ "name": "sid" }] })),
    )
    .await
    .unwrap();

    let backend = MockBackend::new();
    let window = Arc::new(RateWindow::new(RateWindowConfig {
        calls_per_minute: 2,
        ..RateWindowConfig::default()
    }));
    let generator = Arc::new(BatchedGenerationClient::new(
        Some(Arc::new(backend.clone())),
        window,
    ));
    let coordinator = ConcurrencyCoordinator::new(
        Arc::new(OneForm),
        Arc::clone(&generator),
        auth,
        Arc::new(StaticCredentials::new()),
    );

    let jobs: Vec<Job> = (0..5)
        .map(|i| Job::new(format!("job-{i}"), "https://forms.test/a").with_identity("qa"))
        .collect();
    let results = coordinator.run(jobs, 2).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.status == JobStatus::Succeeded));
    // the ceiling caps backend calls across all workers; the rest fall back
    assert_eq!(backend.call_count(), 2);
    let throttled = results
        .iter()
        .flat_map(|r| &r.scenarios)
        .filter(|s| s.fallback_reason == Some(FallbackReason::RateCeilingReached))
        .count();
    assert_eq!(throttled, 3);
    assert_eq!(generator.stats().fallback_only, 3);
}

#[tokio::test]
async fn job_without_session_reports_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let auth = AuthManager::new(
        Arc::new(NoLogin),
        Arc::new(FileTokenCache::new(dir.path())),
        AuthConfig::default(),
    );
    let coordinator = ConcurrencyCoordinator::new(
        Arc::new(OneForm),
        Arc::new(BatchedGenerationClient::new(None, Arc::new(RateWindow::default()))),
        auth,
        Arc::new(StaticCredentials::new()),
    );

    let results = coordinator
        .run(vec![Job::new("j", "https://forms.test/a").with_identity("ghost")], 1)
        .await;

    assert_eq!(results[0].status, JobStatus::Failed);
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("no cached session or credential"));
}

#[test]
fn cli_generate_falls_back_without_backend() {
    let dir = tempfile::tempdir().unwrap();
    let fields = dir.path().join("fields.json");
    std::fs::write(
        &fields,
        r#"[
            {"name": "email", "type": "email", "required": true},
            {"name": "phone", "semantic_type": "phone"},
            {"name": "resume", "type": "file"}
        ]"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_formwright"))
        .args(["generate", fields.to_str().unwrap(), "--scenario", "invalid"])
        .env("FORMWRIGHT_GENERATION__BACKEND", "none")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["fallback_reason"], "backend_missing");
    assert_eq!(outcome["values"]["email"], "invalid-email-format");
    assert_eq!(outcome["values"]["phone"], "not-a-phone-number");
    assert_eq!(outcome["values"]["resume"], "invalid_file.exe");
}
