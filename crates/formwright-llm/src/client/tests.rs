use super::*;
use crate::backend::{MockBackend, MockReply};
use crate::field::{PageCredential, SemanticType};
use crate::rate_window::RateWindowConfig;

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_initial_delay(Duration::from_millis(10))
        .with_jitter(false)
}

fn client(backend: &MockBackend, window: Arc<RateWindow>) -> BatchedGenerationClient {
    BatchedGenerationClient::new(Some(Arc::new(backend.clone())), window)
        .with_retry(fast_retry())
        .with_synthesizer(ValueSynthesizer::seeded(1))
}

fn form() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("email", SemanticType::Email).required(),
        FieldDescriptor::new("name", SemanticType::Name).required(),
        FieldDescriptor::new("comment", SemanticType::Text),
    ]
}

#[tokio::test]
async fn test_healthy_backend_single_call() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"email":"a@b.co","name":"Ana Lima","comment":"hello"}"#);
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(outcome.values.len(), 3);
    assert_eq!(outcome.values["email"], "a@b.co");
    assert!(outcome.is_fully_generated());
    assert_eq!(outcome.fallback_reason, None);
    assert_eq!(client.rate_window().len(), 1);
}

#[tokio::test]
async fn test_empty_field_list_makes_no_call() {
    let backend = MockBackend::new();
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&[], None, Scenario::Valid).await;

    assert!(outcome.values.is_empty());
    assert_eq!(backend.call_count(), 0);
    assert!(client.rate_window().is_empty());
}

#[tokio::test]
async fn test_partial_response_filled_by_fallback() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"email":"a@b.co","name":"Ana"}"#);
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(outcome.sources["email"], ValueSource::Generated);
    assert_eq!(outcome.sources["comment"], ValueSource::Fallback);
    assert!(!outcome.values["comment"].is_empty());
    assert_eq!(outcome.fallback_reason, None);
}

#[tokio::test(start_paused = true)]
async fn test_missing_required_field_triggers_retry() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"comment":"only optional"}"#);
    backend.push_text(r#"{"email":"a@b.co","name":"Ana","comment":"ok"}"#);
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 2);
    assert!(outcome.is_fully_generated());
    let stats = client.stats();
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.failed_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_short_responses_keep_generated_values() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"comment":"first"}"#);
    for _ in 0..2 {
        backend.push_text(r#"{"email":"ai@b.co","comment":"ai comment"}"#);
    }
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 3);
    assert_eq!(outcome.values["email"], "ai@b.co");
    assert_eq!(outcome.values["comment"], "ai comment");
    assert_eq!(outcome.sources["email"], ValueSource::Generated);
    assert_eq!(outcome.sources["name"], ValueSource::Fallback);
    assert!(!outcome.values["name"].is_empty());
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::GenerationUnavailable)
    );
    assert_eq!(client.stats().fallback_only, 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_attempts_fail_falls_back() {
    let backend = MockBackend::new();
    for _ in 0..3 {
        backend.push(MockReply::Fail(Error::ServerError("503".into())));
    }
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 3);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::GenerationUnavailable)
    );
    assert_eq!(outcome.fallback_count(), 3);
    // Every attempt is recorded, success or not
    assert_eq!(client.rate_window().len(), 3);
    assert_eq!(client.stats().failed_calls, 3);
}

#[tokio::test]
async fn test_not_configured_is_not_retried() {
    let backend = MockBackend::new();
    backend.push(MockReply::Fail(Error::NotConfigured("no key".into())));
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::GenerationUnavailable)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_call_times_out() {
    let backend = MockBackend::new();
    for _ in 0..3 {
        backend.push(MockReply::Stall(Duration::from_secs(120)));
    }
    let client = client(&backend, Arc::new(RateWindow::default()))
        .with_call_timeout(Duration::from_secs(1));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 3);
    assert_eq!(outcome.values.len(), 3);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::GenerationUnavailable)
    );
}

#[tokio::test]
async fn test_ceiling_reached_skips_backend() {
    let window = Arc::new(RateWindow::new(RateWindowConfig {
        calls_per_minute: 2,
        ..RateWindowConfig::default()
    }));
    window.record_now();
    window.record_now();

    let backend = MockBackend::new();
    let client = client(&backend, window);

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::RateCeilingReached)
    );
    assert_eq!(outcome.values.len(), 3);
    assert_eq!(client.stats().fallback_only, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_reached_between_retries() {
    let window = Arc::new(RateWindow::new(RateWindowConfig {
        calls_per_minute: 1,
        ..RateWindowConfig::default()
    }));
    let backend = MockBackend::new();
    backend.push_text("not json");
    let client = client(&backend, window);

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::RateCeilingReached)
    );
}

#[tokio::test]
async fn test_file_fields_never_sent() {
    let backend = MockBackend::new();
    let client = client(&backend, Arc::new(RateWindow::default()));
    let mut fields = form();
    fields.push(FieldDescriptor::new("resume", SemanticType::File).required());

    let outcome = client.generate(&fields, None, Scenario::Valid).await;

    let sent = backend.requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].fields.iter().all(|f| f.name != "resume"));
    assert_eq!(outcome.values["resume"], "test_file.txt");
    assert_eq!(outcome.sources["resume"], ValueSource::Fallback);
}

#[tokio::test]
async fn test_file_only_form_makes_no_call() {
    let backend = MockBackend::new();
    let client = client(&backend, Arc::new(RateWindow::default()));
    let fields = vec![FieldDescriptor::new("upload", SemanticType::File)];

    let outcome = client.generate(&fields, None, Scenario::Valid).await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(outcome.values.len(), 1);
    assert_eq!(outcome.fallback_reason, None);
}

#[tokio::test]
async fn test_without_backend_everything_is_synthesized() {
    let client = BatchedGenerationClient::new(None, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Invalid).await;

    assert_eq!(outcome.fallback_reason, Some(FallbackReason::BackendMissing));
    assert_eq!(outcome.values["email"], "invalid-email-format");
    assert_eq!(client.backend_name(), None);
}

#[tokio::test]
async fn test_page_context_reaches_backend_and_fallback() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"email":"a@b.co","name":"Ana"}"#);
    let client = client(&backend, Arc::new(RateWindow::default()));
    let context = PageContext {
        credentials: vec![PageCredential {
            kind: "password".into(),
            value: "Secret123!".into(),
        }],
        instructions: vec![],
    };
    let mut fields = form();
    fields.push(FieldDescriptor::new("password", SemanticType::Text));

    let outcome = client
        .generate(&fields, Some(&context), Scenario::Valid)
        .await;

    assert_eq!(backend.requests()[0].page_context.as_ref(), Some(&context));
    assert_eq!(outcome.values["password"], "Secret123!");
}

#[tokio::test]
async fn test_unrequested_names_dropped() {
    let backend = MockBackend::new();
    backend.push_text(r#"{"email":"a@b.co","name":"Ana","comment":"c","extra":"x"}"#);
    let client = client(&backend, Arc::new(RateWindow::default()));

    let outcome = client.generate(&form(), None, Scenario::Valid).await;

    assert!(!outcome.values.contains_key("extra"));
    assert_eq!(outcome.values.len(), 3);
}
