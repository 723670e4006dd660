//! Batched generation client
//!
//! The public entry point of this crate. One call to
//! [`BatchedGenerationClient::generate`] makes at most one backend request
//! per attempt for a whole form, and always returns a value for every field:
//! whatever the backend cannot supply, the local synthesizer fills in.

use crate::backend::GenerationBackend;
use crate::error::Error;
use crate::field::{
    FieldDescriptor, GenerationRequest, GenerationResponse, PageContext, Scenario, ValueSource,
};
use crate::metrics::{GenerationMetrics, GenerationStats};
use crate::parse::missing_required;
use crate::rate_window::RateWindow;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::synth::ValueSynthesizer;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default bound on a single backend call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Why some or all values came from local synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The per-minute ceiling was reached; no call was made
    RateCeilingReached,
    /// Every attempt failed or returned an unusable response
    GenerationUnavailable,
    /// No backend is configured
    BackendMissing,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RateCeilingReached => "rate ceiling reached",
            Self::GenerationUnavailable => "generation unavailable",
            Self::BackendMissing => "backend missing",
        })
    }
}

/// Values for one form under one scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationOutcome {
    /// Field name → value, one entry per requested field
    pub values: HashMap<String, String>,
    /// Where each value came from
    pub sources: HashMap<String, ValueSource>,
    /// Set when the backend was skipped or failed
    pub fallback_reason: Option<FallbackReason>,
}

impl GenerationOutcome {
    /// Number of values produced by local synthesis
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.sources
            .values()
            .filter(|s| **s == ValueSource::Fallback)
            .count()
    }

    /// Whether every value came from the backend
    #[must_use]
    pub fn is_fully_generated(&self) -> bool {
        self.fallback_count() == 0
    }

    /// Take the values, dropping provenance
    #[must_use]
    pub fn into_values(self) -> HashMap<String, String> {
        self.values
    }
}

/// Failure of one batch attempt
#[derive(Debug)]
enum AttemptError {
    /// No slot left under the per-minute ceiling
    Ceiling,
    Backend(Error),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ceiling => f.write_str("rate ceiling reached"),
            Self::Backend(e) => e.fmt(f),
        }
    }
}

/// Client that generates all of a form's values in one request.
///
/// Shared across workers as `Arc<BatchedGenerationClient>`; every instance
/// in a process should hold the same [`RateWindow`].
pub struct BatchedGenerationClient {
    backend: Option<Arc<dyn GenerationBackend>>,
    window: Arc<RateWindow>,
    synthesizer: ValueSynthesizer,
    metrics: GenerationMetrics,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl BatchedGenerationClient {
    /// Create a client. With `backend` set to `None` every value is synthesized.
    #[must_use]
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>, window: Arc<RateWindow>) -> Self {
        Self {
            backend,
            window,
            synthesizer: ValueSynthesizer::new(),
            metrics: GenerationMetrics::new(),
            retry: RetryConfig::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the retry policy for failed batches
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Replace the local synthesizer (seeded ones make output reproducible)
    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: ValueSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// The shared rate window
    #[must_use]
    pub fn rate_window(&self) -> &Arc<RateWindow> {
        &self.window
    }

    /// Name of the configured backend, if any
    #[must_use]
    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }

    /// Snapshot of call metrics
    #[must_use]
    pub fn stats(&self) -> GenerationStats {
        self.metrics.snapshot(&self.window)
    }

    /// Generate a value for every field in `fields`.
    ///
    /// Never fails: backend errors, throttling and malformed output all end
    /// in local synthesis, with the cause in
    /// [`GenerationOutcome::fallback_reason`]. When every attempt came back
    /// short of a required field, the largest of those responses is kept
    /// and only its gaps are synthesized.
    pub async fn generate(
        &self,
        fields: &[FieldDescriptor],
        page_context: Option<&PageContext>,
        scenario: Scenario,
    ) -> GenerationOutcome {
        if fields.is_empty() {
            return GenerationOutcome::default();
        }

        let eligible: Vec<FieldDescriptor> = fields
            .iter()
            .filter(|f| f.is_generatable())
            .cloned()
            .collect();

        if eligible.is_empty() {
            debug!(fields = fields.len(), "no generatable fields, synthesizing locally");
            return self.fallback_all(fields, page_context, scenario, None);
        }

        let Some(backend) = self.backend.as_deref() else {
            return self.fallback_all(
                fields,
                page_context,
                scenario,
                Some(FallbackReason::BackendMissing),
            );
        };

        let request = GenerationRequest {
            fields: eligible,
            page_context: page_context.cloned(),
            scenario,
        };

        // Largest response seen that lacked a required field
        let partial = Mutex::new(None);
        let result = retry_with_backoff(
            &self.retry,
            |attempt| self.attempt(backend, &request, attempt, &partial),
            |e| match e {
                AttemptError::Ceiling => false,
                AttemptError::Backend(e) => e.is_retryable(),
            },
        )
        .await;

        match result {
            Ok(generated) => self.merge(fields, page_context, scenario, generated),
            Err(e) => {
                let reason = match e.last_error {
                    AttemptError::Ceiling => {
                        info!(
                            ceiling = self.window.ceiling(),
                            fields = fields.len(),
                            attempts = e.attempts,
                            "generation rate ceiling reached, using local values"
                        );
                        FallbackReason::RateCeilingReached
                    }
                    AttemptError::Backend(ref error) => {
                        warn!(
                            backend = backend.name(),
                            attempts = e.attempts,
                            error = %error,
                            "batch generation failed, using local values"
                        );
                        FallbackReason::GenerationUnavailable
                    }
                };
                let partial = partial.into_inner().unwrap_or_else(|e| e.into_inner());
                match partial {
                    Some(generated) => {
                        debug!(
                            generated = generated.len(),
                            fields = fields.len(),
                            "keeping partial response, synthesizing the rest"
                        );
                        let mut outcome = self.merge(fields, page_context, scenario, generated);
                        outcome.fallback_reason = Some(reason);
                        outcome
                    }
                    None => self.fallback_all(fields, page_context, scenario, Some(reason)),
                }
            }
        }
    }

    async fn attempt(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
        attempt: u32,
        partial: &Mutex<Option<GenerationResponse>>,
    ) -> Result<GenerationResponse, AttemptError> {
        // Never waits for capacity: at the ceiling the caller falls back
        if !self.window.try_record_now() {
            return Err(AttemptError::Ceiling);
        }
        let started = Instant::now();

        let result = match tokio::time::timeout(self.call_timeout, backend.generate_batch(request))
            .await
        {
            Ok(Ok(values)) => {
                let missing = missing_required(&values, request);
                if missing.is_empty() {
                    Ok(values)
                } else {
                    let error = Error::InvalidResponse(format!(
                        "missing required fields: {}",
                        missing.join(", ")
                    ));
                    let mut best = partial.lock().unwrap_or_else(|e| e.into_inner());
                    if best.as_ref().map_or(true, |b| b.len() < values.len()) {
                        *best = Some(values);
                    }
                    Err(error)
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout(self.call_timeout.as_millis() as u64)),
        };

        self.metrics
            .record_call(request.fields.len(), started.elapsed(), result.is_ok());
        debug!(
            backend = backend.name(),
            attempt,
            fields = request.fields.len(),
            ok = result.is_ok(),
            "generation call finished"
        );
        result.map_err(AttemptError::Backend)
    }

    fn merge(
        &self,
        fields: &[FieldDescriptor],
        page_context: Option<&PageContext>,
        scenario: Scenario,
        mut generated: GenerationResponse,
    ) -> GenerationOutcome {
        let mut outcome = GenerationOutcome::default();
        for field in fields {
            let generated_value = field
                .is_generatable()
                .then(|| generated.remove(&field.name))
                .flatten();
            let (value, source) = match generated_value {
                Some(v) => (v, ValueSource::Generated),
                None => (
                    self.synthesizer.synthesize(field, scenario, page_context),
                    ValueSource::Fallback,
                ),
            };
            outcome.values.insert(field.name.clone(), value);
            outcome.sources.insert(field.name.clone(), source);
        }
        outcome
    }

    fn fallback_all(
        &self,
        fields: &[FieldDescriptor],
        page_context: Option<&PageContext>,
        scenario: Scenario,
        reason: Option<FallbackReason>,
    ) -> GenerationOutcome {
        self.metrics.record_fallback_only();
        let mut outcome = self.merge(fields, page_context, scenario, HashMap::new());
        outcome.fallback_reason = reason;
        outcome
    }
}

#[cfg(test)]
mod tests;
