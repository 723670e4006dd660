//! Concurrency coordinator
//!
//! Runs jobs on a bounded pool of workers. Each worker authenticates (if the
//! job names an identity), then for every scenario reads the form, generates
//! values in one batch and hands them to the [`Navigator`].

mod job;
mod navigator;


pub use job::{FieldFailure, FieldReport, Job, JobResult, JobStatus, ScenarioResult};
#[cfg(test)]
pub use navigator::MockNavigator;
pub use navigator::{Navigator, NavigatorError};

use crate::auth::{AuthError, AuthManager, AuthSession};
use crate::credentials::CredentialSource;
use crate::error::{Error, Result};

use chrono::Utc;
use formwright_llm::{BatchedGenerationClient, Scenario, ValueSource};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Jobs running at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
    3
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

/// Bounded worker pool over jobs.
///
/// Cheap to clone; every worker shares the same navigator, generation client
/// (and with it the rate window) and auth manager.
#[derive(Clone)]
pub struct ConcurrencyCoordinator {
    navigator: Arc<dyn Navigator>,
    generator: Arc<BatchedGenerationClient>,
    auth: AuthManager,
    credentials: Arc<dyn CredentialSource>,
}

impl ConcurrencyCoordinator {
    /// Create a coordinator
    pub fn new(
        navigator: Arc<dyn Navigator>,
        generator: Arc<BatchedGenerationClient>,
        auth: AuthManager,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            navigator,
            generator,
            auth,
            credentials,
        }
    }

    /// The shared auth manager
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// The shared generation client
    pub fn generator(&self) -> &Arc<BatchedGenerationClient> {
        &self.generator
    }

    /// Run every job with at most `max_parallel` (minimum 1) in flight.
    ///
    /// Results come back in completion order, one per job. A job that
    /// panics is reported as `Failed`; it never takes the batch down.
    pub async fn run(&self, jobs: Vec<Job>, max_parallel: usize) -> Vec<JobResult> {
        let permits = max_parallel.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut workers = JoinSet::new();
        let total = jobs.len();

        info!(jobs = total, max_parallel = permits, "starting batch");

        for job in jobs {
            let coordinator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let error = Error::Internal("worker pool closed".into());
                        return failed_result(&job, error, Utc::now(), Instant::now());
                    }
                };
                let started_at = Utc::now();
                let clock = Instant::now();
                debug!(job = %job.id, "worker picked up job");

                match AssertUnwindSafe(coordinator.run_job(&job, started_at, clock))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let detail = panic
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic payload".to_string());
                        warn!(job = %job.id, panic = %detail, "job panicked");
                        let error = Error::Internal(format!("job panicked: {detail}"));
                        failed_result(&job, error, started_at, clock)
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // Only reachable if the runtime is shutting down
                Err(e) => warn!(error = %e, "worker task lost"),
            }
        }

        let failed_jobs = results.iter().filter(|r| !r.is_ok()).count();
        info!(jobs = results.len(), failed = failed_jobs, "batch finished");
        results
    }

    async fn run_job(&self, job: &Job, started_at: chrono::DateTime<Utc>, clock: Instant) -> JobResult {
        let mut scenarios = Vec::with_capacity(job.scenarios.len());
        match self.fill_all(job, &mut scenarios).await {
            Ok(()) => {
                let status = scenarios
                    .iter()
                    .fold(JobStatus::Succeeded, |acc, s: &ScenarioResult| acc.worst(s.status));
                info!(job = %job.id, status = ?status, "job finished");
                JobResult {
                    job_id: job.id.clone(),
                    target: job.target.clone(),
                    identity: job.identity.clone(),
                    status,
                    scenarios,
                    error: None,
                    started_at,
                    duration_ms: elapsed_ms(clock),
                }
            }
            Err(e) => {
                warn!(job = %job.id, error = %e, "job failed");
                let mut result = failed_result(job, e, started_at, clock);
                result.scenarios = scenarios;
                result
            }
        }
    }

    async fn fill_all(&self, job: &Job, done: &mut Vec<ScenarioResult>) -> Result<()> {
        let mut session = match &job.identity {
            Some(identity) => Some(self.acquire(identity).await?),
            None => None,
        };

        for &scenario in &job.scenarios {
            let result = self.fill_one(job, scenario, &mut session).await?;
            done.push(result);
        }
        Ok(())
    }

    async fn acquire(&self, identity: &str) -> std::result::Result<AuthSession, AuthError> {
        let credential = self.credentials.credential_for(identity);
        self.auth.acquire(identity, credential.as_ref()).await
    }

    async fn fill_one(
        &self,
        job: &Job,
        scenario: Scenario,
        session: &mut Option<AuthSession>,
    ) -> Result<ScenarioResult> {
        let target = job.target.as_str();
        let fields = self.navigator.detect_fields(target).await?;
        let page_context = self.navigator.page_context(target).await?;

        let outcome = self
            .generator
            .generate(&fields, page_context.as_ref(), scenario)
            .await;
        let generated = outcome
            .sources
            .values()
            .filter(|s| **s == ValueSource::Generated)
            .count();
        let fallback = outcome.fallback_count();
        let fallback_reason = outcome.fallback_reason;
        let values = outcome.into_values();

        let mut reacquired = false;
        let report = loop {
            let report = self
                .navigator
                .apply_values(target, session.clone(), &values)
                .await?;

            let Some(identity) = job.identity.as_deref() else {
                break report;
            };
            if !self.navigator.current_session_rejected(target).await? {
                break report;
            }
            if reacquired {
                return Err(AuthError::ReauthRequired(identity.to_string()).into());
            }

            info!(job = %job.id, identity, "session refused by target, re-acquiring");
            self.auth.report_rejected(identity).await?;
            *session = Some(self.acquire(identity).await?);
            reacquired = true;
        };

        let required: HashSet<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        let status = if report.failed.iter().any(|f| required.contains(f.name.as_str())) {
            JobStatus::Failed
        } else if report.failed.is_empty() {
            JobStatus::Succeeded
        } else {
            JobStatus::Partial
        };

        debug!(
            job = %job.id,
            scenario = %scenario,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "scenario finished"
        );

        Ok(ScenarioResult {
            scenario,
            status,
            fields_total: fields.len(),
            generated,
            fallback,
            fallback_reason,
            applied: report.applied,
            failed: report.failed,
            session_reacquired: reacquired,
        })
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn failed_result(job: &Job, error: Error, started_at: chrono::DateTime<Utc>, clock: Instant) -> JobResult {
    JobResult {
        job_id: job.id.clone(),
        target: job.target.clone(),
        identity: job.identity.clone(),
        status: JobStatus::Failed,
        scenarios: Vec::new(),
        error: Some(error.to_string()),
        started_at,
        duration_ms: elapsed_ms(clock),
    }
}
