//! Jobs and their results

use chrono::{DateTime, Utc};
use formwright_llm::{FallbackReason, Scenario};
use serde::{Deserialize, Serialize};

fn default_scenarios() -> Vec<Scenario> {
    vec![Scenario::Valid]
}

/// One form to fill, under one or more scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Caller-chosen id, echoed in the result
    pub id: String,
    /// Form URL or manifest key
    pub target: String,
    /// Identity to authenticate as, when the target is protected
    #[serde(default)]
    pub identity: Option<String>,
    /// Scenarios to run, in order
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

impl Job {
    /// A job running the `Valid` scenario only
    #[must_use]
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            identity: None,
            scenarios: default_scenarios(),
        }
    }

    /// Authenticate as `identity` before filling
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Replace the scenario list
    #[must_use]
    pub fn with_scenarios(mut self, scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        self.scenarios = scenarios.into_iter().collect();
        self
    }
}

/// A field the navigator could not fill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    /// Field name
    pub name: String,
    /// Why it was not applied
    pub reason: String,
}

/// What the navigator did with a set of values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    /// Fields filled
    pub applied: Vec<String>,
    /// Fields that could not be filled
    pub failed: Vec<FieldFailure>,
}

impl FieldReport {
    /// Record a filled field
    pub fn record_applied(&mut self, name: impl Into<String>) {
        self.applied.push(name.into());
    }

    /// Record a field that could not be filled
    pub fn record_failed(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FieldFailure {
            name: name.into(),
            reason: reason.into(),
        });
    }
}

/// Final state of a job or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every field applied
    Succeeded,
    /// Every required field applied, some optional ones failed
    Partial,
    /// Auth or navigator failure, or a required field not applied
    Failed,
}

impl JobStatus {
    /// The worse of two statuses
    #[must_use]
    pub fn worst(self, other: JobStatus) -> JobStatus {
        use JobStatus::*;
        match (self, other) {
            (Failed, _) | (_, Failed) => Failed,
            (Partial, _) | (_, Partial) => Partial,
            _ => Succeeded,
        }
    }
}

/// Outcome of one scenario against one form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    /// Scenario run
    pub scenario: Scenario,
    /// Derived from the field report
    pub status: JobStatus,
    /// Fields detected on the form
    pub fields_total: usize,
    /// Values produced by the backend
    pub generated: usize,
    /// Values produced locally
    pub fallback: usize,
    /// Why local values were used, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    /// Fields filled
    pub applied: Vec<String>,
    /// Fields that could not be filled
    pub failed: Vec<FieldFailure>,
    /// The session was refused and re-acquired during this scenario
    pub session_reacquired: bool,
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    /// Job id
    pub job_id: String,
    /// Job target
    pub target: String,
    /// Identity used, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Overall status
    pub status: JobStatus,
    /// Scenarios completed, in order
    pub scenarios: Vec<ScenarioResult>,
    /// Why the job failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the worker picked the job up
    pub started_at: DateTime<Utc>,
    /// Wall time spent on the job
    pub duration_ms: u64,
}

impl JobResult {
    /// Whether the job ended `Succeeded` or `Partial`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != JobStatus::Failed
    }
}
