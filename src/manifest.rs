//! Manifest-driven navigator
//!
//! A manifest lists forms that were already extracted from their pages plus
//! the jobs to run against them. Filling a form means checking each value
//! the way the browser's own input validation would.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use formwright_core::auth::{is_auth_required, AuthSession};
use formwright_core::{FieldReport, Job, Navigator, NavigatorError};
use formwright_llm::{FieldDescriptor, PageContext, Scenario, SemanticType};
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use tracing::debug;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]{1,64}@[^@\s]+\.[^@\s]{2,}$").ok());
static PHONE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{6,19}$").ok());

/// One field as extracted from the page
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestField {
    pub name: String,
    /// HTML input type (`email`, `tel`, `text`, ...)
    #[serde(rename = "type", default = "default_input_type")]
    pub input_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Overrides inference from `type` and `label`
    #[serde(default)]
    pub semantic_type: Option<SemanticType>,
}

fn default_input_type() -> String {
    "text".to_string()
}

impl ManifestField {
    pub fn descriptor(&self) -> FieldDescriptor {
        let semantic_type = self
            .semantic_type
            .unwrap_or_else(|| SemanticType::infer(&self.input_type, &format!("{} {}", self.name, self.label)));
        let field = FieldDescriptor::new(self.name.clone(), semantic_type).with_hint(self.label.clone());
        if self.required {
            field.required()
        } else {
            field
        }
    }
}

/// One extracted form
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestForm {
    pub target: String,
    pub fields: Vec<ManifestField>,
    #[serde(default)]
    pub page_context: Option<PageContext>,
}

/// Forms plus the jobs to run against them
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub forms: Vec<ManifestForm>,
    /// Omitted: one job per form
    #[serde(default)]
    pub jobs: Vec<Job>,
    /// Used for jobs on protected targets that name no identity
    #[serde(default)]
    pub default_identity: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Jobs to run: the listed ones, or one per form under `scenarios`.
    ///
    /// Jobs on a protected target with no identity get `default_identity`.
    pub fn jobs(&self, scenarios: &[Scenario], protected_domains: &[String]) -> Vec<Job> {
        let mut jobs = if self.jobs.is_empty() {
            self.forms
                .iter()
                .enumerate()
                .map(|(i, form)| {
                    Job::new(format!("form-{}", i + 1), form.target.clone())
                        .with_scenarios(scenarios.iter().copied())
                })
                .collect()
        } else {
            self.jobs.clone()
        };

        if let Some(identity) = &self.default_identity {
            for job in jobs
                .iter_mut()
                .filter(|j| j.identity.is_none() && is_auth_required(&j.target, protected_domains))
            {
                job.identity = Some(identity.clone());
            }
        }
        jobs
    }
}

/// Navigator over manifest forms
pub struct ManifestNavigator {
    forms: HashMap<String, ManifestForm>,
    rejected: Mutex<HashSet<String>>,
}

impl ManifestNavigator {
    pub fn new(forms: impl IntoIterator<Item = ManifestForm>) -> Self {
        Self {
            forms: forms.into_iter().map(|f| (f.target.clone(), f)).collect(),
            rejected: Mutex::new(HashSet::new()),
        }
    }

    fn form(&self, target: &str) -> Result<&ManifestForm, NavigatorError> {
        self.forms
            .get(target)
            .ok_or_else(|| NavigatorError::NoForm(target.to_string()))
    }
}

/// Why `value` would be refused by an input of type `kind`, if it would
fn check_value(kind: SemanticType, value: &str) -> Option<&'static str> {
    let matches = |re: &LazyLock<Option<Regex>>| re.as_ref().is_some_and(|re| re.is_match(value));
    match kind {
        SemanticType::Email if !matches(&EMAIL_RE) => Some("not a valid email address"),
        SemanticType::Phone if !matches(&PHONE_RE) => Some("not a valid phone number"),
        SemanticType::Date if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() => {
            Some("not a valid date")
        }
        SemanticType::Number if value.parse::<f64>().is_err() => Some("not a number"),
        SemanticType::Boolean if !matches!(value, "true" | "false") => Some("not a checkbox state"),
        _ => None,
    }
}

#[async_trait]
impl Navigator for ManifestNavigator {
    async fn detect_fields(&self, target: &str) -> Result<Vec<FieldDescriptor>, NavigatorError> {
        Ok(self
            .form(target)?
            .fields
            .iter()
            .map(ManifestField::descriptor)
            .collect())
    }

    async fn page_context(&self, target: &str) -> Result<Option<PageContext>, NavigatorError> {
        Ok(self.form(target)?.page_context.clone())
    }

    async fn apply_values(
        &self,
        target: &str,
        session: Option<AuthSession>,
        values: &HashMap<String, String>,
    ) -> Result<FieldReport, NavigatorError> {
        let form = self.form(target)?;

        let refused = session.as_ref().is_some_and(|s| !s.is_usable_at(Utc::now()));
        {
            let mut rejected = self.rejected.lock().unwrap_or_else(|e| e.into_inner());
            if refused {
                rejected.insert(target.to_string());
            } else {
                rejected.remove(target);
            }
        }

        let mut report = FieldReport::default();
        for field in form.fields.iter().map(ManifestField::descriptor) {
            let value = values.get(&field.name).map(String::as_str).unwrap_or("");
            if value.is_empty() {
                if field.required {
                    report.record_failed(&field.name, "required field left empty");
                } else {
                    report.record_applied(&field.name);
                }
                continue;
            }
            match check_value(field.semantic_type, value) {
                Some(reason) => report.record_failed(&field.name, reason),
                None => report.record_applied(&field.name),
            }
        }

        debug!(
            target,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "form filled"
        );
        Ok(report)
    }

    async fn current_session_rejected(&self, target: &str) -> Result<bool, NavigatorError> {
        Ok(self
            .rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(target))
    }
}
