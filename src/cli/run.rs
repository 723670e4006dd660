//! `formwright run`

use crate::config::AppConfig;
use crate::manifest::{Manifest, ManifestNavigator};
use crate::providers::{build_auth, build_generator};
use anyhow::{Context, Result};
use formwright_core::{ConcurrencyCoordinator, JobResult, JobStatus, StaticCredentials};
use formwright_llm::{GenerationStats, Scenario};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything `run` reports
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub results: Vec<JobResult>,
    pub generation: GenerationStats,
}

impl RunReport {
    pub fn new(results: Vec<JobResult>, generation: GenerationStats) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            succeeded: count(JobStatus::Succeeded),
            partial: count(JobStatus::Partial),
            failed: count(JobStatus::Failed),
            results,
            generation,
        }
    }
}

pub async fn run(
    config: &AppConfig,
    manifest_path: &Path,
    scenarios: &[Scenario],
    max_parallel: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let jobs = manifest.jobs(scenarios, &config.auth.protected_domains);
    let max_parallel = max_parallel.unwrap_or(config.coordinator.max_parallel);
    info!(
        manifest = %manifest_path.display(),
        forms = manifest.forms.len(),
        jobs = jobs.len(),
        "Loaded manifest"
    );

    let generator = build_generator(&config.generation)?;
    let coordinator = ConcurrencyCoordinator::new(
        Arc::new(ManifestNavigator::new(manifest.forms)),
        Arc::clone(&generator),
        build_auth(config),
        // Logins are never interactive here; sessions come from `auth import`
        Arc::new(StaticCredentials::new()),
    );

    let results = coordinator.run(jobs, max_parallel).await;
    let report = RunReport::new(results, generator.stats());
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize results")?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            info!(path = %path.display(), "Results written");
        }
        None => println!("{json}"),
    }

    eprintln!(
        "✅ {} succeeded, ⚠️  {} partial, ❌ {} failed",
        report.succeeded, report.partial, report.failed
    );
    Ok(())
}
