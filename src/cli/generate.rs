//! `formwright generate`

use crate::config::AppConfig;
use crate::manifest::ManifestField;
use crate::providers::build_generator;
use anyhow::{Context, Result};
use formwright_llm::{FieldDescriptor, PageContext, Scenario};
use serde::Deserialize;
use std::path::Path;

/// Fields may be given fully typed or as raw extracted inputs
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldInput {
    Descriptor(FieldDescriptor),
    Raw(ManifestField),
}

impl FieldInput {
    fn into_descriptor(self) -> FieldDescriptor {
        match self {
            FieldInput::Descriptor(d) => d,
            FieldInput::Raw(raw) => raw.descriptor(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {what} {}", path.display()))
}

pub async fn run(
    config: &AppConfig,
    fields_path: &Path,
    scenario: Scenario,
    context_path: Option<&Path>,
) -> Result<()> {
    let fields: Vec<FieldDescriptor> = read_json::<Vec<FieldInput>>(fields_path, "fields")?
        .into_iter()
        .map(FieldInput::into_descriptor)
        .collect();
    let page_context: Option<PageContext> = context_path
        .map(|p| read_json(p, "page context"))
        .transpose()?;

    let generator = build_generator(&config.generation)?;
    let outcome = generator
        .generate(&fields, page_context.as_ref(), scenario)
        .await;

    if let Some(reason) = outcome.fallback_reason {
        eprintln!("⚠️  {} value(s) generated locally: {}", outcome.fallback_count(), reason);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize values")?
    );
    Ok(())
}
