//! `formwright auth`

use crate::config::AppConfig;
use crate::providers::build_auth;
use anyhow::{Context, Result};
use clap::Subcommand;
use formwright_core::auth::SessionArtifact;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Show the cached session for an identity
    Status { identity: String },
    /// Store an exported browser session (storage-state JSON) for an identity
    Import { identity: String, state: PathBuf },
    /// Remove cached sessions
    Clear {
        /// Identity to clear; omit with --all
        identity: Option<String>,
        #[arg(long, conflicts_with = "identity")]
        all: bool,
    },
}

pub async fn run(config: &AppConfig, command: AuthCommand) -> Result<()> {
    let auth = build_auth(config);

    match command {
        AuthCommand::Status { identity } => {
            let status = auth
                .get_auth_status(&identity)
                .await
                .map_err(formwright_core::Error::from)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.is_authenticated() {
                eprintln!("💡 Run `formwright auth import {identity} <state.json>` to add a session.");
            }
        }
        AuthCommand::Import { identity, state } => {
            let text = std::fs::read_to_string(&state)
                .with_context(|| format!("Failed to read {}", state.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", state.display()))?;
            let session = auth
                .import_session(&identity, SessionArtifact::new(value))
                .await
                .map_err(formwright_core::Error::from)?;
            match session.expires_at {
                Some(at) => println!("✅ Session for {identity} stored, valid until {at}"),
                None => println!("✅ Session for {identity} stored"),
            }
        }
        AuthCommand::Clear { identity, all } => match (identity, all) {
            (Some(identity), _) => {
                auth.clear(&identity)
                    .await
                    .map_err(formwright_core::Error::from)?;
                println!("🗑️  Cleared session for {identity}");
            }
            (None, true) => {
                auth.clear_all().await.map_err(formwright_core::Error::from)?;
                println!("🗑️  Cleared all sessions");
            }
            (None, false) => anyhow::bail!("Name an identity to clear, or pass --all"),
        },
    }
    Ok(())
}
