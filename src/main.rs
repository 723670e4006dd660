//! Formwright - batched form filling
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod manifest;
mod providers;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let default_filter = if cli.verbose {
        "formwright=debug,formwright_core=debug,formwright_llm=debug"
    } else {
        "formwright=info,formwright_core=info,formwright_llm=info"
    };

    // Logs go to stderr so JSON results on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = cli::run(cli).await {
        if let Some(core) = e.downcast_ref::<formwright_core::Error>() {
            eprintln!("{}", formwright_core::format_error_for_cli(core));
            std::process::exit(1);
        }
        return Err(e);
    }
    Ok(())
}
