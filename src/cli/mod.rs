//! CLI module for Formwright
//!
//! Provides commands:
//! - `run`: fill every form in a manifest
//! - `generate`: produce values for a field list without filling anything
//! - `auth`: inspect, import and clear cached sessions

use clap::{Parser, Subcommand, ValueEnum};
use formwright_llm::Scenario;
use std::path::PathBuf;

pub mod auth;
pub mod generate;
pub mod run;

/// Formwright CLI
#[derive(Parser, Debug)]
#[command(name = "formwright")]
#[command(about = "Fill web forms with generated test data")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file, layered over config/default.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fill every form in a manifest
    Run {
        /// Manifest JSON (forms and optional jobs)
        manifest: PathBuf,
        /// Scenarios for forms without an explicit job
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "valid")]
        scenario: Vec<ScenarioArg>,
        /// Overrides coordinator.max_parallel
        #[arg(long)]
        max_parallel: Option<usize>,
        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate values for a field list
    Generate {
        /// JSON array of fields
        fields: PathBuf,
        #[arg(short, long, value_enum, default_value = "valid")]
        scenario: ScenarioArg,
        /// JSON page context (credentials/instructions shown on the page)
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Manage cached sessions
    Auth {
        #[command(subcommand)]
        command: auth::AuthCommand,
    },
}

/// Scenario as typed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioArg {
    Valid,
    Invalid,
    Edge,
}

impl From<ScenarioArg> for Scenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Valid => Scenario::Valid,
            ScenarioArg::Invalid => Scenario::Invalid,
            ScenarioArg::Edge => Scenario::Edge,
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::config::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Run {
            manifest,
            scenario,
            max_parallel,
            output,
        }) => {
            let scenarios: Vec<Scenario> = scenario.into_iter().map(Scenario::from).collect();
            run::run(&config, &manifest, &scenarios, max_parallel, output.as_deref()).await
        }
        Some(Commands::Generate {
            fields,
            scenario,
            context,
        }) => generate::run(&config, &fields, scenario.into(), context.as_deref()).await,
        Some(Commands::Auth { command }) => auth::run(&config, command).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
