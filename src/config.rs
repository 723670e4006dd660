//! Configuration
//!
//! Layered as: embedded defaults, `config/default`, `config/local`, an
//! optional `--config` file, then `FORMWRIGHT_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use formwright_core::{AuthConfig, CoordinatorConfig};
use formwright_llm::{RateWindowConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Which generation backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Gemini if a key is present, otherwise none
    #[default]
    Auto,
    Gemini,
    /// Echo backend, for dry runs
    Mock,
    /// Local synthesis only
    None,
}

/// `[generation]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub backend: BackendChoice,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: usize,
    #[serde(default = "default_monitor_window_secs")]
    pub monitor_window_secs: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
}

fn default_calls_per_minute() -> usize {
    15
}

fn default_monitor_window_secs() -> u64 {
    300
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_retry_delay_ms() -> u64 {
    500
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            model: None,
            calls_per_minute: default_calls_per_minute(),
            monitor_window_secs: default_monitor_window_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
        }
    }
}

impl GenerationSettings {
    pub fn rate_window(&self) -> RateWindowConfig {
        RateWindowConfig {
            calls_per_minute: self.calls_per_minute,
            monitor_window: Duration::from_secs(self.monitor_window_secs),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_retry_delay_ms))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// `[auth]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    #[serde(default = "default_two_fa_timeout_secs")]
    pub two_fa_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u64,
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    /// Targets on these hosts (or their subdomains) need a session
    #[serde(default)]
    pub protected_domains: Vec<String>,
}

fn default_login_timeout_secs() -> u64 {
    60
}

fn default_two_fa_timeout_secs() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_session_ttl_days() -> u64 {
    30
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_timeout_secs: default_login_timeout_secs(),
            two_fa_timeout_secs: default_two_fa_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            session_ttl_days: default_session_ttl_days(),
            session_dir: None,
            protected_domains: Vec::new(),
        }
    }
}

impl AuthSettings {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_login_timeout(Duration::from_secs(self.login_timeout_secs))
            .with_two_fa_timeout(Duration::from_secs(self.two_fa_timeout_secs))
            .with_retry_attempts(self.retry_attempts)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_session_ttl(Duration::from_secs(self.session_ttl_days * 24 * 60 * 60))
    }

    /// Configured session directory, else `<data dir>/formwright/sessions`
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("formwright")
                .join("sessions")
        })
    }
}

impl AppConfig {
    /// Reject settings the components cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.max_parallel == 0 {
            anyhow::bail!("coordinator.max_parallel must be at least 1");
        }
        if self.auth.retry_attempts == 0 {
            anyhow::bail!("auth.retry_attempts must be at least 1");
        }
        if self.generation.call_timeout_secs == 0 {
            anyhow::bail!("generation.call_timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Load configuration from files and environment
pub fn load_config(extra: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Project overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false));

    // 3. Explicit --config file
    if let Some(path) = extra {
        builder = builder.add_source(File::from(path).required(true));
    }

    // 4. Environment (highest priority): FORMWRIGHT_AUTH__SESSION_DIR etc.
    let config = builder
        .add_source(
            Environment::with_prefix("FORMWRIGHT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let app: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    app.validate()?;
    Ok(app)
}
