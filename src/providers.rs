//! Collaborator construction
//!
//! Builds the generation backend, the generation client and the auth
//! manager from configuration.

use crate::config::{AppConfig, BackendChoice, GenerationSettings};
use anyhow::{Context, Result};
use formwright_core::auth::{
    AuthManager, FileTokenCache, IdentityProvider, LoginError, LoginOutcome,
};
use formwright_core::Credential;
use formwright_llm::{
    BatchedGenerationClient, GeminiBackend, GeminiConfig, GenerationBackend, MockBackend,
    RateWindow,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolve the generation backend, if any
pub fn resolve_backend(settings: &GenerationSettings) -> Result<Option<Arc<dyn GenerationBackend>>> {
    let gemini = |config: GeminiConfig| -> Result<Arc<dyn GenerationBackend>> {
        let config = match &settings.model {
            Some(model) => config.with_model(model.clone()),
            None => config,
        };
        let backend = GeminiBackend::new(config).context("Failed to create Gemini backend")?;
        info!(model = backend.model(), "Registered Gemini backend");
        Ok(Arc::new(backend))
    };

    match settings.backend {
        BackendChoice::None => {
            info!("Generation backend disabled, using local synthesis only");
            Ok(None)
        }
        BackendChoice::Mock => {
            info!("Using mock generation backend");
            Ok(Some(Arc::new(MockBackend::new())))
        }
        BackendChoice::Gemini => {
            let config = GeminiConfig::from_env()
                .context("generation.backend is \"gemini\" but no API key is set (GEMINI_API_KEY)")?;
            gemini(config).map(Some)
        }
        BackendChoice::Auto => match GeminiConfig::from_env() {
            Ok(config) => gemini(config).map(Some),
            Err(_) => {
                warn!("No GEMINI_API_KEY or GOOGLE_API_KEY set, using local synthesis only");
                Ok(None)
            }
        },
    }
}

/// Generation client sharing one rate window
pub fn build_generator(settings: &GenerationSettings) -> Result<Arc<BatchedGenerationClient>> {
    let backend = resolve_backend(settings)?;
    let window = Arc::new(RateWindow::new(settings.rate_window()));
    Ok(Arc::new(
        BatchedGenerationClient::new(backend, window)
            .with_retry(settings.retry())
            .with_call_timeout(settings.call_timeout()),
    ))
}

/// Auth manager over the on-disk session cache
pub fn build_auth(config: &AppConfig) -> AuthManager {
    let dir = config.auth.session_dir();
    info!(dir = %dir.display(), "Using session cache");
    AuthManager::new(
        Arc::new(ImportOnlyProvider),
        Arc::new(FileTokenCache::new(dir)),
        config.auth.auth_config(),
    )
}

/// Identity provider for the CLI.
///
/// The CLI has no browser, so interactive logins are refused; sessions come
/// from `formwright auth import`.
pub struct ImportOnlyProvider;

#[async_trait::async_trait]
impl IdentityProvider for ImportOnlyProvider {
    fn name(&self) -> &str {
        "import-only"
    }

    async fn login(
        &self,
        identity: &str,
        _credential: &Credential,
    ) -> Result<LoginOutcome, LoginError> {
        Err(LoginError::Rejected(format!(
            "interactive login is unavailable; run `formwright auth import {identity} <state.json>`"
        )))
    }
}
