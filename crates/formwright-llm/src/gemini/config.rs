//! Gemini backend configuration

use crate::error::{Error, Result};
use crate::util::mask_api_key;
use std::fmt;
use std::time::Duration;

/// Default API base URL
pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini backend configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key, sent as `x-goog-api-key`
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit
    pub max_output_tokens: u32,
    /// Per-call timeout
    pub timeout: Duration,
}

// SECURITY: mask the key in debug output
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Create a configuration with an API key and defaults
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_output_tokens: 4096,
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the key from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    ///
    /// `GEMINI_MODEL`, `GEMINI_BASE_URL`, `GEMINI_TEMPERATURE` and
    /// `GEMINI_MAX_TOKENS` override the defaults when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::NotConfigured("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
            })?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(t) = std::env::var("GEMINI_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.temperature = t;
        }
        if let Some(n) = std::env::var("GEMINI_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_output_tokens = n;
        }
        Ok(config)
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the output token limit
    #[must_use]
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
