//! Gemini backend implementation

use super::config::GeminiConfig;
use super::security::sanitize_api_error;
use super::types::{GeminiContent, GeminiError, GeminiRequest, GeminiResponse, GenerationConfig};
use crate::backend::GenerationBackend;
use crate::error::{Error, Result};
use crate::field::{GenerationRequest, GenerationResponse};
use crate::parse::parse_values;
use crate::prompt::{self, SYSTEM_INSTRUCTION};
use reqwest::Client;
use tracing::{debug, instrument, warn};

/// Gemini generation backend.
///
/// Makes exactly one HTTP request per [`GenerationBackend::generate_batch`]
/// call; retries belong to the batched client so every attempt is counted.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a backend from configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::NotConfigured("Gemini API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create a backend from `GEMINI_API_KEY` / `GOOGLE_API_KEY`
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// The configured model
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub(crate) fn build_request(&self, request: &GenerationRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt::render(request))],
            system_instruction: Some(GeminiContent::text(None, SYSTEM_INSTRUCTION)),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }

    async fn send(&self, body: &GeminiRequest) -> Result<GeminiResponse> {
        // SECURITY: key travels in a header, never in the logged URL
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(status = %status, "Gemini API error response");
            return Err(classify_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

/// Map a non-2xx Gemini response to an error
pub(crate) fn classify_error(status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<GeminiError>(body)
        .map(|e| format!("{}: {}", e.error.status, e.error.message))
        .unwrap_or_else(|_| format!("HTTP {status}"));

    match status {
        429 => Error::RateLimit,
        500..=599 => Error::ServerError(sanitize_api_error(&detail)),
        _ => Error::Api(sanitize_api_error(&detail)),
    }
}

#[async_trait::async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, fields = request.fields.len()))]
    async fn generate_batch(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let body = self.build_request(request);
        let response = self.send(&body).await?;

        let text = response
            .first_text()
            .ok_or_else(|| Error::InvalidResponse("empty candidate".to_string()))?;
        debug!(bytes = text.len(), "Gemini returned text");

        parse_values(&text, request)
    }
}
