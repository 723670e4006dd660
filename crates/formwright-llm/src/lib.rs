//! Formwright LLM - Batched form value generation
//!
//! This crate turns a list of detected form fields into values to inject:
//! - Field model: semantic types, scenarios, page context
//! - RateWindow: sliding record of external generation calls
//! - BatchedGenerationClient: one backend request per form per scenario
//! - ValueSynthesizer: local fallback with no network dependency
//! - Gemini: Google Gemini backend
//! - Mock: scripted backend for tests and offline runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod client;
pub mod error;
pub mod field;
pub mod gemini;
pub mod metrics;
pub mod parse;
pub mod prompt;
pub mod rate_window;
pub mod retry;
pub mod synth;
pub mod util;

pub use backend::{GenerationBackend, MockBackend, MockReply};
pub use client::{BatchedGenerationClient, FallbackReason, GenerationOutcome};
pub use error::{Error, Result};
pub use field::{
    FieldDescriptor, GenerationRequest, GenerationResponse, PageContext, PageCredential, Scenario,
    SemanticType, ValueSource,
};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use metrics::{GenerationMetrics, GenerationStats};
pub use rate_window::{RateWindow, RateWindowConfig};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
pub use synth::ValueSynthesizer;
