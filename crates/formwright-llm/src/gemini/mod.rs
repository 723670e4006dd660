//! Gemini - Google Gemini generation backend
//!
//! Sends the batched prompt to `models/{model}:generateContent` with JSON
//! output requested, and parses the first candidate's text.

mod config;
mod provider;
mod security;
mod types;


pub use config::{GeminiConfig, DEFAULT_MODEL};
pub use provider::GeminiBackend;
