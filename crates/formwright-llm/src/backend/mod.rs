//! Generative backend capability
//!
//! The batched client only needs one thing from a backend: turn a whole
//! [`GenerationRequest`] into a field → value map in one round trip.

mod mock;

pub use mock::{MockBackend, MockReply};

use crate::error::Result;
use crate::field::{GenerationRequest, GenerationResponse};

/// A source of generated field values
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Generate values for every field of `request` in a single call
    async fn generate_batch(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}
