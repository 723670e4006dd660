//! Scripted backend for tests and offline runs

use super::GenerationBackend;
use crate::error::{Error, Result};
use crate::field::{GenerationRequest, GenerationResponse};
use crate::parse::parse_values;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply
#[derive(Debug)]
pub enum MockReply {
    /// Raw model text, run through the normal response parser
    Text(String),
    /// Fail the call with this error
    Fail(Error),
    /// Never answer within `Duration` (lets timeouts fire)
    Stall(Duration),
}

/// Backend that answers from a queue of scripted replies.
///
/// With the queue empty it echoes a `"mock-<field>"` value for every
/// requested field. Every request is recorded for inspection.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a backend with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Queue a raw text reply
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    /// Number of `generate_batch` calls so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_batch(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match self.next_reply() {
            Some(MockReply::Text(text)) => parse_values(&text, request),
            Some(MockReply::Fail(e)) => Err(e),
            Some(MockReply::Stall(d)) => {
                tokio::time::sleep(d).await;
                Err(Error::Timeout(d.as_millis() as u64))
            }
            None => Ok(request
                .fields
                .iter()
                .map(|f| (f.name.clone(), format!("mock-{}", f.name)))
                .collect()),
        }
    }
}
