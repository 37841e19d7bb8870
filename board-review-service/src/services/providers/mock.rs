//! Mock provider implementation for testing.

use super::{Completion, CompletionProvider, CompletionRequest, FinishReason, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: String,
    pub request: CompletionRequest,
}

/// Replays queued outcomes in order and records every call.
///
/// When the queue is empty the mock answers with `fallback_text`.
#[derive(Default)]
pub struct MockCompletionProvider {
    responses: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    fallback_text: String,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(text: impl Into<String>) -> Self {
        Self {
            fallback_text: text.into(),
            ..Self::default()
        }
    }

    /// Queue a successful completion with the given text.
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(Ok(completion(text.into())))
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ProviderError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, outcome: Result<Completion, ProviderError>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn completion(text: String) -> Completion {
    Completion {
        input_tokens: (text.len() / 4) as u32,
        output_tokens: 10,
        text,
        finish_reason: FinishReason::Complete,
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                api_key: api_key.to_string(),
                request: request.clone(),
            });

        let queued = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        queued.unwrap_or_else(|| Ok(completion(self.fallback_text.clone())))
    }
}
