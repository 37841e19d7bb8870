//! Upstream model provider abstractions and implementations.
//!
//! Handlers talk to [`CompletionProvider`]; the Anthropic Messages API is the
//! production backend and [`mock::MockCompletionProvider`] backs the tests.

pub mod anthropic;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Upstream returned no text content")]
    EmptyCompletion,
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Upstream { .. } => "upstream_status",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Network(_) => "network",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::EmptyCompletion => "empty_completion",
        }
    }
}

/// One piece of a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),

    /// Base64-encoded document bytes with their media type.
    Document { media_type: String, data: String },
}

/// A single user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub parts: Vec<PromptPart>,
}

impl PromptMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(text.into())],
        }
    }

    /// Concatenated text parts, documents omitted.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Document { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub max_tokens: u32,
    pub messages: Vec<PromptMessage>,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    /// Output hit the token limit; the text is likely truncated.
    Length,
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "complete",
            FinishReason::Length => "length",
            FinishReason::Other => "other",
        }
    }
}

/// Raw completion text and usage.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

/// A text completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Model identifier sent upstream.
    fn model(&self) -> &str;

    /// Perform one completion call with the given credential.
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError>;
}
