//! Anthropic Messages API provider.
//!
//! One blocking `POST /v1/messages` per completion; no retries, no streaming.

use super::{
    Completion, CompletionProvider, CompletionRequest, FinishReason, PromptMessage, PromptPart,
    ProviderError,
};
use crate::config::AnthropicConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_version: String,
    model: String,
    timeout_secs: u64,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout()))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// A message made of a single text part is sent as a plain string; anything
/// else becomes a list of content blocks.
fn to_wire(message: &PromptMessage) -> WireMessage<'_> {
    let content = match message.parts.as_slice() {
        [PromptPart::Text(text)] => WireContent::Text(text),
        parts => WireContent::Blocks(
            parts
                .iter()
                .map(|part| match part {
                    PromptPart::Text(text) => ContentBlock::Text { text },
                    PromptPart::Document { media_type, data } => ContentBlock::Document {
                        source: DocumentSource {
                            kind: "base64",
                            media_type,
                            data,
                        },
                    },
                })
                .collect(),
        ),
    };

    WireMessage {
        role: "user",
        content,
    }
}

fn finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") | None => FinishReason::Complete,
        Some("max_tokens") => FinishReason::Length,
        Some(_) => FinishReason::Other,
    }
}

/// `error.message` from the upstream envelope, else a generic status message.
fn upstream_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("API Error: {}", status.as_u16()))
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: request.messages.iter().map(to_wire).collect(),
        };

        tracing::debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            message_count = request.messages.len(),
            "Sending request to Anthropic API"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = upstream_error_message(status, &error_text);

            tracing::warn!(
                status = status.as_u16(),
                error = %message,
                "Anthropic API returned an error"
            );

            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_secs)
            } else {
                ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
            }
        })?;

        let texts: Vec<&str> = api_response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if texts.is_empty() {
            return Err(ProviderError::EmptyCompletion);
        }

        let finish_reason = finish_reason(api_response.stop_reason.as_deref());
        if finish_reason == FinishReason::Length {
            tracing::warn!(
                model = %self.model,
                max_tokens = request.max_tokens,
                "Completion stopped at the token limit and may be truncated"
            );
        }

        let usage = api_response.usage.unwrap_or_default();

        Ok(Completion {
            text: texts.concat(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            finish_reason,
        })
    }
}

// ============================================================================
// Anthropic API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Blocks(Vec<ContentBlock<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Document { source: DocumentSource<'a> },
}

#[derive(Debug, Serialize)]
struct DocumentSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
