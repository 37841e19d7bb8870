//! Analysis and chat orchestration: credential, prompt, one upstream call,
//! normalization.

use super::error::ReviewError;
use super::metrics;
use super::normalizer::{self, NormalizeError};
use super::prompt::{self, DocumentPayload};
use super::providers::{Completion, CompletionProvider, CompletionRequest};
use crate::config::LimitsConfig;
use crate::models::{AnalysisResult, ChatReply};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use std::time::Instant;

/// Where the upstream credential for a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Key configured on the server at startup.
    Server,
    /// Key supplied by the caller in the request body.
    Caller,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Server => "server",
            CredentialSource::Caller => "caller",
        }
    }
}

#[derive(Clone)]
pub struct ReviewService {
    provider: Arc<dyn CompletionProvider>,
    server_key: Option<Secret<String>>,
    analyze_max_tokens: u32,
    chat_max_tokens: u32,
}

impl ReviewService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        server_key: Option<Secret<String>>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            provider,
            server_key,
            analyze_max_tokens: limits.analyze_max_tokens,
            chat_max_tokens: limits.chat_max_tokens,
        }
    }

    pub fn has_server_key(&self) -> bool {
        self.server_key.is_some()
    }

    /// Pick the key for `source`. Blank caller keys count as absent.
    pub fn resolve_key(
        &self,
        source: CredentialSource,
        caller_key: Option<&str>,
    ) -> Result<Secret<String>, ReviewError> {
        match source {
            CredentialSource::Server => self
                .server_key
                .clone()
                .ok_or(ReviewError::MissingCredential),
            CredentialSource::Caller => caller_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| Secret::new(k.to_string()))
                .ok_or_else(|| ReviewError::InvalidInput("API key required".to_string())),
        }
    }

    #[tracing::instrument(skip(self, api_key, payload), fields(kind = payload.kind()))]
    pub async fn analyze(
        &self,
        api_key: &Secret<String>,
        payload: &DocumentPayload,
    ) -> Result<AnalysisResult, ReviewError> {
        let request = CompletionRequest {
            max_tokens: self.analyze_max_tokens,
            messages: vec![prompt::analysis_message(payload)],
        };

        let completion = self.complete("analyze", api_key, &request).await?;

        normalizer::normalize_analysis(&completion.text).map_err(|e| {
            metrics::record_normalization_failure(normalize_reason(&e));
            tracing::warn!(
                error = %e,
                finish_reason = completion.finish_reason.as_str(),
                completion_len = completion.text.len(),
                "Failed to normalize analysis completion"
            );
            ReviewError::from(e)
        })
    }

    #[tracing::instrument(skip_all, fields(has_context = context.is_some()))]
    pub async fn chat(
        &self,
        api_key: &Secret<String>,
        message: &str,
        context: Option<&AnalysisResult>,
    ) -> Result<ChatReply, ReviewError> {
        let request = CompletionRequest {
            max_tokens: self.chat_max_tokens,
            messages: vec![prompt::chat_message(message, context)?],
        };

        let completion = self.complete("chat", api_key, &request).await?;
        Ok(normalizer::normalize_chat_reply(&completion.text))
    }

    async fn complete(
        &self,
        operation: &str,
        api_key: &Secret<String>,
        request: &CompletionRequest,
    ) -> Result<Completion, ReviewError> {
        let provider = self.provider.name();
        let model = self.provider.model().to_string();
        let start = Instant::now();

        let result = self
            .provider
            .complete(api_key.expose_secret(), request)
            .await;

        metrics::record_upstream_latency(
            provider,
            &model,
            operation,
            start.elapsed().as_secs_f64(),
        );

        match result {
            Ok(completion) => {
                metrics::record_tokens(
                    &model,
                    operation,
                    completion.input_tokens,
                    completion.output_tokens,
                );
                tracing::info!(
                    operation,
                    model = %model,
                    input_tokens = completion.input_tokens,
                    output_tokens = completion.output_tokens,
                    finish_reason = completion.finish_reason.as_str(),
                    "Completion received"
                );
                Ok(completion)
            }
            Err(e) => {
                metrics::record_upstream_error(provider, e.kind());
                tracing::error!(operation, error = %e, "Completion request failed");
                Err(e.into())
            }
        }
    }
}

/// Chat context as sent by the caller: any JSON value shaped like an analysis.
pub fn context_from_value(
    value: Option<&serde_json::Value>,
) -> Result<Option<AnalysisResult>, ReviewError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => normalizer::analysis_from_value(value)
            .map(Some)
            .map_err(|e| ReviewError::InvalidInput(format!("Invalid context: {}", e))),
    }
}

fn normalize_reason(err: &NormalizeError) -> &'static str {
    match err {
        NormalizeError::InvalidJson(_) => "invalid_json",
        NormalizeError::NotAnObject(_) => "not_an_object",
        NormalizeError::WrongType { .. } => "wrong_type",
    }
}
