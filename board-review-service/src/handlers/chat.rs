use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{rejection_to_error, ChatRequest};
use crate::models::ChatReply;
use crate::services::review::context_from_value;
use crate::services::{metrics, CredentialSource, ReviewError};
use crate::startup::AppState;

/// `POST /chat`: governance chat with the server-held key.
#[tracing::instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    handle(&state, CredentialSource::Server, body).await
}

/// `POST /byok/chat`: governance chat with the caller's `apiKey`.
#[tracing::instrument(skip_all)]
pub async fn chat_byok(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    handle(&state, CredentialSource::Caller, body).await
}

async fn handle(
    state: &AppState,
    source: CredentialSource,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(request) = body.map_err(|rejection| {
        metrics::record_request("chat", source.as_str(), "invalid_body");
        rejection_to_error(rejection)
    })?;

    let result = run(state, source, request).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::record_request("chat", source.as_str(), outcome);

    Ok(Json(result?))
}

async fn run(
    state: &AppState,
    source: CredentialSource,
    request: ChatRequest,
) -> Result<ChatReply, ReviewError> {
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    if source == CredentialSource::Caller {
        let has_key = request
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !has_key || message.is_none() {
            return Err(ReviewError::InvalidInput(
                "API key and message required".to_string(),
            ));
        }
    }

    let api_key = state
        .review
        .resolve_key(source, request.api_key.as_deref())?;
    let message =
        message.ok_or_else(|| ReviewError::InvalidInput("Message required".to_string()))?;
    let context = context_from_value(request.context.as_ref())?;

    state.review.chat(&api_key, message, context.as_ref()).await
}
