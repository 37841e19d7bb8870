use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{rejection_to_error, AnalyzeRequest};
use crate::models::AnalysisResult;
use crate::services::{metrics, CredentialSource, DocumentPayload, ReviewError};
use crate::startup::AppState;

/// `POST /analyze`: analyse a document with the server-held key.
#[tracing::instrument(skip_all)]
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    handle(&state, CredentialSource::Server, body).await
}

/// `POST /byok/analyze`: analyse a document with the caller's `apiKey`.
#[tracing::instrument(skip_all)]
pub async fn analyze_byok(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    handle(&state, CredentialSource::Caller, body).await
}

async fn handle(
    state: &AppState,
    source: CredentialSource,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Json(request) = body.map_err(|rejection| {
        metrics::record_request("analyze", source.as_str(), "invalid_body");
        rejection_to_error(rejection)
    })?;

    let result = run(state, source, request).await;

    match &result {
        Ok(analysis) => {
            metrics::record_request("analyze", source.as_str(), "ok");
            tracing::info!(
                credential = source.as_str(),
                risks = analysis.risks.len(),
                decisions = analysis.decisions.len(),
                questions = analysis.questions.len(),
                "Analysis completed"
            );
        }
        Err(e) => metrics::record_request("analyze", source.as_str(), e.outcome()),
    }

    Ok(Json(result?))
}

async fn run(
    state: &AppState,
    source: CredentialSource,
    request: AnalyzeRequest,
) -> Result<AnalysisResult, ReviewError> {
    let api_key = state
        .review
        .resolve_key(source, request.api_key.as_deref())?;

    let payload = DocumentPayload::from_request(
        request.file_type.as_deref(),
        request.base64_data.as_deref(),
        request.text_data.as_deref(),
    )?;

    state.review.analyze(&api_key, &payload).await
}
