//! Request bodies for the analyze and chat endpoints.
//!
//! These intentionally do not derive `Debug`: they carry the caller's API key.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// `"pdf"` selects `base64_data`; anything else selects `text_data`.
    pub file_type: Option<String>,
    pub base64_data: Option<String>,
    pub text_data: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    /// A previously returned analysis, possibly partial.
    pub context: Option<serde_json::Value>,
    pub api_key: Option<String>,
}

/// Body rejections become JSON errors instead of axum's plain-text responses.
pub fn rejection_to_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid request body: {}",
            rejection.body_text()
        ))
    }
}
