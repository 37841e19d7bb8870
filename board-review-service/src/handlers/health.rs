use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness probe. Also reports whether the server-held key is configured.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "board-review-service",
            "version": env!("CARGO_PKG_VERSION"),
            "server_credential": state.review.has_server_key(),
        })),
    )
}

/// Readiness probe. The service holds no connections, so it is ready once listening.
pub async fn readiness_check() -> StatusCode {
    StatusCode::OK
}
