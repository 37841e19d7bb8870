//! HTTP handlers for the board review service.

pub mod analyze;
pub mod chat;
pub mod health;
pub mod metrics;

use service_core::error::AppError;

/// Fallback for any verb other than POST (and OPTIONS, answered by the CORS layer).
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
