use super::normalizer::NormalizeError;
use super::prompt::PromptError;
use super::providers::ProviderError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("API key not configured")]
    MissingCredential,

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    MalformedCompletion(#[from] NormalizeError),
}

impl From<PromptError> for ReviewError {
    fn from(err: PromptError) -> Self {
        ReviewError::InvalidInput(err.to_string())
    }
}

impl ReviewError {
    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReviewError::InvalidInput(_) => "invalid_input",
            ReviewError::MissingCredential => "missing_credential",
            ReviewError::Upstream(_) => "upstream_error",
            ReviewError::MalformedCompletion(_) => "malformed_completion",
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ReviewError::MissingCredential => {
                AppError::NotConfigured("API key not configured".to_string())
            }
            ReviewError::Upstream(ProviderError::Upstream { status, message }) => {
                AppError::Upstream {
                    status: Some(status),
                    message,
                }
            }
            ReviewError::Upstream(e @ (ProviderError::Timeout(_) | ProviderError::Network(_))) => {
                AppError::Upstream {
                    status: None,
                    message: e.to_string(),
                }
            }
            ReviewError::Upstream(
                e @ (ProviderError::InvalidResponse(_) | ProviderError::EmptyCompletion),
            ) => AppError::UpstreamPayload(e.to_string()),
            ReviewError::MalformedCompletion(e) => AppError::UpstreamPayload(e.to_string()),
        }
    }
}
