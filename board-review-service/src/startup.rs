//! Application startup and lifecycle management.
//!
//! Builds the axum router (API routes, probes, metrics) and owns the HTTP
//! listener.

use crate::config::ReviewConfig;
use crate::handlers::{analyze, chat, health, method_not_allowed, metrics};
use crate::services::providers::anthropic::AnthropicProvider;
use crate::services::providers::CompletionProvider;
use crate::services::ReviewService;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::http_trace_layer;
use service_core::middleware::{
    cors_middleware, request_id_middleware, security_headers_middleware, CorsPolicy,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ReviewConfig,
    pub review: ReviewService,
}

impl AppState {
    pub fn new(config: ReviewConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let review = ReviewService::new(
            provider,
            config.anthropic.api_key.clone(),
            &config.limits,
        );
        Self { config, review }
    }
}

/// CORS for the server-held key routes; browsers may send credentials.
pub fn server_cors_policy() -> CorsPolicy {
    CorsPolicy::new()
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            header::HeaderName::from_static("x-csrf-token"),
            header::HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            header::HeaderName::from_static("accept-version"),
            header::CONTENT_LENGTH,
            header::HeaderName::from_static("content-md5"),
            header::CONTENT_TYPE,
            header::DATE,
            header::HeaderName::from_static("x-api-version"),
        ])
        .allow_credentials(true)
}

/// CORS for the caller-supplied key routes.
pub fn byok_cors_policy() -> CorsPolicy {
    CorsPolicy::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_router(state: AppState) -> Router {
    let server_routes = Router::new()
        .route(
            "/analyze",
            post(analyze::analyze).fallback(method_not_allowed),
        )
        .route("/chat", post(chat::chat).fallback(method_not_allowed))
        .layer(from_fn_with_state(server_cors_policy(), cors_middleware));

    let byok_routes = Router::new()
        .route(
            "/byok/analyze",
            post(analyze::analyze_byok).fallback(method_not_allowed),
        )
        .route(
            "/byok/chat",
            post(chat::chat_byok).fallback(method_not_allowed),
        )
        .layer(from_fn_with_state(byok_cors_policy(), cors_middleware));

    let body_limit = state.config.limits.max_body_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics::metrics))
        .merge(server_routes)
        .merge(byok_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(security_headers_middleware))
        .layer(http_trace_layer::<Body>())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the Anthropic provider.
    pub async fn build(config: ReviewConfig) -> Result<Self, AppError> {
        let provider = AnthropicProvider::new(&config.anthropic).map_err(|e| {
            tracing::error!("Failed to create HTTP client: {}", e);
            AppError::InternalError(anyhow::Error::new(e))
        })?;

        tracing::info!(
            model = %config.anthropic.model,
            base_url = %config.anthropic.base_url,
            timeout_secs = config.anthropic.timeout_secs,
            server_credential = config.has_server_credential(),
            "Initialized Anthropic provider"
        );

        if !config.has_server_credential() {
            tracing::warn!(
                "ANTHROPIC_API_KEY is not set; /analyze and /chat will answer 500 until configured"
            );
        }

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around an existing provider.
    pub async fn build_with_provider(
        config: ReviewConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, AppError> {
        // Bind HTTP listener (port 0 = random port for testing)
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Board review service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, provider),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
