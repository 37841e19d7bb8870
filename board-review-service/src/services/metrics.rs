//! Prometheus metrics for board-review-service.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static REVIEW_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static UPSTREAM_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static UPSTREAM_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static UPSTREAM_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static NORMALIZATION_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    match build_registry() {
        Ok(()) => tracing::info!("Prometheus metrics initialized"),
        Err(e) => tracing::error!(error = %e, "Failed to initialize metrics"),
    }
}

fn build_registry() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let requests = IntCounterVec::new(
        Opts::new("review_requests_total", "Total analyze/chat requests"),
        &["operation", "credential", "outcome"],
    )?;

    let latency = HistogramVec::new(
        HistogramOpts::new(
            "upstream_latency_seconds",
            "Model provider API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider", "model", "operation"],
    )?;

    let errors = IntCounterVec::new(
        Opts::new("upstream_errors_total", "Total model provider errors"),
        &["provider", "error_type"],
    )?;

    let tokens = IntCounterVec::new(
        Opts::new("upstream_tokens_total", "Total tokens processed"),
        &["model", "operation", "type"], // type: input, output
    )?;

    let normalization_failures = IntCounterVec::new(
        Opts::new(
            "normalization_failures_total",
            "Completions that could not be normalized into an analysis",
        ),
        &["reason"],
    )?;

    registry.register(Box::new(requests.clone()))?;
    registry.register(Box::new(latency.clone()))?;
    registry.register(Box::new(errors.clone()))?;
    registry.register(Box::new(tokens.clone()))?;
    registry.register(Box::new(normalization_failures.clone()))?;

    let _ = REVIEW_REQUESTS_TOTAL.set(requests);
    let _ = UPSTREAM_LATENCY_SECONDS.set(latency);
    let _ = UPSTREAM_ERRORS_TOTAL.set(errors);
    let _ = UPSTREAM_TOKENS_TOTAL.set(tokens);
    let _ = NORMALIZATION_FAILURES_TOTAL.set(normalization_failures);
    let _ = REGISTRY.set(registry);

    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a finished analyze/chat request.
pub fn record_request(operation: &str, credential: &str, outcome: &str) {
    if let Some(counter) = REVIEW_REQUESTS_TOTAL.get() {
        counter
            .with_label_values(&[operation, credential, outcome])
            .inc();
    }
}

/// Record provider latency.
pub fn record_upstream_latency(provider: &str, model: &str, operation: &str, duration_secs: f64) {
    if let Some(histogram) = UPSTREAM_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model, operation])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_upstream_error(provider: &str, error_type: &str) {
    if let Some(counter) = UPSTREAM_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record token usage.
pub fn record_tokens(model: &str, operation: &str, input_tokens: u32, output_tokens: u32) {
    if let Some(counter) = UPSTREAM_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, operation, "input"])
            .inc_by(u64::from(input_tokens));
        counter
            .with_label_values(&[model, operation, "output"])
            .inc_by(u64::from(output_tokens));
    }
}

/// Record a completion that failed normalization.
pub fn record_normalization_failure(reason: &str) {
    if let Some(counter) = NORMALIZATION_FAILURES_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_metrics() {
        init_metrics();
        init_metrics();
        record_request("analyze", "server", "ok");
        record_normalization_failure("invalid_json");

        let text = get_metrics();
        assert!(text.contains("review_requests_total"));
        assert!(text.contains("normalization_failures_total"));
    }
}
