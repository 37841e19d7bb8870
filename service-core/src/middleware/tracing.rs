use axum::http::{HeaderValue, Request as HttpRequest};
use axum::{extract::Request, middleware::Next, response::Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is propagated; longer ids are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Propagates `x-request-id` from the caller, or mints a v4 uuid, and echoes it
/// on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let header_value = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|h| !h.is_empty() && h.len() <= MAX_REQUEST_ID_LEN)
        .filter(|h| h.to_str().is_ok())
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(header_value) = header_value else {
        return next.run(req).await;
    };

    req.headers_mut()
        .insert(REQUEST_ID_HEADER, header_value.clone());

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, header_value);

    response
}

fn make_request_span<B>(request: &HttpRequest<B>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
    )
}

type MakeRequestSpan<B> = fn(&HttpRequest<B>) -> tracing::Span;

/// `TraceLayer` whose span carries the request id. Must sit inside
/// [`request_id_middleware`] so the header is already populated.
pub fn http_trace_layer<B>()
-> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, MakeRequestSpan<B>> {
    TraceLayer::new_for_http().make_span_with(make_request_span::<B> as MakeRequestSpan<B>)
}
