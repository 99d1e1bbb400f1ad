use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies up to this size are written to the debug log verbatim.
const MAX_LOGGED_BODY: usize = 1024;

/// Per-request span with a trace id, echoed back in `x-trace-id`.
///
/// A valid UUID supplied by the caller is reused; otherwise a new one is
/// generated.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");

        let (mut parts, body) = req.into_parts();
        let body = log_json_body("request", &parts.headers, body).await;
        if let Some(value) = &trace_header {
            parts.headers.insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(Request::from_parts(parts, body)).await;

        let (mut parts, body) = response.into_parts();
        let body = log_json_body("response", &parts.headers, body).await;
        if let Some(value) = trace_header {
            parts.headers.insert(X_TRACE_ID, value);
        }

        info!(
            status = parts.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );

        Response::from_parts(parts, body)
    }
    .instrument(span)
    .await
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

/// Buffer and log small JSON bodies; everything else (multipart uploads in
/// particular) passes through untouched.
async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    if !is_json(headers) {
        return body;
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    if bytes.len() <= MAX_LOGGED_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            debug!("{direction} body: {text}");
        }
    } else {
        debug!("{direction} body: [skipped, {} bytes]", bytes.len());
    }

    Body::from(bytes)
}
