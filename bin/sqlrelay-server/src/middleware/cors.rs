use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;

/// CORS for the browser front-end: GET/POST/OPTIONS with a JSON content type.
pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let Some(origins_str) = &state.config.cors_allowed_origins else {
        // Wildcard – set SQLRELAY_CORS_ORIGINS to restrict.
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = s, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
