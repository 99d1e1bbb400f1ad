//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `SQLRELAY_ENABLE_API_DOCS=false`)
//! - Health route
//! - Schema upload / listing, query generation and training-data routes

pub mod doc;
mod health;
mod query;
mod schemas;
mod training;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(schemas::router(&state))
        .merge(query::router())
        .merge(training::router());

    if state.config.enable_api_docs {
        app = app.merge(doc::router());
    }

    app
        // Later layers wrap earlier ones, so tracing sees CORS preflights too.
        .layer(cors::cors_layer(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
