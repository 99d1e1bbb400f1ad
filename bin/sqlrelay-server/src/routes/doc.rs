use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{health, query, schemas, training};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "sqlrelay-server",
    description = "Natural-language to SQL relay",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(schemas::SchemaApi::openapi());
    root.merge(query::QueryApi::openapi());
    root.merge(training::TrainingApi::openapi());
    root
}

/// Serves the OpenAPI document at `/api-docs/openapi.json`.
pub fn router() -> Router<Arc<AppState>> {
    let doc = get_docs();
    Router::new().route("/api-docs/openapi.json", get(move || async move { Json(doc) }))
}
