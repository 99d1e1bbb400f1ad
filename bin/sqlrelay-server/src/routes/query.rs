//! Query generation (`POST /generate-query`).

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use sqlrelay_core::{GenerateRequest, Message, Role};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::models::query::GenerateQueryResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate_query),
    components(schemas(GenerateRequest, GenerateQueryResponse, Message, Role))
)]
pub struct QueryApi;

/// Register query-generation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/generate-query", post(generate_query))
}

/// Turn a natural-language question into SQL.
///
/// `history` entries that are not `{role, content}` objects are silently
/// dropped. `schema` names an uploaded schema; unknown names are ignored.
#[utoipa::path(
    post,
    path = "/generate-query",
    tag = "query",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Reply generated", body = GenerateQueryResponse),
        (status = 400, description = "Body is not JSON or message is empty"),
        (status = 500, description = "Completion API returned an empty, malformed, error or choice-less response"),
        (status = 502, description = "Completion API transport failure"),
        (status = 503, description = "Completion API unreachable"),
        (status = 504, description = "Completion API timed out"),
    )
)]
pub async fn generate_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateQueryResponse>, ServerError> {
    let Json(req) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ServerError::BadRequest("request body must be JSON".into())
        }
        other => ServerError::BadRequest(format!("invalid JSON body: {}", other.body_text())),
    })?;

    let generated = state.queries.generate(req).await?;
    Ok(Json(generated.into()))
}
