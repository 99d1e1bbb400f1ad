//! Schema upload and listing.
//!
//! Uploaded files are validated (name, extension, UTF-8) in the core before
//! they reach the store; the handler only pulls the `file` field out of the
//! multipart body and enforces the size limit while streaming it.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlrelay_core::schema::{decode_upload, validate_upload_name};
use sqlrelay_core::{RelayError, SchemaEntry};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::models::schema::{SchemaListResponse, UploadSchemaForm, UploadSchemaResponse};
use crate::state::AppState;

/// Slack on top of the file limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(upload_schema, list_schemas, get_schema),
    components(schemas(UploadSchemaForm, UploadSchemaResponse, SchemaListResponse, SchemaEntry))
)]
pub struct SchemaApi;

/// Register schema routes.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let body_limit = state.config.max_upload_size_bytes() + MULTIPART_OVERHEAD;
    Router::new()
        .route(
            "/upload-schema",
            post(upload_schema).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/get-schemas", get(list_schemas))
        .route("/get-schemas/{name}", get(get_schema))
}

/// Upload a schema file (`POST /upload-schema`).
///
/// Re-uploading a file with the same name replaces the stored content.
#[utoipa::path(
    post,
    path = "/upload-schema",
    tag = "schemas",
    request_body(content = UploadSchemaForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Schema stored", body = UploadSchemaResponse),
        (status = 400, description = "Missing file, empty name, unsupported type or too large"),
        (status = 500, description = "Schema could not be written"),
    )
)]
pub async fn upload_schema(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadSchemaResponse>, ServerError> {
    let mut multipart = multipart
        .map_err(|e| ServerError::BadRequest(format!("expected a multipart upload: {}", e.body_text())))?;
    let max_bytes = state.config.max_upload_size_bytes();

    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ServerError::BadRequest(format!("failed to read file chunk: {e}")))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > max_bytes {
                return Err(ServerError::BadRequest(format!(
                    "file too large: exceeds maximum of {}MB",
                    state.config.max_upload_size_mb
                )));
            }
        }
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ServerError::BadRequest("no file found in the request".into()))?;
    let name = validate_upload_name(file_name.as_deref())?;
    let content = decode_upload(bytes)?;

    state.schemas.put(&name, &content).await?;
    let schemas = state.schemas.list().await;
    info!(schema = %name, bytes = content.len(), total = schemas.len(), "schema uploaded");

    Ok(Json(UploadSchemaResponse {
        message: format!("schema '{name}' uploaded successfully"),
        schemas,
    }))
}

/// List stored schema names (`GET /get-schemas`).
#[utoipa::path(
    get,
    path = "/get-schemas",
    tag = "schemas",
    responses(
        (status = 200, description = "Stored schema names", body = SchemaListResponse),
    )
)]
pub async fn list_schemas(State(state): State<Arc<AppState>>) -> Json<SchemaListResponse> {
    let schemas = state.schemas.list().await;
    Json(SchemaListResponse {
        count: schemas.len(),
        schemas,
    })
}

/// Fetch one schema's content (`GET /get-schemas/{name}`).
#[utoipa::path(
    get,
    path = "/get-schemas/{name}",
    tag = "schemas",
    params(("name" = String, Path, description = "Schema name as listed by /get-schemas")),
    responses(
        (status = 200, description = "Schema content", body = SchemaEntry),
        (status = 404, description = "Unknown schema"),
    )
)]
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SchemaEntry>, ServerError> {
    let entry = state
        .schemas
        .get(&name)
        .await
        .ok_or(RelayError::SchemaNotFound(name))?;
    Ok(Json(entry))
}
