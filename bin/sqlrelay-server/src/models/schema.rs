use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart form accepted by `POST /upload-schema`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadSchemaForm {
    /// Plain-text (`.txt`) schema file.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadSchemaResponse {
    pub message: String,
    /// All stored schema names after the upload.
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchemaListResponse {
    pub schemas: Vec<String>,
    pub count: usize,
}
