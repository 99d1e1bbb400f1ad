use serde::{Deserialize, Serialize};
use sqlrelay_core::{Conversation, GeneratedQuery};
use utoipa::ToSchema;

/// Response body for `POST /generate-query`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateQueryResponse {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// The model's reply.
    pub response: String,
    /// System prompt, history, question and reply, in order.
    pub full_conversation: Conversation,
    /// ISO-8601 UTC time the reply was received.
    pub timestamp: String,
}

impl From<GeneratedQuery> for GenerateQueryResponse {
    fn from(q: GeneratedQuery) -> Self {
        Self {
            success: true,
            response: q.response,
            full_conversation: q.full_conversation,
            timestamp: q.timestamp,
        }
    }
}
