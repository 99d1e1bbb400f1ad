//! Query generation: compose → complete → record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::completion::CompletionBackend;
use crate::error::Result;
use crate::prompt::{lenient_history, Conversation, Message, PromptComposer};
use crate::schema::SchemaStore;
use crate::training::{TrainingLog, TrainingRecord};

/// Body of a query-generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Natural-language question; must not be blank.
    #[serde(default)]
    pub message: String,
    /// Prior turns. Malformed entries are dropped rather than rejected.
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<Message>,
    /// Name of an uploaded schema to ground the query in.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Result of a successful generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneratedQuery {
    /// The assistant's reply, normally SQL plus a short explanation.
    pub response: String,
    pub full_conversation: Conversation,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct QueryService {
    composer: PromptComposer,
    schemas: Arc<dyn SchemaStore>,
    backend: Arc<dyn CompletionBackend>,
    training: TrainingLog,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("training_dir", &self.training.dir())
            .finish_non_exhaustive()
    }
}

impl QueryService {
    pub fn new(
        composer: PromptComposer,
        schemas: Arc<dyn SchemaStore>,
        backend: Arc<dyn CompletionBackend>,
        training: TrainingLog,
    ) -> Self {
        Self {
            composer,
            schemas,
            backend,
            training,
        }
    }

    pub fn schemas(&self) -> &Arc<dyn SchemaStore> {
        &self.schemas
    }

    pub fn training(&self) -> &TrainingLog {
        &self.training
    }

    /// Generate a reply for `req` and log the exchange.
    ///
    /// The training log is best-effort: a failed append is logged and the
    /// reply is still returned.
    pub async fn generate(&self, req: GenerateRequest) -> Result<GeneratedQuery> {
        let schema_name = req
            .schema
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let schema = match schema_name {
            Some(name) => {
                let entry = self.schemas.get(name).await;
                if entry.is_none() {
                    debug!(schema = name, "requested schema not found; composing without it");
                }
                entry
            }
            None => None,
        };

        let conversation = self
            .composer
            .compose(&req.message, &req.history, schema.as_ref())?;
        info!(
            messages = conversation.len(),
            schema = schema_name.unwrap_or(""),
            "generating query"
        );

        let reply = self.backend.complete(&conversation).await?;
        info!(reply_len = reply.len(), "query generated");

        let record = TrainingRecord::new(
            req.message.trim(),
            schema_name,
            reply.clone(),
            conversation.with_reply(reply.clone()),
        );
        if let Err(e) = self.training.append(&record).await {
            warn!(id = %record.id, error = %e, "failed to write training record");
        }

        Ok(GeneratedQuery {
            response: reply,
            full_conversation: record.full_conversation,
            timestamp: record.timestamp,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
