//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use sqlrelay_core::{QueryService, SchemaStore, TrainingLog};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Uploaded schemas; the same store the query service reads from.
    pub schemas: Arc<dyn SchemaStore>,
    /// Compose → complete → record pipeline.
    pub queries: QueryService,
}

impl AppState {
    pub fn new(config: Config, queries: QueryService) -> Self {
        Self {
            config: Arc::new(config),
            schemas: Arc::clone(queries.schemas()),
            queries,
        }
    }

    pub fn training(&self) -> &TrainingLog {
        self.queries.training()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}
