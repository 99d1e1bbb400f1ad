//! sqlrelay-core: the domain half of the SQL relay.
//!
//! The server binary only parses HTTP and maps errors; everything that decides
//! *what* is sent upstream and *what* is kept on disk lives here:
//!
//! - [`schema`]: uploaded schema text, keyed by file name.
//! - [`prompt`]: builds the ordered conversation sent to the model.
//! - [`completion`]: the chat-completion HTTP client and response validation.
//! - [`training`]: date-partitioned JSONL log of finished exchanges.
//! - [`service`]: ties the four together for a single query generation.

pub mod completion;
pub mod error;
pub mod prompt;
pub mod schema;
pub mod service;
pub mod training;

pub use completion::{CompletionBackend, CompletionConfig, OpenRouterClient};
pub use error::{RelayError, Result};
pub use prompt::{Conversation, Message, PromptComposer, Role};
pub use schema::{FileSchemaStore, MemorySchemaStore, SchemaEntry, SchemaStore};
pub use service::{GenerateRequest, GeneratedQuery, QueryService};
pub use training::{TrainingLog, TrainingRecord};
