//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use sqlrelay_core::completion::{
    CompletionConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT,
};
use thiserror::Error;

/// Environment variable holding the completion API key.
pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY is not set in the environment")]
    MissingApiKey,
}

/// Runtime configuration for sqlrelay-server.
///
/// Everything except the API key has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Log file mirrored alongside stdout; `None` disables it.
    pub log_file: Option<PathBuf>,

    /// Directory uploaded schema files are written to and loaded from.
    pub schemas_dir: PathBuf,

    /// Directory holding the `training_<YYYYMMDD>.jsonl` files.
    pub training_dir: PathBuf,

    /// Comma-separated CORS origin allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_api_docs: bool,

    /// Largest accepted schema upload, in MiB.
    pub max_upload_size_mb: usize,

    /// Completion API endpoint, credentials and sampling parameters.
    pub completion: CompletionConfig,
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let log_file = env_or("SQLRELAY_LOG_FILE", "app.log");
        let cors = env_or(
            "SQLRELAY_CORS_ORIGINS",
            "http://localhost:3000,http://127.0.0.1:3000",
        );

        let mut completion = CompletionConfig::new(api_key);
        completion.base_url = env_or("SQLRELAY_UPSTREAM_URL", DEFAULT_BASE_URL);
        completion.model = env_or("SQLRELAY_MODEL", DEFAULT_MODEL);
        completion.temperature = parse_or(&lookup, "SQLRELAY_TEMPERATURE", DEFAULT_TEMPERATURE);
        completion.max_tokens = parse_or(&lookup, "SQLRELAY_MAX_TOKENS", DEFAULT_MAX_TOKENS);
        completion.timeout = Duration::from_secs(parse_or(
            &lookup,
            "SQLRELAY_UPSTREAM_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        ));
        completion.referer = non_empty(env_or("SQLRELAY_REFERER", "http://localhost:3000"));
        completion.title = non_empty(env_or("SQLRELAY_TITLE", "SQL Financial Assistant"));

        Ok(Self {
            bind_address: env_or("SQLRELAY_BIND", "0.0.0.0:5000"),
            log_level: env_or("SQLRELAY_LOG", "info"),
            log_json: flag(&lookup, "SQLRELAY_LOG_JSON", false),
            log_file: non_empty(log_file).map(PathBuf::from),
            schemas_dir: env_or("SQLRELAY_SCHEMAS_DIR", "schemas").into(),
            training_dir: env_or("SQLRELAY_TRAINING_DIR", "training_data").into(),
            cors_allowed_origins: non_empty(cors),
            enable_api_docs: flag(&lookup, "SQLRELAY_ENABLE_API_DOCS", true),
            max_upload_size_mb: parse_or(&lookup, "SQLRELAY_MAX_UPLOAD_SIZE_MB", 5),
            completion,
        })
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(default)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
