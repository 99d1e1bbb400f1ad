//! sqlrelay-server – entry point.
//!
//! Startup order:
//! 1. Load `.env`, then parse configuration from environment variables.
//! 2. Initialise structured tracing (stdout, plus an optional log file).
//! 3. Open the schema store and the training log.
//! 4. Build the completion client and the query service.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlrelay_core::completion::mask_token;
use sqlrelay_core::{FileSchemaStore, OpenRouterClient, PromptComposer, QueryService, TrainingLog};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Keep the guard alive for the whole process so buffered file logs flush.
    let _log_guard = init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "sqlrelay-server starting");
    info!(
        model = %cfg.completion.model,
        upstream = %cfg.completion.base_url,
        api_key = %mask_token(&cfg.completion.api_key),
        "completion API configured"
    );

    // ── 3. Storage ─────────────────────────────────────────────────────────────
    let schemas = FileSchemaStore::open(&cfg.schemas_dir)
        .await
        .with_context(|| format!("failed to open schema directory {}", cfg.schemas_dir.display()))?;
    let training = TrainingLog::new(&cfg.training_dir);
    info!(
        schemas_dir = %cfg.schemas_dir.display(),
        training_dir = %cfg.training_dir.display(),
        "storage ready"
    );

    // ── 4. Query pipeline ──────────────────────────────────────────────────────
    let client = OpenRouterClient::new(cfg.completion.clone())
        .context("failed to build the completion HTTP client")?;
    let queries = QueryService::new(
        PromptComposer::new(),
        Arc::new(schemas),
        Arc::new(client),
        training,
    );

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let addr: SocketAddr = cfg
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{}'", cfg.bind_address))?;
    let state = Arc::new(AppState::new(cfg, queries));
    let app = routes::build(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sqlrelay-server stopped");
    Ok(())
}

/// Install the global subscriber: stdout (pretty or JSON) plus an optional
/// plain-text file mirror.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // RUST_LOG wins over SQLRELAY_LOG; an invalid value falls back to `info`.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: SQLRELAY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = if cfg.log_json {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match cfg.log_file.as_deref().and_then(split_log_path) {
        Some((dir, file_name)) => {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

/// Split `logs/app.log` into `("logs", "app.log")`; a bare name logs to `.`.
fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir, file_name))
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
