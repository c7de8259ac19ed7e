use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use inbox_sync::auth::TokenStore;
use inbox_sync::config::{ServerConfig, SyncConfig, load_credentials_file};
use inbox_sync::mail::GmailBackend;
use inbox_sync::pipeline::LogSink;
use inbox_sync::routes::{AppState, sync_routes};
use inbox_sync::sync::SyncEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server = ServerConfig::from_env();
    let sync_config = SyncConfig::from_env().context("invalid sync configuration")?;

    // ── Credentials ─────────────────────────────────────────────────────
    let tokens = match &server.credentials_path {
        Some(path) => {
            let tokens = load_credentials_file(Path::new(path))
                .with_context(|| format!("failed to load credentials from {path}"))?;
            let store = TokenStore::with_tokens(tokens);
            tracing::info!(
                accounts = store.account_count().await,
                path = %path,
                "Loaded credentials"
            );
            store
        }
        None => {
            tracing::warn!("INBOX_SYNC_CREDENTIALS not set, every account is unauthenticated");
            TokenStore::new()
        }
    };

    // ── Engine ──────────────────────────────────────────────────────────
    let backend = Arc::new(GmailBackend::new(server.gmail_api_base.clone()));
    let engine = Arc::new(SyncEngine::new(
        sync_config,
        Arc::new(tokens),
        backend,
        Arc::new(LogSink),
    ));

    eprintln!("📬 Inbox Sync v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Push:    http://0.0.0.0:{}/gmail/push", server.port);
    eprintln!("   Watch:   http://0.0.0.0:{}/watch/start?userEmail=", server.port);
    eprintln!("   Summary: http://0.0.0.0:{}/emails/summary?userEmail=", server.port);
    eprintln!("   Topic:   {}\n", engine.config().topic_name);

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = sync_routes(AppState { engine });
    let addr = format!("0.0.0.0:{}", server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
