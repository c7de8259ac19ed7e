//! HTTP surface: push webhook, watch start, window summary, health.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use crate::error::SyncError;
use crate::sync::SyncEngine;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

/// `?userEmail=` query parameter.
#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    #[serde(rename = "userEmail", default)]
    pub user_email: Option<String>,
}

impl AccountQuery {
    fn account(&self) -> Option<&str> {
        self.user_email.as_deref().filter(|s| !s.is_empty())
    }
}

/// Build the router.
pub fn sync_routes(state: AppState) -> Router {
    Router::new()
        .route("/gmail/push", post(gmail_push))
        .route("/watch/start", get(watch_start).post(watch_start))
        .route("/emails/summary", get(email_summary))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-sync"
    }))
}

/// POST /gmail/push
///
/// Acknowledges with `{"status": "ok"}` once the notification has been
/// handled. Per-message failures only show up in logs.
async fn gmail_push(State(state): State<AppState>, body: Bytes) -> Response {
    match state.engine.handle_push(&body).await {
        Ok(_) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET|POST /watch/start?userEmail=
async fn watch_start(State(state): State<AppState>, Query(query): Query<AccountQuery>) -> Response {
    let Some(account) = query.account() else {
        return missing_account();
    };
    match state.engine.start_watch(account).await {
        Ok(started) => Json(started).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /emails/summary?userEmail=
async fn email_summary(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Response {
    let Some(account) = query.account() else {
        return missing_account();
    };
    match state.engine.summarize(account).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(&e),
    }
}

fn missing_account() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": "Missing userEmail parameter"})),
    )
        .into_response()
}

fn error_response(e: &SyncError) -> Response {
    let status = e.status_class();
    warn!(status = status.as_u16(), error = %e, "Request failed");
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}
