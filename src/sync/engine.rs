//! Sync engine: the entry point behind the push webhook and the two
//! mailbox operations.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{Credential, CredentialProvider};
use crate::config::SyncConfig;
use crate::error::{BackendError, SyncError};
use crate::mail::retry::with_retry;
use crate::mail::{MailBackend, MessageId};
use crate::pipeline::content::extract_text;
use crate::pipeline::{MessageProcessor, MessageSink};
use crate::sync::actor::AccountDispatcher;
use crate::sync::cycle::{CycleRunner, ProcessingSummary};
use crate::sync::notification::{InboundNotification, decode_body};

/// Response of a successful watch start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchStarted {
    pub status: &'static str,
    pub history_id: u64,
    /// Milliseconds since the Unix epoch.
    pub expiration: i64,
}

/// Rolling-window mailbox summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxSummary {
    pub user_email: String,
    /// Messages in the configured `summary_window_days` window. The wire key
    /// is fixed at `count_last_30_days` whatever the window is.
    #[serde(rename = "count_last_30_days")]
    pub count_in_window: u64,
    pub latest_email: Option<LatestEmail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestEmail {
    pub id: MessageId,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
    pub body: String,
}

/// Ties credential lookup, the per-account actors and the mail backend
/// together.
pub struct SyncEngine {
    config: SyncConfig,
    credentials: Arc<dyn CredentialProvider>,
    backend: Arc<dyn MailBackend>,
    dispatcher: AccountDispatcher,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
        backend: Arc<dyn MailBackend>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self::with_processor(config, credentials, backend, MessageProcessor::default(), sink)
    }

    pub fn with_processor(
        config: SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
        backend: Arc<dyn MailBackend>,
        processor: MessageProcessor,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let runner = Arc::new(CycleRunner::new(
            backend.clone(),
            processor,
            sink,
            config.clone(),
        ));
        Self {
            config,
            credentials,
            backend,
            dispatcher: AccountDispatcher::new(runner),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Decode a raw push body and handle it.
    pub async fn handle_push(&self, body: &[u8]) -> Result<ProcessingSummary, SyncError> {
        let notification = decode_body(body).inspect_err(|e| {
            warn!(error = %e, "Rejected push notification");
        })?;
        self.handle(notification).await
    }

    /// Handle one decoded notification.
    pub async fn handle(
        &self,
        notification: InboundNotification,
    ) -> Result<ProcessingSummary, SyncError> {
        info!(
            account = %notification.account,
            sequence = notification.sequence,
            message_id = notification.message_id.as_deref().unwrap_or(""),
            "Push notification received"
        );
        let credential = self.credential(&notification.account).await?;
        self.dispatcher
            .notify(&notification.account, credential, notification.sequence)
            .await
    }

    /// Start (or renew) the mailbox watch and rebase the account's cursor.
    pub async fn start_watch(&self, account: &str) -> Result<WatchStarted, SyncError> {
        let credential = self.credential(account).await?;
        let response = with_retry(
            &self.config.retry,
            self.config.call_timeout,
            "start watch",
            || {
                self.backend.watch(
                    &credential,
                    account,
                    &self.config.topic_name,
                    &self.config.watch_labels,
                )
            },
        )
        .await
        .map_err(|e| backend_failure(account, e))?;

        let cursor = self.dispatcher.rebase(account, response.history_id).await?;
        info!(
            account = %account,
            topic = %self.config.topic_name,
            history_id = response.history_id,
            cursor,
            expires_at = ?response.expires_at(),
            "Watch started"
        );

        Ok(WatchStarted {
            status: "watch_started",
            history_id: response.history_id,
            expiration: response.expiration_ms,
        })
    }

    /// Count and latest message over the configured rolling window. Read-only.
    pub async fn summarize(&self, account: &str) -> Result<MailboxSummary, SyncError> {
        let credential = self.credential(account).await?;
        let listing = with_retry(
            &self.config.retry,
            self.config.call_timeout,
            "list recent",
            || {
                self.backend.list_recent(
                    &credential,
                    account,
                    self.config.summary_window_days,
                    self.config.summary_max_results,
                )
            },
        )
        .await
        .map_err(|e| backend_failure(account, e))?;

        let latest_email = match listing.ids.first() {
            Some(id) => Some(self.latest_email(account, &credential, id).await?),
            None => None,
        };

        let summary = MailboxSummary {
            user_email: account.to_string(),
            count_in_window: listing.count(),
            latest_email,
        };
        info!(
            account = %account,
            window_days = self.config.summary_window_days,
            count = summary.count_in_window,
            "Mailbox summary"
        );
        if let Some(latest) = &summary.latest_email {
            info!(subject = %latest.subject, from = %latest.from, "Latest email");
        }
        Ok(summary)
    }

    /// Stored cursor for an account.
    pub async fn cursor(&self, account: &str) -> Result<Option<u64>, SyncError> {
        self.dispatcher.cursor(account).await
    }

    async fn latest_email(
        &self,
        account: &str,
        credential: &Credential,
        id: &MessageId,
    ) -> Result<LatestEmail, SyncError> {
        let raw = with_retry(
            &self.config.retry,
            self.config.call_timeout,
            "fetch latest",
            || self.backend.fetch_message(credential, account, id),
        )
        .await
        .map_err(|e| backend_failure(account, e))?;

        Ok(LatestEmail {
            id: raw.id.clone(),
            subject: raw.subject().to_string(),
            from: raw.from().to_string(),
            date: raw.date().to_string(),
            body: extract_text(&raw.content),
            snippet: raw.snippet,
        })
    }

    async fn credential(&self, account: &str) -> Result<Credential, SyncError> {
        self.credentials.get_credential(account).await.ok_or_else(|| {
            warn!(account = %account, "No credential bound");
            SyncError::Unauthenticated {
                account: account.to_string(),
            }
        })
    }
}

fn backend_failure(account: &str, error: BackendError) -> SyncError {
    match error {
        BackendError::Unauthorized => SyncError::Unauthenticated {
            account: account.to_string(),
        },
        other => SyncError::Unavailable(other),
    }
}
