//! One processing cycle: cursor delta → fetch → extract/classify → emit.
//!
//! A cycle never touches the cursor itself. It returns the position the
//! cursor may advance to, and the account actor applies it only if the
//! cycle finished inside its budget.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::Credential;
use crate::config::{AdvancePolicy, SyncConfig};
use crate::error::{BackendError, SyncError};
use crate::mail::retry::with_retry_until;
use crate::mail::{MailBackend, MessageDiff, MessageId};
use crate::pipeline::{MessageProcessor, MessageSink, ProcessedMessage};
use crate::sync::cursor::Cursor;

/// What one `handle` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub account: String,
    /// Sequence reported by the notification.
    pub reported: u64,
    /// Stored cursor when the cycle started.
    pub previous_cursor: Option<u64>,
    /// Stored cursor after the cycle.
    pub cursor: Option<u64>,
    /// Messages fetched and run through the pipeline.
    pub processed: usize,
    /// Of those, classified as transactions.
    pub transactions: usize,
    /// Ids that no longer resolve.
    pub skipped: usize,
    /// Ids that failed after retries.
    pub failed: usize,
    /// Whether the history window was cut short by the backend.
    pub truncated: bool,
    pub advanced: bool,
}

impl ProcessingSummary {
    fn new(account: &str, reported: u64, previous: Option<u64>) -> Self {
        Self {
            account: account.to_string(),
            reported,
            previous_cursor: previous,
            cursor: previous,
            ..Default::default()
        }
    }
}

/// Result of a cycle, before it is applied to the cursor.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub summary: ProcessingSummary,
    /// Position the cursor may move to, if any.
    pub advance_to: Option<u64>,
}

impl CycleOutcome {
    /// Move `cursor` as far as the cycle allows and finish the summary.
    pub fn apply(self, cursor: &mut Cursor) -> ProcessingSummary {
        let mut summary = self.summary;
        if let Some(to) = self.advance_to {
            summary.advanced = cursor.advance(to);
        }
        summary.cursor = cursor.get();
        summary
    }
}

/// Outcome of fetching and processing one message id.
enum MessageResult {
    Processed(Box<ProcessedMessage>),
    Skipped(MessageId),
    Failed(MessageId, BackendError),
}

/// Dependencies shared by every account's cycles.
pub struct CycleRunner {
    backend: Arc<dyn MailBackend>,
    processor: MessageProcessor,
    sink: Arc<dyn MessageSink>,
    config: SyncConfig,
}

impl CycleRunner {
    pub fn new(
        backend: Arc<dyn MailBackend>,
        processor: MessageProcessor,
        sink: Arc<dyn MessageSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            processor,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one cycle for `account` against the stored cursor.
    ///
    /// Backend calls stop short of `deadline`, so a message that never
    /// answers is recorded as failed instead of consuming the whole budget.
    pub async fn run(
        &self,
        account: &str,
        credential: &Credential,
        stored: Option<u64>,
        reported: u64,
        deadline: Instant,
    ) -> Result<CycleOutcome, SyncError> {
        let mut summary = ProcessingSummary::new(account, reported, stored);

        // No baseline yet: record the reported position without diffing.
        let Some(from) = stored else {
            info!(account = %account, reported, "No stored cursor, recording baseline");
            return Ok(CycleOutcome {
                summary,
                advance_to: Some(reported),
            });
        };

        if reported <= from {
            debug!(account = %account, reported, stored = from, "Stale notification, nothing to do");
            return Ok(CycleOutcome {
                summary,
                advance_to: None,
            });
        }

        let work_deadline = self.work_deadline(deadline);
        let diff = match self
            .resolve(account, credential, from, reported, work_deadline)
            .await
        {
            Ok(diff) => diff,
            Err(BackendError::NotFound { .. }) => {
                warn!(account = %account, from, "History window expired, re-baselining");
                MessageDiff::default()
            }
            Err(BackendError::Unauthorized) => {
                return Err(SyncError::Unauthenticated {
                    account: account.to_string(),
                });
            }
            Err(e) => return Err(SyncError::Unavailable(e)),
        };
        summary.truncated = diff.truncated;

        info!(account = %account, from, reported, messages = diff.ids.len(), "Resolved history diff");

        let concurrency = self.config.fetch_concurrency.max(1);
        let mut results = futures::stream::iter(diff.ids)
            .map(|id| self.fetch_and_process(account, credential, id, work_deadline))
            .buffered(concurrency);

        let mut transient_failures = 0usize;
        while let Some(result) = results.next().await {
            match result {
                MessageResult::Processed(message) => {
                    summary.processed += 1;
                    if message.kind.is_transaction() {
                        summary.transactions += 1;
                    }
                    self.sink.emit(&message).await;
                }
                MessageResult::Skipped(id) => {
                    debug!(account = %account, id = %id, "Message no longer exists, skipping");
                    summary.skipped += 1;
                }
                MessageResult::Failed(id, e) => {
                    warn!(account = %account, id = %id, error = %e, "Message fetch failed");
                    summary.failed += 1;
                    if e.is_transient() {
                        transient_failures += 1;
                    }
                }
            }
        }

        let advance_to = match self.config.advance_policy {
            AdvancePolicy::Settled => Some(reported),
            AdvancePolicy::FullSuccess if transient_failures == 0 => Some(reported),
            AdvancePolicy::FullSuccess => {
                warn!(
                    account = %account,
                    failed = transient_failures,
                    "Holding cursor until failed messages succeed"
                );
                None
            }
        };

        Ok(CycleOutcome {
            summary,
            advance_to,
        })
    }

    /// Backend work ends a tenth of the budget before `deadline`, leaving
    /// room to emit and settle the cursor.
    fn work_deadline(&self, deadline: Instant) -> Instant {
        deadline
            .checked_sub(self.config.notification_budget / 10)
            .unwrap_or(deadline)
    }

    async fn resolve(
        &self,
        account: &str,
        credential: &Credential,
        from: u64,
        until: u64,
        deadline: Instant,
    ) -> Result<MessageDiff, BackendError> {
        with_retry_until(
            &self.config.retry,
            self.config.call_timeout,
            deadline,
            "resolve history",
            || self.backend.resolve_diff(credential, account, from, until),
        )
        .await
    }

    async fn fetch_and_process(
        &self,
        account: &str,
        credential: &Credential,
        id: MessageId,
        deadline: Instant,
    ) -> MessageResult {
        let fetched = with_retry_until(
            &self.config.retry,
            self.config.call_timeout,
            deadline,
            "fetch message",
            || self.backend.fetch_message(credential, account, &id),
        )
        .await;

        match fetched {
            Ok(raw) => MessageResult::Processed(Box::new(self.processor.process(account, &raw))),
            Err(BackendError::NotFound { .. }) => MessageResult::Skipped(id),
            Err(e) => MessageResult::Failed(id, e),
        }
    }
}
