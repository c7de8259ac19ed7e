//! In-process fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use inbox_sync::auth::{Credential, TokenStore};
use inbox_sync::config::{AdvancePolicy, RetryConfig, SyncConfig};
use inbox_sync::error::BackendError;
use inbox_sync::mail::{
    ContentNode, HistoryResolver, MailboxControl, MessageDiff, MessageFetcher, MessageId,
    MessageListing, RawMessage, WatchResponse,
};
use inbox_sync::pipeline::{MessageSink, ProcessedMessage};
use inbox_sync::sync::SyncEngine;

pub const ACCOUNT: &str = "alice@example.com";
pub const OTHER_ACCOUNT: &str = "bob@example.com";
pub const TOKEN: &str = "test-token";

/// Mailboxes whose history is a list of `(account, sequence, id)` additions.
#[derive(Default)]
pub struct FakeMailbox {
    history: Mutex<Vec<(String, u64, MessageId)>>,
    messages: Mutex<HashMap<String, RawMessage>>,
    unavailable: Mutex<HashSet<String>>,
    pub fetch_log: Mutex<Vec<String>>,
    pub history_calls: AtomicUsize,
    watch_history_id: AtomicU64,
    fetch_delay: Mutex<Duration>,
    message_delays: Mutex<HashMap<String, Duration>>,
    pub last_window_days: AtomicU32,
}

impl FakeMailbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a message to `ACCOUNT` at history position `sequence`.
    pub fn deliver(&self, sequence: u64, id: &str, subject: &str, body: &str) {
        self.deliver_to(ACCOUNT, sequence, id, subject, body);
    }

    pub fn deliver_to(&self, account: &str, sequence: u64, id: &str, subject: &str, body: &str) {
        let headers = [
            ("Subject", subject),
            ("From", "alerts@bank.example"),
            ("Date", "Tue, 11 Nov 2025 12:39:00 +0530"),
        ]
        .into_iter()
        .collect();
        let raw = RawMessage {
            id: MessageId::new(id),
            headers,
            content: ContentNode::multipart(
                "multipart/alternative",
                vec![
                    ContentNode::text("text/plain", body),
                    ContentNode::text("text/html", &format!("<p>{body}</p>")),
                ],
            ),
            snippet: format!("snippet {id}"),
        };
        self.history
            .lock()
            .unwrap()
            .push((account.to_string(), sequence, MessageId::new(id)));
        self.messages.lock().unwrap().insert(id.to_string(), raw);
    }

    /// Record a history entry for a message that no longer exists.
    pub fn deliver_deleted(&self, sequence: u64, id: &str) {
        self.history
            .lock()
            .unwrap()
            .push((ACCOUNT.to_string(), sequence, MessageId::new(id)));
    }

    pub fn set_unavailable(&self, id: &str, unavailable: bool) {
        let mut set = self.unavailable.lock().unwrap();
        if unavailable {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    pub fn set_watch_history_id(&self, history_id: u64) {
        self.watch_history_id.store(history_id, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    /// Delay fetches of one message only.
    pub fn set_message_delay(&self, id: &str, delay: Duration) {
        self.message_delays
            .lock()
            .unwrap()
            .insert(id.to_string(), delay);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryResolver for FakeMailbox {
    async fn resolve_diff(
        &self,
        _credential: &Credential,
        account: &str,
        from: u64,
        until: u64,
    ) -> Result<MessageDiff, BackendError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let ids = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, sequence, _)| {
                owner == account && *sequence > from && *sequence <= until
            })
            .map(|(_, _, id)| id.clone())
            .collect();
        Ok(MessageDiff::new(ids))
    }
}

#[async_trait]
impl MessageFetcher for FakeMailbox {
    async fn fetch_message(
        &self,
        _credential: &Credential,
        _account: &str,
        id: &MessageId,
    ) -> Result<RawMessage, BackendError> {
        let delay = self
            .message_delays
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or(*self.fetch_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.fetch_log.lock().unwrap().push(id.to_string());

        if self.unavailable.lock().unwrap().contains(id.as_str()) {
            return Err(BackendError::unavailable("503 from fake"));
        }
        self.messages
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                what: format!("message {id}"),
            })
    }
}

#[async_trait]
impl MailboxControl for FakeMailbox {
    async fn watch(
        &self,
        _credential: &Credential,
        _account: &str,
        _topic_name: &str,
        _label_ids: &[String],
    ) -> Result<WatchResponse, BackendError> {
        Ok(WatchResponse {
            history_id: self.watch_history_id.load(Ordering::SeqCst),
            expiration_ms: 1_763_000_000_000,
        })
    }

    async fn list_recent(
        &self,
        _credential: &Credential,
        account: &str,
        window_days: u32,
        max_results: u32,
    ) -> Result<MessageListing, BackendError> {
        self.last_window_days.store(window_days, Ordering::SeqCst);
        let ids = self
            .history
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|(owner, _, _)| owner == account)
            .take(max_results as usize)
            .map(|(_, _, id)| id.clone())
            .collect();
        Ok(MessageListing {
            ids,
            result_size_estimate: None,
        })
    }
}

/// Sink that keeps every processed message.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<ProcessedMessage>>,
    emit_delay: Mutex<Duration>,
}

impl RecordingSink {
    pub fn set_emit_delay(&self, delay: Duration) {
        *self.emit_delay.lock().unwrap() = delay;
    }

    pub fn ids(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.id.to_string())
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn emit(&self, message: &ProcessedMessage) {
        let delay = *self.emit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.messages.lock().unwrap().push(message.clone());
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig {
        call_timeout: Duration::from_secs(1),
        notification_budget: Duration::from_secs(3),
        retry: RetryConfig {
            attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        advance_policy: AdvancePolicy::Settled,
        ..SyncConfig::default()
    }
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub mailbox: Arc<FakeMailbox>,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(config: SyncConfig) -> Harness {
    let mailbox = FakeMailbox::new();
    let sink = Arc::new(RecordingSink::default());
    let tokens = TokenStore::with_tokens([
        (ACCOUNT.to_string(), TOKEN.to_string()),
        (OTHER_ACCOUNT.to_string(), TOKEN.to_string()),
    ]);
    let engine = Arc::new(SyncEngine::new(
        config,
        Arc::new(tokens),
        mailbox.clone(),
        sink.clone(),
    ));
    Harness {
        engine,
        mailbox,
        sink,
    }
}

/// Push envelope as the notification transport would send it.
pub fn push_body(account: &str, history_id: serde_json::Value) -> Vec<u8> {
    let payload = serde_json::json!({ "emailAddress": account, "historyId": history_id });
    serde_json::json!({
        "message": {
            "data": STANDARD.encode(payload.to_string()),
            "messageId": "pubsub-1"
        },
        "subscription": "projects/test/subscriptions/gmail-push"
    })
    .to_string()
    .into_bytes()
}
