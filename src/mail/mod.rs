//! Mail backend seams.
//!
//! The sync core talks to the mailbox provider only through these traits:
//! - `HistoryResolver`: cursor delta → ordered message ids
//! - `MessageFetcher`: message id → full `RawMessage`
//! - `MailboxControl`: watch setup and the rolling-window listing
//!
//! `GmailBackend` implements all three over the Gmail REST API.

pub mod gmail;
pub mod retry;
pub mod types;

use async_trait::async_trait;

pub use gmail::GmailBackend;
pub use types::{
    ContentNode, Headers, MediaSubtype, MessageDiff, MessageId, MessageListing, RawMessage,
    WatchResponse, WireNumber,
};

use crate::auth::Credential;
use crate::error::BackendError;

/// Resolves the messages added to a mailbox since a cursor.
#[async_trait]
pub trait HistoryResolver: Send + Sync {
    /// Ids added after `from`, in backend order, bounded above by `until`.
    async fn resolve_diff(
        &self,
        credential: &Credential,
        account: &str,
        from: u64,
        until: u64,
    ) -> Result<MessageDiff, BackendError>;
}

/// Retrieves full message content.
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    async fn fetch_message(
        &self,
        credential: &Credential,
        account: &str,
        id: &MessageId,
    ) -> Result<RawMessage, BackendError>;
}

/// Mailbox-level operations behind the two triggering endpoints.
#[async_trait]
pub trait MailboxControl: Send + Sync {
    /// Start (or renew) push notifications for the mailbox.
    async fn watch(
        &self,
        credential: &Credential,
        account: &str,
        topic_name: &str,
        label_ids: &[String],
    ) -> Result<WatchResponse, BackendError>;

    /// List messages received in the last `window_days` days, newest first.
    async fn list_recent(
        &self,
        credential: &Credential,
        account: &str,
        window_days: u32,
        max_results: u32,
    ) -> Result<MessageListing, BackendError>;
}

/// Everything the sync engine needs from a mail provider.
pub trait MailBackend: HistoryResolver + MessageFetcher + MailboxControl {}

impl<T: HistoryResolver + MessageFetcher + MailboxControl> MailBackend for T {}
