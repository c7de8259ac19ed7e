//! Gmail REST backend: history, messages, watch and window listing.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    ContentNode, Headers, MessageDiff, MessageId, MessageListing, RawMessage, WatchResponse,
    WireNumber,
};
use super::{HistoryResolver, MailboxControl, MessageFetcher};
use crate::auth::Credential;
use crate::config::DEFAULT_GMAIL_API_BASE;
use crate::error::BackendError;

/// Page size for history listing.
const HISTORY_PAGE_SIZE: u32 = 100;

/// Pages collected per diff before reporting it truncated.
const MAX_HISTORY_PAGES: usize = 20;

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_MAX_LEN: usize = 200;

/// Gmail API client. Calls address the authenticated user (`me`).
#[derive(Debug, Clone)]
pub struct GmailBackend {
    client: Client,
    base_url: String,
}

impl Default for GmailBackend {
    fn default() -> Self {
        Self::new(DEFAULT_GMAIL_API_BASE)
    }
}

impl GmailBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{}", self.base_url, path)
    }

    /// Send a request and decode a JSON body, mapping HTTP status to `BackendError`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credential: &Credential,
        what: &str,
    ) -> Result<T, BackendError> {
        let response = request
            .bearer_auth(credential.bearer())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| BackendError::unavailable(format!("{what}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::unavailable(format!("{what}: reading body: {e}")))?;

        if let Some(err) = classify_status(status, what, &body) {
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|e| BackendError::unavailable(format!("{what}: invalid response JSON: {e}")))
    }
}

/// Map a non-success status to the backend error taxonomy.
fn classify_status(status: StatusCode, what: &str, body: &str) -> Option<BackendError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => BackendError::NotFound {
            what: what.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        _ => BackendError::unavailable(format!(
            "{what}: status={status} body={}",
            excerpt(body)
        )),
    })
}

fn excerpt(body: &str) -> String {
    let mut out: String = body.chars().take(ERROR_BODY_MAX_LEN).collect();
    if body.chars().count() > ERROR_BODY_MAX_LEN {
        out.push_str("...");
    }
    out
}

#[async_trait]
impl HistoryResolver for GmailBackend {
    async fn resolve_diff(
        &self,
        credential: &Credential,
        account: &str,
        from: u64,
        until: u64,
    ) -> Result<MessageDiff, BackendError> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut page_token: Option<String> = None;
        let mut truncated = false;

        for page in 0.. {
            if page == MAX_HISTORY_PAGES {
                truncated = true;
                break;
            }

            let mut request = self.client.get(self.url("history")).query(&[
                ("startHistoryId", from.to_string()),
                ("historyTypes", "messageAdded".to_string()),
                ("maxResults", HISTORY_PAGE_SIZE.to_string()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let list: HistoryList = self
                .send_json(request, credential, &format!("history since {from}"))
                .await?;

            let records = list.history.unwrap_or_default();
            debug!(account = %account, page, records = records.len(), "Fetched history page");
            let mut past_bound = false;
            for record in records {
                if record_id(&record).is_some_and(|id| id > until) {
                    past_bound = true;
                    break;
                }
                for added in record.messages_added.unwrap_or_default() {
                    if seen.insert(added.message.id.clone()) {
                        ids.push(MessageId::new(added.message.id));
                    }
                }
            }

            match list.next_page_token {
                Some(token) if !past_bound => page_token = Some(token),
                _ => break,
            }
        }

        if truncated {
            warn!(account = %account, collected = ids.len(), "History diff truncated");
        }

        Ok(MessageDiff { ids, truncated })
    }
}

/// Watch expiry as signed epoch milliseconds.
fn expiration_millis(raw: &WireNumber) -> Result<i64, BackendError> {
    let millis = raw
        .to_u64()
        .map_err(|e| BackendError::unavailable(format!("watch: bad expiration {e}")))?;
    i64::try_from(millis).map_err(|_| {
        BackendError::unavailable(format!("watch: expiration {millis} out of range"))
    })
}

fn record_id(record: &HistoryRecord) -> Option<u64> {
    record.id.as_ref().and_then(|id| id.to_u64().ok())
}

#[async_trait]
impl MessageFetcher for GmailBackend {
    async fn fetch_message(
        &self,
        credential: &Credential,
        _account: &str,
        id: &MessageId,
    ) -> Result<RawMessage, BackendError> {
        let request = self
            .client
            .get(self.url(&format!("messages/{}", id.as_str())))
            .query(&[("format", "full")]);
        let message: GmailMessage = self
            .send_json(request, credential, &format!("message {id}"))
            .await?;
        Ok(message.into_raw())
    }
}

#[async_trait]
impl MailboxControl for GmailBackend {
    async fn watch(
        &self,
        credential: &Credential,
        _account: &str,
        topic_name: &str,
        label_ids: &[String],
    ) -> Result<WatchResponse, BackendError> {
        let request = self.client.post(self.url("watch")).json(&serde_json::json!({
            "topicName": topic_name,
            "labelIds": label_ids,
        }));
        let response: GmailWatchResponse = self.send_json(request, credential, "watch").await?;

        let history_id = response
            .history_id
            .to_u64()
            .map_err(|e| BackendError::unavailable(format!("watch: bad historyId {e}")))?;
        let expiration_ms = expiration_millis(&response.expiration)?;

        Ok(WatchResponse {
            history_id,
            expiration_ms,
        })
    }

    async fn list_recent(
        &self,
        credential: &Credential,
        _account: &str,
        window_days: u32,
        max_results: u32,
    ) -> Result<MessageListing, BackendError> {
        let request = self.client.get(self.url("messages")).query(&[
            ("q", format!("newer_than:{window_days}d")),
            ("maxResults", max_results.to_string()),
        ]);
        let list: GmailMessageList = self
            .send_json(request, credential, "message list")
            .await?;

        Ok(MessageListing {
            ids: list
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageId::new(m.id))
                .collect(),
            result_size_estimate: list.result_size_estimate,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryList {
    history: Option<Vec<HistoryRecord>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    id: Option<WireNumber>,
    messages_added: Option<Vec<HistoryMessageAdded>>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessageAdded {
    message: MessageStub,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessageList {
    messages: Option<Vec<MessageStub>>,
    result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailWatchResponse {
    history_id: WireNumber,
    expiration: WireNumber,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GmailMessage {
    id: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    payload: Option<GmailPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GmailPart {
    mime_type: Option<String>,
    headers: Option<Vec<GmailHeader>>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPart>>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

impl GmailMessage {
    fn into_raw(self) -> RawMessage {
        let mut payload = self.payload.unwrap_or_default();
        let headers: Headers = payload
            .headers
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|h| (h.name, h.value))
            .collect();

        RawMessage {
            id: MessageId::new(self.id),
            headers,
            content: payload.into_node(),
            snippet: self.snippet.unwrap_or_default(),
        }
    }
}

impl GmailPart {
    fn into_node(self) -> ContentNode {
        ContentNode {
            mime_type: self.mime_type.unwrap_or_default(),
            data: self
                .body
                .and_then(|b| b.data)
                .filter(|data| !data.is_empty()),
            children: self
                .parts
                .unwrap_or_default()
                .into_iter()
                .map(GmailPart::into_node)
                .collect(),
        }
    }
}
