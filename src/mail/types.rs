//! Shared mail types: message identifiers, content tree, raw messages.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ─────────────────────────────────────────────────────

/// Backend-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── Wire numbers ────────────────────────────────────────────────────

/// A numeric value that may arrive as a JSON number or a numeric string.
///
/// Normalized to `u64` at the boundary; nothing downstream sees this type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(serde_json::Number),
    Text(String),
}

impl WireNumber {
    /// Normalize to an unsigned integer.
    pub fn to_u64(&self) -> Result<u64, String> {
        match self {
            Self::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Ok(v);
                }
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                        Ok(f as u64)
                    }
                    _ => Err(format!("{n} is not an unsigned integer")),
                }
            }
            Self::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("'{s}': {e}")),
        }
    }
}

// ── Content tree ────────────────────────────────────────────────────

/// Media subtype of a content node, as far as text extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSubtype {
    Plain,
    Rich,
    Other,
}

impl MediaSubtype {
    /// Classify a MIME type, ignoring case and parameters.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("text/plain") {
            Self::Plain
        } else if essence.eq_ignore_ascii_case("text/html") {
            Self::Rich
        } else {
            Self::Other
        }
    }
}

/// One node of a message's possibly-multipart content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentNode {
    /// MIME type as reported by the backend (e.g. `text/plain`, `multipart/alternative`).
    pub mime_type: String,
    /// Inline content, base64url-encoded as delivered by the backend.
    pub data: Option<String>,
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Leaf node carrying already-encoded data.
    pub fn leaf(mime_type: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Some(encoded.into()),
            children: Vec::new(),
        }
    }

    /// Leaf node from plain text, encoding it the way the backend does.
    pub fn text(mime_type: impl Into<String>, text: &str) -> Self {
        use base64::Engine;
        Self::leaf(
            mime_type,
            base64::engine::general_purpose::URL_SAFE.encode(text.as_bytes()),
        )
    }

    /// Composite node.
    pub fn multipart(mime_type: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: None,
            children,
        }
    }

    pub fn subtype(&self) -> MediaSubtype {
        MediaSubtype::from_mime(&self.mime_type)
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Header map. Names are case-sensitive; the first occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the name is already present.
    pub fn insert_first(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Header value, or empty string when absent.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert_first(name, value);
        }
        headers
    }
}

/// A fully fetched message, before extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub id: MessageId,
    pub headers: Headers,
    pub content: ContentNode,
    /// Short provider-supplied preview.
    pub snippet: String,
}

impl RawMessage {
    pub fn subject(&self) -> &str {
        self.headers.get_or_empty("Subject")
    }

    pub fn from(&self) -> &str {
        self.headers.get_or_empty("From")
    }

    pub fn date(&self) -> &str {
        self.headers.get_or_empty("Date")
    }
}

/// Ordered message identifiers added between two cursor positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDiff {
    pub ids: Vec<MessageId>,
    /// The backend had more history than was collected.
    pub truncated: bool,
}

impl MessageDiff {
    pub fn new(ids: Vec<MessageId>) -> Self {
        Self {
            ids,
            truncated: false,
        }
    }
}

/// Result of starting a mailbox watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchResponse {
    /// New baseline cursor.
    pub history_id: u64,
    /// Expiration, milliseconds since the Unix epoch.
    pub expiration_ms: i64,
}

impl WatchResponse {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expiration_ms).single()
    }
}

/// Message identifiers in a time window, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageListing {
    pub ids: Vec<MessageId>,
    pub result_size_estimate: Option<u64>,
}

impl MessageListing {
    /// Backend estimate when positive, else the number of listed ids.
    pub fn count(&self) -> u64 {
        match self.result_size_estimate {
            Some(estimate) if estimate > 0 => estimate,
            _ => self.ids.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_number_accepts_number_and_string() {
        let n: WireNumber = serde_json::from_str("12345").unwrap();
        assert_eq!(n.to_u64(), Ok(12345));
        let s: WireNumber = serde_json::from_str("\"12345\"").unwrap();
        assert_eq!(s.to_u64(), Ok(12345));
        let f: WireNumber = serde_json::from_str("105.0").unwrap();
        assert_eq!(f.to_u64(), Ok(105));
    }

    #[test]
    fn wire_number_rejects_non_integers() {
        for raw in ["-1", "1.5", "\"abc\"", "\"-3\"", "\"\""] {
            let n: WireNumber = serde_json::from_str(raw).unwrap();
            assert!(n.to_u64().is_err(), "{raw} should be rejected");
        }
        assert!(serde_json::from_str::<WireNumber>("true").is_err());
        assert!(serde_json::from_str::<WireNumber>("null").is_err());
        assert!(serde_json::from_str::<WireNumber>("{}").is_err());
    }

    #[test]
    fn media_subtype_ignores_case_and_params() {
        assert_eq!(MediaSubtype::from_mime("text/plain"), MediaSubtype::Plain);
        assert_eq!(
            MediaSubtype::from_mime("Text/Plain; charset=\"UTF-8\""),
            MediaSubtype::Plain
        );
        assert_eq!(MediaSubtype::from_mime("text/html"), MediaSubtype::Rich);
        assert_eq!(
            MediaSubtype::from_mime("multipart/alternative"),
            MediaSubtype::Other
        );
    }

    #[test]
    fn headers_first_occurrence_wins() {
        let headers: Headers = [("Subject", "first"), ("Subject", "second"), ("subject", "lower")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("Subject"), Some("first"));
        assert_eq!(headers.get("subject"), Some("lower"));
        assert_eq!(headers.get_or_empty("From"), "");
        let expected: Headers = [("Subject", "first"), ("subject", "lower")].into_iter().collect();
        assert_eq!(headers, expected);
    }

    #[test]
    fn listing_count_prefers_positive_estimate() {
        let listing = MessageListing {
            ids: vec!["a".into(), "b".into()],
            result_size_estimate: Some(41),
        };
        assert_eq!(listing.count(), 41);
        let listing = MessageListing {
            ids: vec!["a".into(), "b".into()],
            result_size_estimate: Some(0),
        };
        assert_eq!(listing.count(), 2);
    }

    #[test]
    fn watch_expiration_converts() {
        let watch = WatchResponse {
            history_id: 9,
            expiration_ms: 1_700_000_000_000,
        };
        assert_eq!(watch.expires_at().unwrap().timestamp(), 1_700_000_000);
    }
}
