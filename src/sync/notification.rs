//! Push notification decoding.
//!
//! Wire envelope:
//! `{ "message": { "data": <base64>, "messageId": <string> }, "subscription": <string> }`
//! where `data` decodes to `{ "emailAddress": <string>, "historyId": <number | numeric string> }`.
//! The sequence is normalized to `u64` here; nothing downstream sees the wire shape.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;

use crate::error::DecodeError;
use crate::mail::WireNumber;

/// URL-safe fallback, padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Outer push envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A decoded "something changed" signal for one mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNotification {
    /// Mailbox address; the account identity.
    pub account: String,
    /// Reported history sequence.
    pub sequence: u64,
    /// Transport message id, for log correlation.
    pub message_id: Option<String>,
    pub subscription: Option<String>,
}

impl InboundNotification {
    pub fn new(account: impl Into<String>, sequence: u64) -> Self {
        Self {
            account: account.into(),
            sequence,
            message_id: None,
            subscription: None,
        }
    }
}

/// Decode a raw request body into a notification.
pub fn decode_body(body: &[u8]) -> Result<InboundNotification, DecodeError> {
    let envelope: PushEnvelope =
        serde_json::from_slice(body).map_err(|e| DecodeError::Envelope(e.to_string()))?;
    decode_envelope(envelope)
}

/// Decode an already-parsed envelope.
pub fn decode_envelope(envelope: PushEnvelope) -> Result<InboundNotification, DecodeError> {
    let data = decode_data(&envelope.message.data)?;
    let (account, sequence) = decode_payload(&data)?;

    Ok(InboundNotification {
        account,
        sequence,
        message_id: envelope.message.message_id,
        subscription: envelope.subscription,
    })
}

/// Standard base64 first, URL-safe as fallback.
fn decode_data(data: &str) -> Result<Vec<u8>, DecodeError> {
    let data = data.trim();
    STANDARD
        .decode(data)
        .or_else(|_| URL_SAFE_LENIENT.decode(data))
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

fn decode_payload(data: &[u8]) -> Result<(String, u64), DecodeError> {
    let payload: serde_json::Value =
        serde_json::from_slice(data).map_err(|e| DecodeError::Payload(e.to_string()))?;

    let account = payload
        .get("emailAddress")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingAddress)?
        .to_string();

    let raw_sequence = payload
        .get("historyId")
        .cloned()
        .ok_or_else(|| DecodeError::HistoryId("missing".into()))?;
    let sequence = serde_json::from_value::<WireNumber>(raw_sequence)
        .map_err(|_| DecodeError::HistoryId("expected a number or numeric string".into()))?
        .to_u64()
        .map_err(DecodeError::HistoryId)?;

    Ok((account, sequence))
}
