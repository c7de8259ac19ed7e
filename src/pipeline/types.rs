//! Shared types for the message processing pipeline.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::mail::MessageId;

// ── Transaction record ──────────────────────────────────────────────

/// Fields a transaction rule can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionField {
    Amount,
    CardLast4,
    Merchant,
    Date,
    Time,
}

/// Heuristically extracted card transaction details. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl TransactionRecord {
    pub fn get(&self, field: TransactionField) -> Option<&str> {
        match field {
            TransactionField::Amount => self.amount.as_deref(),
            TransactionField::CardLast4 => self.card_last4.as_deref(),
            TransactionField::Merchant => self.merchant.as_deref(),
            TransactionField::Date => self.date.as_deref(),
            TransactionField::Time => self.time.as_deref(),
        }
    }

    pub fn set(&mut self, field: TransactionField, value: String) {
        let slot = match field {
            TransactionField::Amount => &mut self.amount,
            TransactionField::CardLast4 => &mut self.card_last4,
            TransactionField::Merchant => &mut self.merchant,
            TransactionField::Date => &mut self.date,
            TransactionField::Time => &mut self.time,
        };
        *slot = Some(value);
    }

    /// True when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.card_last4.is_none()
            && self.merchant.is_none()
            && self.date.is_none()
            && self.time.is_none()
    }

    /// Amount as a decimal, with thousands separators removed.
    pub fn amount_decimal(&self) -> Option<Decimal> {
        let raw = self.amount.as_deref()?.replace(',', "");
        Decimal::from_str(raw.trim_end_matches('.')).ok()
    }
}

// ── Processed message ───────────────────────────────────────────────

/// Classification outcome for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    /// Card transaction notification with whatever fields were found.
    Transaction { details: TransactionRecord },
    /// Anything else.
    Informational,
}

impl MessageKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transaction { .. } => "transaction",
            Self::Informational => "informational",
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }
}

/// Result of running one fetched message through extraction and classification.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMessage {
    pub account: String,
    pub id: MessageId,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
    /// Extracted plain-text body; empty when no text part decoded.
    pub body: String,
    pub kind: MessageKind,
    pub processed_at: DateTime<Utc>,
}

// ── Result sink ─────────────────────────────────────────────────────

/// Where processed messages are emitted.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn emit(&self, message: &ProcessedMessage);
}
