//! Message processor: extraction + classification for one fetched message,
//! and the default tracing sink for results.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::mail::RawMessage;
use crate::pipeline::content::extract_text;
use crate::pipeline::rules::TransactionRules;
use crate::pipeline::types::{MessageKind, MessageSink, ProcessedMessage};

/// Runs the Content Extractor and the transaction rule table over a message.
///
/// Never fails: a message with no decodable text yields an empty body and is
/// classified from its subject alone.
pub struct MessageProcessor {
    rules: TransactionRules,
}

impl Default for MessageProcessor {
    fn default() -> Self {
        Self::new(TransactionRules::default_rules())
    }
}

impl MessageProcessor {
    pub fn new(rules: TransactionRules) -> Self {
        debug!(
            keywords = rules.keywords().len(),
            field_rules = rules.rules().len(),
            "Transaction rules loaded"
        );
        Self { rules }
    }

    /// Process one fetched message for `account`.
    pub fn process(&self, account: &str, raw: &RawMessage) -> ProcessedMessage {
        let body = extract_text(&raw.content);
        if body.is_empty() {
            debug!(id = %raw.id, "No text body extracted");
        }

        let subject = raw.subject();
        let kind = if self.rules.classify(subject, &body) {
            let details = self.rules.parse(subject, &body);
            if details.is_empty() {
                debug!(id = %raw.id, "Transaction classified but no fields extracted");
            }
            MessageKind::Transaction { details }
        } else {
            MessageKind::Informational
        };

        ProcessedMessage {
            account: account.to_string(),
            id: raw.id.clone(),
            subject: subject.to_string(),
            from: raw.from().to_string(),
            date: raw.date().to_string(),
            snippet: raw.snippet.clone(),
            body,
            kind,
            processed_at: Utc::now(),
        }
    }
}

/// Emits one structured log event per processed message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn emit(&self, message: &ProcessedMessage) {
        match &message.kind {
            MessageKind::Transaction { details } => {
                info!(
                    account = %message.account,
                    id = %message.id,
                    kind = message.kind.label(),
                    subject = %message.subject,
                    from = %message.from,
                    date = %message.date,
                    amount = details.amount.as_deref().unwrap_or(""),
                    card_last4 = details.card_last4.as_deref().unwrap_or(""),
                    merchant = details.merchant.as_deref().unwrap_or(""),
                    txn_date = details.date.as_deref().unwrap_or(""),
                    txn_time = details.time.as_deref().unwrap_or(""),
                    "Card transaction detected"
                );
            }
            MessageKind::Informational => {
                info!(
                    account = %message.account,
                    id = %message.id,
                    kind = message.kind.label(),
                    subject = %message.subject,
                    from = %message.from,
                    date = %message.date,
                    snippet = %message.snippet,
                    "Informational email received"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{ContentNode, Headers, MessageId};
    use crate::pipeline::types::TransactionRecord;

    fn raw_message(subject: &str, content: ContentNode) -> RawMessage {
        let headers: Headers = [
            ("Subject", subject),
            ("From", "alerts@bank.example"),
            ("Date", "Tue, 11 Nov 2025 12:39:00 +0530"),
        ]
        .into_iter()
        .collect();
        RawMessage {
            id: MessageId::new("m-1"),
            headers,
            content,
            snippet: "preview".into(),
        }
    }

    #[test]
    fn card_alert_becomes_transaction() {
        let processor = MessageProcessor::default();
        let raw = raw_message(
            "Transaction Alert",
            ContentNode::multipart(
                "multipart/alternative",
                vec![
                    ContentNode::text(
                        "text/plain",
                        "Rs.424.00 debited from your card ending 1234 towards Swiggy Limited on 11 Nov, 2025 at 12:38:53",
                    ),
                    ContentNode::text("text/html", "<p>ignored</p>"),
                ],
            ),
        );

        let processed = processor.process("a@example.com", &raw);
        assert_eq!(processed.account, "a@example.com");
        assert_eq!(processed.subject, "Transaction Alert");
        assert_eq!(processed.from, "alerts@bank.example");
        assert_eq!(
            processed.kind,
            MessageKind::Transaction {
                details: TransactionRecord {
                    amount: Some("424.00".into()),
                    card_last4: Some("1234".into()),
                    merchant: Some("Swiggy".into()),
                    date: Some("11 Nov, 2025".into()),
                    time: Some("12:38:53".into()),
                }
            }
        );
    }

    #[test]
    fn shipping_notice_is_informational() {
        let processor = MessageProcessor::default();
        let raw = raw_message(
            "Order update",
            ContentNode::text("text/plain", "Your package has shipped"),
        );
        let processed = processor.process("a@example.com", &raw);
        assert_eq!(processed.kind, MessageKind::Informational);
        assert_eq!(processed.body, "Your package has shipped");
        assert_eq!(processed.snippet, "preview");
    }

    #[test]
    fn undecodable_body_still_classified_from_subject() {
        let processor = MessageProcessor::default();
        let raw = raw_message(
            "Your credit card statement",
            ContentNode::leaf("text/plain", "%%%"),
        );
        let processed = processor.process("a@example.com", &raw);
        assert_eq!(processed.body, "");
        assert!(processed.kind.is_transaction());
    }

    #[tokio::test]
    async fn log_sink_accepts_both_kinds() {
        let processor = MessageProcessor::default();
        let sink = LogSink;
        for subject in ["Credit card used", "Hello"] {
            let raw = raw_message(subject, ContentNode::text("text/plain", "body"));
            sink.emit(&processor.process("a@example.com", &raw)).await;
        }
    }
}
