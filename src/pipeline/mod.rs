//! Per-message processing pipeline.
//!
//! Every fetched message flows through:
//! 1. `content::extract_text()`: content tree → one plain-text body
//! 2. `TransactionRules::classify()`: keyword match, no I/O
//! 3. `TransactionRules::parse()`: ordered per-field extraction (transactions only)
//! 4. `MessageSink::emit()`: results go to logs/telemetry, never back to the webhook caller

pub mod content;
pub mod processor;
pub mod rules;
pub mod types;

pub use processor::{LogSink, MessageProcessor};
pub use rules::TransactionRules;
pub use types::{MessageKind, MessageSink, ProcessedMessage, TransactionField, TransactionRecord};
