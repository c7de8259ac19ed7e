//! Transaction rule table: keyword classification and ordered field extraction.
//!
//! Classification is a case-insensitive keyword match over `subject + " " + body`.
//! Parsing walks an ordered list of `(pattern, field, transform)` rules; for each
//! field the first rule that produces a non-empty value wins. Fields are
//! extracted independently of each other and of classification.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{TransactionField, TransactionRecord};

/// Post-capture cleanup applied by a field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Trim surrounding whitespace.
    Trim,
    /// Trim, then strip a trailing legal-entity suffix (Limited, Ltd, Inc, Corp...).
    StripCorporateSuffix,
}

/// A keyword pattern that marks a message as a card transaction.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    /// Human-readable pattern description.
    pub pattern: String,
    pub regex: Regex,
}

/// One extraction rule. Capture group 1 holds the value.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: TransactionField,
    pub regex: Regex,
    pub transform: Transform,
}

impl FieldRule {
    /// Apply this rule to `text`. `None` if no match or the cleaned value is empty.
    pub fn apply(&self, text: &str, suffix: &Regex) -> Option<String> {
        let captured = self.regex.captures(text)?.get(1)?.as_str().trim();
        let value = match self.transform {
            Transform::Trim => captured.to_string(),
            Transform::StripCorporateSuffix => suffix.replace(captured, "").trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Keyword classifier plus ordered field extraction rules.
pub struct TransactionRules {
    keywords: Vec<KeywordRule>,
    fields: Vec<FieldRule>,
    corporate_suffix: Regex,
}

impl TransactionRules {
    /// Card-alert keywords and the extraction table, most specific rules first.
    pub fn default_rules() -> Self {
        let keywords = [
            "credit card",
            r"debit.*card",
            r"card.*ending",
            r"card.*\*\*",
            r"debited.*card",
            r"transaction.*card",
        ]
        .into_iter()
        .map(|pattern| KeywordRule {
            pattern: pattern.to_string(),
            regex: Regex::new(&format!("(?i){pattern}")).unwrap(),
        })
        .collect();

        use TransactionField::*;
        let fields = vec![
            // "Rs.424.00", "₹424.00", "$424.00", "INR 424.00"
            FieldRule {
                field: Amount,
                regex: Regex::new(r"(?i)(?:Rs\.|₹|INR|USD|\$)\s*([\d,]+\.?\d*)").unwrap(),
                transform: Transform::Trim,
            },
            // "ending 1234", "card ending in 1234"
            FieldRule {
                field: CardLast4,
                regex: Regex::new(r"(?i)(?:ending|ending in|card ending)\s+(\d{4})").unwrap(),
                transform: Transform::Trim,
            },
            // "**1234"
            FieldRule {
                field: CardLast4,
                regex: Regex::new(r"(?i)\*\*(\d{4})").unwrap(),
                transform: Transform::Trim,
            },
            // "card 1234"
            FieldRule {
                field: CardLast4,
                regex: Regex::new(r"(?i)card\s+(\d{4})").unwrap(),
                transform: Transform::Trim,
            },
            // "towards Swiggy Limited on", "at Amazon."
            FieldRule {
                field: Merchant,
                regex: Regex::new(
                    r"(?i)(?:towards|at|from|with)\s+([A-Za-z][A-Za-z\s&]+?)(?:\s+on|\s+at|\.|$)",
                )
                .unwrap(),
                transform: Transform::StripCorporateSuffix,
            },
            // "Merchant: Swiggy"
            FieldRule {
                field: Merchant,
                regex: Regex::new(
                    r"(?i)(?:merchant|vendor):\s*([A-Za-z][A-Za-z\s&]+?)(?:\s+on|\s+at|\.|$)",
                )
                .unwrap(),
                transform: Transform::StripCorporateSuffix,
            },
            // "11 Nov, 2025", "3 September 2025"
            FieldRule {
                field: Date,
                regex: Regex::new(
                    r"(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s*,?\s*\d{4})",
                )
                .unwrap(),
                transform: Transform::Trim,
            },
            // "11-11-2025", "11/11/2025"
            FieldRule {
                field: Date,
                regex: Regex::new(r"(\d{1,2}[-/]\d{1,2}[-/]\d{4})").unwrap(),
                transform: Transform::Trim,
            },
            // "2025-11-11"
            FieldRule {
                field: Date,
                regex: Regex::new(r"(\d{4}[-/]\d{1,2}[-/]\d{1,2})").unwrap(),
                transform: Transform::Trim,
            },
            // "12:38:53", "12:38 PM", "12:38"
            FieldRule {
                field: Time,
                regex: Regex::new(r"(\d{1,2}:\d{2}(?::\d{2})?(?:\s*(?:AM|PM))?)").unwrap(),
                transform: Transform::Trim,
            },
        ];

        Self {
            keywords,
            fields,
            corporate_suffix: Regex::new(r"(?i)\s+(limited|ltd|inc|corp|corporation)\.?$")
                .unwrap(),
        }
    }

    /// Create an empty rule table (for testing).
    pub fn empty() -> Self {
        Self {
            keywords: Vec::new(),
            fields: Vec::new(),
            corporate_suffix: Regex::new(r"(?i)\s+(limited|ltd|inc|corp|corporation)\.?$")
                .unwrap(),
        }
    }

    /// Append a keyword pattern (matched case-insensitively).
    pub fn add_keyword(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.keywords.push(KeywordRule {
            pattern: pattern.into(),
            regex: Regex::new(&format!("(?i){pattern}"))?,
        });
        Ok(())
    }

    /// Append a field rule after the existing ones for that field.
    pub fn add_field_rule(
        &mut self,
        field: TransactionField,
        pattern: &str,
        transform: Transform,
    ) -> Result<(), regex::Error> {
        self.fields.push(FieldRule {
            field,
            regex: Regex::new(pattern)?,
            transform,
        });
        Ok(())
    }

    pub fn keywords(&self) -> &[KeywordRule] {
        &self.keywords
    }

    /// All field rules in evaluation order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Whether the message looks like a card transaction notification.
    pub fn classify(&self, subject: &str, body: &str) -> bool {
        let combined = combine(subject, body);
        match self.keywords.iter().find(|k| k.regex.is_match(&combined)) {
            Some(rule) => {
                debug!(keyword = %rule.pattern, "Message matched transaction keyword");
                true
            }
            None => false,
        }
    }

    /// Extract transaction fields. Missing fields stay `None`.
    pub fn parse(&self, subject: &str, body: &str) -> TransactionRecord {
        let combined = combine(subject, body);
        let mut record = TransactionRecord::default();

        for rule in &self.fields {
            if record.get(rule.field).is_some() {
                continue;
            }
            if let Some(value) = rule.apply(&combined, &self.corporate_suffix) {
                record.set(rule.field, value);
            }
        }

        record
    }
}

fn combine(subject: &str, body: &str) -> String {
    format!("{subject} {body}")
}
