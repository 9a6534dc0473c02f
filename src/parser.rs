// 🏗️ Parser - Yape notification text → ParsedTransaction
//
// Pipeline:
//   normalize_message ─┬─ extract_counterparty ─ names::format_name
//                      │
//   raw message ───────┼─ extract_amount
//                      └─ CategoryClassifier::classify
//                                  │
//                         transaction::build_record
//
// Every stage is total: no match degrades to a documented default.

use crate::names::format_name;
use crate::rules::CategoryClassifier;
use crate::transaction::{
    build_record, Extraction, ParsedTransaction, DEFAULT_AMOUNT, UNKNOWN_COUNTERPARTY,
};
use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// REGEXES
// ============================================================================

fn brand_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^yape!\s*").expect("invalid brand prefix regex"))
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"S/\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("invalid amount regex"))
}

// ============================================================================
// MESSAGE NORMALIZER
// ============================================================================

/// Strip a leading "Yape!" marker (case-insensitive, start of string only).
/// Anything else is returned unchanged.
pub fn normalize_message(message: &str) -> &str {
    match brand_prefix_re().find(message) {
        Some(m) => &message[m.end()..],
        None => message,
    }
}

// ============================================================================
// AMOUNT EXTRACTOR
// ============================================================================

/// First "S/ 1,234.50" figure in the message, commas removed.
/// ASCII digits only, so the result always reads as a plain decimal.
///
/// # Examples:
/// ```
/// use yape_listener::parser::extract_amount;
///
/// assert_eq!(extract_amount("te envió un pago de S/ 1,234.00"), "1234.00");
/// assert_eq!(extract_amount("sin monto"), "0.00");
/// ```
pub fn extract_amount(message: &str) -> String {
    amount_re()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_else(|| DEFAULT_AMOUNT.to_string())
}

// ============================================================================
// COUNTERPARTY EXTRACTOR
// ============================================================================

/// One entry of the counterparty pattern table.
/// The `name` capture group holds the raw name span.
#[derive(Debug)]
pub struct CounterpartyPattern {
    pub id: &'static str,
    pub regex: Regex,
}

impl CounterpartyPattern {
    fn new(id: &'static str, pattern: &str) -> Self {
        CounterpartyPattern {
            id,
            regex: Regex::new(pattern).expect("invalid counterparty regex"),
        }
    }

    /// Raw name span if the pattern matches
    pub fn capture<'a>(&self, message: &'a str) -> Option<&'a str> {
        self.regex
            .captures(message)
            .and_then(|caps| caps.name("name"))
            .map(|m| m.as_str())
    }
}

/// Ordered pattern table; first match wins.
///
/// 1. "JUAN PEREZ te envió un pago..."       (name before the verb)
/// 2. "Enviaste a MARIA GARCIA por S/ 50"   (name between verb and amount)
/// 3. "Recibiste de J. LOPEZ por S/ 20"     (name up to amount or end)
///
/// Name spans may cross line breaks. Pattern 3 takes whatever follows the
/// verb, so "Recibiste S/ 50 de Juan" yields the span "S/ 50 de Juan".
pub fn counterparty_patterns() -> &'static [CounterpartyPattern] {
    static PATTERNS: OnceLock<Vec<CounterpartyPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            CounterpartyPattern::new(
                "sent_to_you",
                r"(?is)^\s*(?P<name>.+?)\s+te\s+envi(?:aste|[oó])",
            ),
            CounterpartyPattern::new(
                "you_sent_or_paid",
                r"(?is)(?:enviaste|pagaste)\s+(?:a\s+)?(?P<name>.+?)\s+por\s+S/",
            ),
            CounterpartyPattern::new(
                "you_received",
                r"(?is)recibiste\s+(?:de\s+)?(?P<name>.+?)(?:\s+por\s+S/|\s*$)",
            ),
        ]
    })
}

/// Raw name span and the id of the pattern that produced it
pub fn find_name_span(normalized: &str) -> Option<(&'static str, &str)> {
    counterparty_patterns()
        .iter()
        .find_map(|pattern| pattern.capture(normalized).map(|span| (pattern.id, span)))
}

/// Counterparty name from a normalized message, or "Desconocido"
pub fn extract_counterparty(normalized: &str) -> String {
    match find_name_span(normalized) {
        Some((_, span)) => format_name(span),
        None => UNKNOWN_COUNTERPARTY.to_string(),
    }
}

// ============================================================================
// TRANSACTION PARSER
// ============================================================================

/// TransactionParser - Runs the extraction pipeline with a given rule set
#[derive(Debug, Clone, Default)]
pub struct TransactionParser {
    classifier: CategoryClassifier,
}

impl TransactionParser {
    /// Parser with the built-in Yape category rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with custom category rules
    pub fn with_classifier(classifier: CategoryClassifier) -> Self {
        TransactionParser { classifier }
    }

    /// Amount, counterparty and category. Pure function of `raw_message`.
    pub fn extract(&self, raw_message: &str) -> Extraction {
        let normalized = normalize_message(raw_message);

        Extraction {
            amount: extract_amount(raw_message),
            counterparty: extract_counterparty(normalized),
            category: self.classifier.category_of(raw_message),
        }
    }

    /// Full record: extraction plus caller metadata
    pub fn parse(
        &self,
        raw_message: &str,
        id: &str,
        timestamp: i64,
        device_id: &str,
    ) -> ParsedTransaction {
        build_record(self.extract(raw_message), id, timestamp, device_id, raw_message)
    }
}

fn default_parser() -> &'static TransactionParser {
    static PARSER: OnceLock<TransactionParser> = OnceLock::new();
    PARSER.get_or_init(TransactionParser::new)
}

/// Parse a message with the built-in rules
///
/// # Example:
/// ```
/// use yape_listener::{parse, Category};
///
/// let tx = parse("Yape! Juan Perez te envió un pago de S/ 150.50", "id-1", 0, "dev-1");
/// assert_eq!(tx.amount, "150.50");
/// assert_eq!(tx.counterparty, "Juan Perez");
/// assert_eq!(tx.category, Category::Income);
/// ```
pub fn parse(raw_message: &str, id: &str, timestamp: i64, device_id: &str) -> ParsedTransaction {
    default_parser().parse(raw_message, id, timestamp, device_id)
}

/// Extraction fields only, with the built-in rules
pub fn extract(raw_message: &str) -> Extraction {
    default_parser().extract(raw_message)
}

// ============================================================================
// TESTS
// ============================================================================
