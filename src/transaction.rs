// 🧾 Transaction Record - Output of the Yape notification parser
// Category enum, extraction fields and the record builder

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Sentinel used when no counterparty pattern matches
pub const UNKNOWN_COUNTERPARTY: &str = "Desconocido";

/// Amount used when the message carries no `S/` figure
pub const DEFAULT_AMOUNT: &str = "0.00";

/// Display pattern for `formatted_date` (DD/MM/YYYY HH:MM:SS)
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// ============================================================================
// CATEGORY
// ============================================================================

/// Category - Tipo de movimiento inferido del mensaje
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Money received (Recibiste, te envió un pago, te enviaron)
    Income,

    /// Money sent to another person (Enviaste)
    Expense,

    /// Payment to a merchant (Pagaste)
    Payment,

    /// Cash withdrawal (Retiraste)
    Withdrawal,

    /// Nothing recognized
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Income,
        Category::Expense,
        Category::Payment,
        Category::Withdrawal,
        Category::Other,
    ];

    /// Stable code, same spelling as the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Income => "INCOME",
            Category::Expense => "EXPENSE",
            Category::Payment => "PAYMENT",
            Category::Withdrawal => "WITHDRAWAL",
            Category::Other => "OTHER",
        }
    }

    /// Spanish label ("INGRESO", "EGRESO", ...)
    pub fn label_es(&self) -> &'static str {
        match self {
            Category::Income => "INGRESO",
            Category::Expense => "EGRESO",
            Category::Payment => "PAGO",
            Category::Withdrawal => "RETIRO",
            Category::Other => "OTRO",
        }
    }

    /// Parse either the code or the Spanish label, case-insensitive
    pub fn from_code(code: &str) -> Option<Category> {
        let code = code.trim();
        Category::ALL.into_iter().find(|c| {
            c.as_str().eq_ignore_ascii_case(code) || c.label_es().eq_ignore_ascii_case(code)
        })
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extraction - The three fields derived from the message text alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub amount: String,
    pub counterparty: String,
    pub category: Category,
}

impl Default for Extraction {
    fn default() -> Self {
        Extraction {
            amount: DEFAULT_AMOUNT.to_string(),
            counterparty: UNKNOWN_COUNTERPARTY.to_string(),
            category: Category::Other,
        }
    }
}

// ============================================================================
// PARSED TRANSACTION
// ============================================================================

/// ParsedTransaction - Registro final que se entrega al sink
///
/// Built once per notification and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    /// Caller-supplied identifier (random per message)
    pub id: String,

    /// Decimal string without thousands separators ("150.50")
    pub amount: String,

    /// "Given Surname", a single token, or "Desconocido"
    pub counterparty: String,

    pub category: Category,

    /// `timestamp` rendered as DD/MM/YYYY HH:MM:SS in local time
    pub formatted_date: String,

    /// Epoch milliseconds, as posted by the notification
    pub timestamp: i64,

    /// Original message, verbatim
    pub raw_message: String,

    /// Stable per-install identifier
    pub device_id: String,
}

impl ParsedTransaction {
    /// The extraction fields only (amount, counterparty, category)
    pub fn extraction(&self) -> Extraction {
        Extraction {
            amount: self.amount.clone(),
            counterparty: self.counterparty.clone(),
            category: self.category,
        }
    }
}

// ============================================================================
// RECORD BUILDER
// ============================================================================

/// Assemble the output record. Pure: no I/O, no clock, no randomness.
pub fn build_record(
    extraction: Extraction,
    id: &str,
    timestamp: i64,
    device_id: &str,
    raw_message: &str,
) -> ParsedTransaction {
    ParsedTransaction {
        id: id.to_string(),
        amount: extraction.amount,
        counterparty: extraction.counterparty,
        category: extraction.category,
        formatted_date: format_timestamp(timestamp),
        timestamp,
        raw_message: raw_message.to_string(),
        device_id: device_id.to_string(),
    }
}

/// Format epoch milliseconds in the local timezone
pub fn format_timestamp(timestamp_ms: i64) -> String {
    format_timestamp_in(timestamp_ms, &Local)
}

/// Format epoch milliseconds in any timezone.
/// Out-of-range timestamps give an empty string.
pub fn format_timestamp_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(timestamp_ms).earliest() {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
