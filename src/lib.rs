// Yape Listener - Core Library
// Exposes the parser, listener, sinks and config for the CLI, API server and tests

pub mod transaction;
pub mod names;
pub mod rules;
pub mod parser;
pub mod sink;
pub mod db;
pub mod config;
pub mod listener;

// Re-export commonly used types
pub use transaction::{
    Category, Extraction, ParsedTransaction,
    build_record, format_timestamp, format_timestamp_in,
    DATE_FORMAT, DEFAULT_AMOUNT, UNKNOWN_COUNTERPARTY,
};
pub use names::{format_name, is_initial};
pub use rules::{
    CategoryRule, CategoryClassifier, ClassificationResult, yape_rules,
};
pub use parser::{
    TransactionParser, CounterpartyPattern,
    parse, extract, normalize_message, extract_amount, extract_counterparty,
    counterparty_patterns, find_name_span,
};
pub use sink::{TransactionSink, MemorySink, new_push_key};
pub use db::{
    SqliteSink, StoredTransaction, CategoryTotal,
    setup_database, insert_record, get_all_records, get_records_by_category,
    verify_count, get_category_totals,
};
pub use config::{ListenerConfig, ServiceSettings, YAPE_PACKAGE};
pub use listener::{
    NotificationEvent, NotificationListener, ListenerOutcome, load_notifications,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
