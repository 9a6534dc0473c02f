// 📤 Transaction Sinks - Where finished records go
//
// The sink is append-only and owns the push key. The listener never retries:
// a failed push is logged and reported back once.

use crate::transaction::ParsedTransaction;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Mutex;

/// TransactionSink - Destination for parsed records
pub trait TransactionSink: Send + Sync {
    /// Append a record and return the key the sink assigned to it
    fn push(&self, record: &ParsedTransaction) -> Result<String>;

    /// Short name for log lines
    fn name(&self) -> &str {
        "sink"
    }
}

/// Time-ordered push key: 12 hex digits of epoch millis + 8 random hex digits.
/// Keys generated later sort after earlier ones.
pub fn new_push_key() -> String {
    let millis = Utc::now().timestamp_millis().max(0);
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{:012x}{}", millis, &random[..8])
}

// ============================================================================
// MEMORY SINK
// ============================================================================

/// In-memory sink, keeps records in push order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, ParsedTransaction)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything pushed so far
    pub fn records(&self) -> Vec<(String, ParsedTransaction)> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionSink for MemorySink {
    fn push(&self, record: &ParsedTransaction) -> Result<String> {
        let key = new_push_key();
        self.records
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push((key.clone(), record.clone()));
        Ok(key)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// TESTS
// ============================================================================
