// 🗄️ SQLite Sink - Append-only store for parsed Yape transactions
// WAL mode, one row per pushed record, keyed by a sink-generated push key

use crate::sink::{new_push_key, TransactionSink};
use crate::transaction::{Category, ParsedTransaction};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = "push_key, id, amount, counterparty, category, formatted_date,
                              timestamp, raw_message, device_id";

/// Stored row: the record plus the key it was pushed under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub push_key: String,

    #[serde(flatten)]
    pub record: ParsedTransaction,
}

/// Per-category totals for the stats view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub count: i64,
    pub total: f64,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Transactions Table (append-only, no uniqueness on content)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            push_key TEXT UNIQUE NOT NULL,
            id TEXT NOT NULL,
            amount TEXT NOT NULL,
            counterparty TEXT NOT NULL,
            category TEXT NOT NULL,
            formatted_date TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            raw_message TEXT NOT NULL,
            device_id TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category ON transactions(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timestamp ON transactions(timestamp)",
        [],
    )?;

    Ok(())
}

pub fn insert_record(conn: &Connection, push_key: &str, record: &ParsedTransaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (
            push_key, id, amount, counterparty, category, formatted_date,
            timestamp, raw_message, device_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            push_key,
            record.id,
            record.amount,
            record.counterparty,
            record.category.as_str(),
            record.formatted_date,
            record.timestamp,
            record.raw_message,
            record.device_id,
        ],
    )
    .with_context(|| format!("Failed to insert transaction {}", record.id))?;

    Ok(())
}

fn row_to_stored(row: &Row) -> rusqlite::Result<StoredTransaction> {
    let category: String = row.get(4)?;

    Ok(StoredTransaction {
        push_key: row.get(0)?,
        record: ParsedTransaction {
            id: row.get(1)?,
            amount: row.get(2)?,
            counterparty: row.get(3)?,
            category: Category::from_code(&category).unwrap_or(Category::Other),
            formatted_date: row.get(5)?,
            timestamp: row.get(6)?,
            raw_message: row.get(7)?,
            device_id: row.get(8)?,
        },
    })
}

/// All records in push order
pub fn get_all_records(conn: &Connection) -> Result<Vec<StoredTransaction>> {
    let sql = format!("SELECT {} FROM transactions ORDER BY seq", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;

    let records = stmt
        .query_map([], row_to_stored)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read transactions")?;

    Ok(records)
}

pub fn get_records_by_category(
    conn: &Connection,
    category: Category,
) -> Result<Vec<StoredTransaction>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE category = ?1 ORDER BY seq",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let records = stmt
        .query_map(params![category.as_str()], row_to_stored)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read {} transactions", category))?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

/// Count and amount total per category, in Category::ALL order.
/// Categories with no rows are included with zeros.
pub fn get_category_totals(conn: &Connection) -> Result<Vec<CategoryTotal>> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*), COALESCE(SUM(CAST(amount AS REAL)), 0.0)
         FROM transactions
         GROUP BY category",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let totals = Category::ALL
        .iter()
        .map(|category| {
            let (count, total) = rows
                .iter()
                .filter(|(code, _, _)| Category::from_code(code) == Some(*category))
                .fold((0i64, 0.0f64), |(c, t), (_, count, total)| (c + count, t + total));

            CategoryTotal {
                category: *category,
                count,
                total,
            }
        })
        .collect();

    Ok(totals)
}

// ============================================================================
// SQLITE SINK
// ============================================================================

/// SqliteSink - TransactionSink over a single SQLite connection
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteSink {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite sink connection lock poisoned"))
    }

    pub fn all_records(&self) -> Result<Vec<StoredTransaction>> {
        get_all_records(&*self.lock()?)
    }

    pub fn records_by_category(&self, category: Category) -> Result<Vec<StoredTransaction>> {
        get_records_by_category(&*self.lock()?, category)
    }

    pub fn count(&self) -> Result<i64> {
        verify_count(&*self.lock()?)
    }

    pub fn category_totals(&self) -> Result<Vec<CategoryTotal>> {
        get_category_totals(&*self.lock()?)
    }
}

impl TransactionSink for SqliteSink {
    fn push(&self, record: &ParsedTransaction) -> Result<String> {
        let push_key = new_push_key();
        insert_record(&*self.lock()?, &push_key, record)?;
        debug!(push_key = %push_key, id = %record.id, "transaction stored");
        Ok(push_key)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

// ============================================================================
// TESTS
// ============================================================================
