// 🗄️ Ledger Store - the one piece of durable state a run mutates
//
// Read once at start, written once at the end. `save` re-reads the stored
// ledger and compares its fingerprint with the one taken at load, so a
// ledger edited by someone else mid-run is never overwritten.

use crate::config::{LedgerBackend, LedgerConfig};
use crate::error::PipelineError;
use crate::output::{write_csv, write_csv_atomic};
use crate::records::StockEntry;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Ledger contents plus the fingerprint they were read with
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub entries: Vec<StockEntry>,
    pub fingerprint: String,
}

impl LedgerSnapshot {
    pub fn new(entries: Vec<StockEntry>) -> Self {
        let fingerprint = fingerprint(&entries);
        LedgerSnapshot {
            entries,
            fingerprint,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    pub rows: usize,
    pub mirrors_written: usize,
    /// `path: error` for every mirror that could not be written
    pub mirror_failures: Vec<String>,
}

pub trait LedgerStore: Send + Sync {
    /// Human-readable location, used in logs and errors
    fn describe(&self) -> String;

    fn load(&self) -> Result<LedgerSnapshot>;

    fn save(&self, entries: &[StockEntry], expected_fingerprint: &str) -> Result<SaveOutcome>;
}

/// SHA-256 over every field of every row, in order
pub fn fingerprint(entries: &[StockEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\n",
            entry.sku, entry.qty, entry.subcategory, entry.color, entry.brand
        ));
    }
    format!("{:x}", hasher.finalize())
}

/// Factory: pick the store for the configured backend
pub fn open_store(config: &LedgerConfig) -> Box<dyn LedgerStore> {
    match config.backend {
        LedgerBackend::Csv => Box::new(CsvLedgerStore::new(&config.path, config.mirrors.clone())),
        LedgerBackend::Sqlite => {
            Box::new(SqliteLedgerStore::new(&config.path, config.mirrors.clone()))
        }
    }
}

fn ensure_not_empty(entries: &[StockEntry], location: &str) -> Result<()> {
    if entries.is_empty() {
        return Err(PipelineError::EmptyLedger(location.to_string()).into());
    }
    Ok(())
}

fn ensure_unchanged(current: &[StockEntry], expected: &str, location: &str) -> Result<()> {
    if fingerprint(current) != expected {
        return Err(PipelineError::LedgerChanged(location.to_string()).into());
    }
    Ok(())
}

/// Mirrors are copies; a failed copy is reported, never fatal
fn write_mirrors(mirrors: &[PathBuf], entries: &[StockEntry], outcome: &mut SaveOutcome) {
    for mirror in mirrors {
        match write_csv(mirror, entries) {
            Ok(_) => {
                outcome.mirrors_written += 1;
                tracing::info!(path = %mirror.display(), "ledger mirror written");
            }
            Err(e) => {
                tracing::warn!(path = %mirror.display(), error = %format!("{:#}", e), "ledger mirror failed");
                outcome
                    .mirror_failures
                    .push(format!("{}: {:#}", mirror.display(), e));
            }
        }
    }
}

/// Read `sku,qty,subcategory,color,brand` rows
pub fn load_stock_csv(path: &Path) -> Result<Vec<StockEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open stock ledger: {}", path.display()))?;

    let mut entries = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let entry: StockEntry = result.with_context(|| {
            format!("Failed to deserialize {} line {}", path.display(), line_num + 2)
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

// ============================================================================
// CSV BACKEND
// ============================================================================

pub struct CsvLedgerStore {
    path: PathBuf,
    mirrors: Vec<PathBuf>,
}

impl CsvLedgerStore {
    pub fn new(path: impl Into<PathBuf>, mirrors: Vec<PathBuf>) -> Self {
        CsvLedgerStore {
            path: path.into(),
            mirrors,
        }
    }
}

impl LedgerStore for CsvLedgerStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<LedgerSnapshot> {
        let entries = load_stock_csv(&self.path)?;
        ensure_not_empty(&entries, &self.describe())?;
        Ok(LedgerSnapshot::new(entries))
    }

    fn save(&self, entries: &[StockEntry], expected_fingerprint: &str) -> Result<SaveOutcome> {
        let location = self.describe();
        ensure_not_empty(entries, &location)?;

        let current = load_stock_csv(&self.path)?;
        ensure_unchanged(&current, expected_fingerprint, &location)?;

        let rows = write_csv_atomic(&self.path, entries)?;
        tracing::info!(path = %location, rows, "stock ledger written");

        let mut outcome = SaveOutcome {
            rows,
            ..SaveOutcome::default()
        };
        write_mirrors(&self.mirrors, entries, &mut outcome);
        Ok(outcome)
    }
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

pub struct SqliteLedgerStore {
    db_path: PathBuf,
    mirrors: Vec<PathBuf>,
}

impl SqliteLedgerStore {
    pub fn new(db_path: impl Into<PathBuf>, mirrors: Vec<PathBuf>) -> Self {
        SqliteLedgerStore {
            db_path: db_path.into(),
            mirrors,
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database: {}", self.db_path.display()))?;
        setup_ledger_table(&conn)?;
        Ok(conn)
    }

    /// Replace the stored ledger with the rows of a CSV ledger file.
    /// Used once to move an existing CSV ledger into SQLite.
    pub fn import_csv(&self, csv_path: &Path) -> Result<usize> {
        let entries = load_stock_csv(csv_path)?;
        ensure_not_empty(&entries, &csv_path.display().to_string())?;

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let rows = replace_entries(&tx, &entries)?;
        tx.commit()?;

        tracing::info!(from = %csv_path.display(), to = %self.describe(), rows, "stock ledger imported");
        Ok(rows)
    }
}

pub fn setup_ledger_table(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS stock_ledger (
            position INTEGER PRIMARY KEY,
            sku TEXT NOT NULL,
            qty REAL NOT NULL,
            subcategory TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            brand TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stock_ledger_sku ON stock_ledger(sku)",
        [],
    )?;

    Ok(())
}

fn read_entries(conn: &Connection) -> Result<Vec<StockEntry>> {
    let mut stmt = conn.prepare(
        "SELECT sku, qty, subcategory, color, brand
         FROM stock_ledger
         ORDER BY position",
    )?;

    let entries = stmt
        .query_map([], |row| {
            Ok(StockEntry {
                sku: row.get(0)?,
                qty: row.get(1)?,
                subcategory: row.get(2)?,
                color: row.get(3)?,
                brand: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn replace_entries(conn: &Connection, entries: &[StockEntry]) -> Result<usize> {
    conn.execute("DELETE FROM stock_ledger", [])?;

    let mut stmt = conn.prepare(
        "INSERT INTO stock_ledger (position, sku, qty, subcategory, color, brand)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, entry) in entries.iter().enumerate() {
        stmt.execute(params![
            position as i64,
            entry.sku,
            entry.qty,
            entry.subcategory,
            entry.color,
            entry.brand
        ])?;
    }

    Ok(entries.len())
}

impl LedgerStore for SqliteLedgerStore {
    fn describe(&self) -> String {
        format!("{}#stock_ledger", self.db_path.display())
    }

    fn load(&self) -> Result<LedgerSnapshot> {
        let conn = self.open()?;
        let entries = read_entries(&conn)?;
        ensure_not_empty(&entries, &self.describe())?;
        Ok(LedgerSnapshot::new(entries))
    }

    fn save(&self, entries: &[StockEntry], expected_fingerprint: &str) -> Result<SaveOutcome> {
        let location = self.describe();
        ensure_not_empty(entries, &location)?;

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let current = read_entries(&tx)?;
        ensure_unchanged(&current, expected_fingerprint, &location)?;
        let rows = replace_entries(&tx, entries)?;
        tx.commit()
            .with_context(|| format!("Failed to commit stock ledger: {}", location))?;
        tracing::info!(path = %location, rows, "stock ledger written");

        let mut outcome = SaveOutcome {
            rows,
            ..SaveOutcome::default()
        };
        write_mirrors(&self.mirrors, entries, &mut outcome);
        Ok(outcome)
    }
}
