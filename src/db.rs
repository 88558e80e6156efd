use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::error::Result;
use crate::functions::register_regexp;
use crate::registry::{EmbeddedTemplates, Registry};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    code TEXT,
    name TEXT NOT NULL,
    account_type TEXT,
    status TEXT,
    currency_code TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    invoice_number TEXT NOT NULL,
    invoice_type TEXT,
    status TEXT NOT NULL,
    date TEXT NOT NULL CHECK (date(date) IS NOT NULL),
    contact_name TEXT,
    total REAL NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS invoice_line_items (
    id INTEGER PRIMARY KEY,
    invoice_id TEXT NOT NULL,
    line_item_id TEXT,
    description TEXT,
    account_code TEXT,
    line_amount REAL NOT NULL DEFAULT 0,
    tax_amount REAL NOT NULL DEFAULT 0,
    FOREIGN KEY (invoice_id) REFERENCES invoices(id)
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id TEXT PRIMARY KEY,
    reference TEXT,
    bank_transaction_type TEXT,
    status TEXT NOT NULL,
    date TEXT NOT NULL CHECK (date(date) IS NOT NULL),
    contact_name TEXT,
    total REAL NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS bank_transaction_line_items (
    id INTEGER PRIMARY KEY,
    bank_transaction_id TEXT NOT NULL,
    line_item_id TEXT,
    description TEXT,
    account_code TEXT,
    line_amount REAL NOT NULL DEFAULT 0,
    tax_amount REAL NOT NULL DEFAULT 0,
    FOREIGN KEY (bank_transaction_id) REFERENCES bank_transactions(id)
);

CREATE TABLE IF NOT EXISTS donations (
    id TEXT PRIMARY KEY,
    name TEXT,
    amount REAL NOT NULL DEFAULT 0,
    close_date TEXT NOT NULL CHECK (date(close_date) IS NOT NULL),
    dfk TEXT,
    created_date TEXT,
    last_modified_date TEXT,
    additional_fields TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY,
    source TEXT,
    checksum TEXT NOT NULL,
    accounts INTEGER NOT NULL DEFAULT 0,
    invoices INTEGER NOT NULL DEFAULT 0,
    bank_transactions INTEGER NOT NULL DEFAULT 0,
    donations INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_invoices_date ON invoices(date);
CREATE INDEX IF NOT EXISTS idx_invoice_line_items_parent ON invoice_line_items(invoice_id);
CREATE INDEX IF NOT EXISTS idx_bank_transactions_date ON bank_transactions(date);
CREATE INDEX IF NOT EXISTS idx_bank_transaction_line_items_parent ON bank_transaction_line_items(bank_transaction_id);
CREATE INDEX IF NOT EXISTS idx_donations_dfk ON donations(dfk);
CREATE INDEX IF NOT EXISTS idx_donations_close_date ON donations(close_date);
";

// Room for every registered statement plus ad-hoc queries.
const STATEMENT_CACHE_CAPACITY: usize = 64;

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    register_regexp(&conn)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// A connection paired with the shared statement registry. Open one writer
/// with [`Database::open`]; each concurrent reader takes its own connection
/// from [`Database::reader`].
pub struct Database {
    conn: Connection,
    registry: Arc<Registry>,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let registry = Arc::new(Registry::load(&EmbeddedTemplates)?);
        Self::open_with(path, registry)
    }

    pub fn open_with(path: &Path, registry: Arc<Registry>) -> Result<Self> {
        let conn = get_connection(path)?;
        init_db(&conn)?;
        registry.prepare(&conn)?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(Self {
            conn,
            registry,
            path: path.to_path_buf(),
        })
    }

    pub fn reader(&self) -> Result<Self> {
        let conn = get_connection(&self.path)?;
        self.registry.prepare(&conn)?;
        Ok(Self {
            conn,
            registry: Arc::clone(&self.registry),
            path: self.path.clone(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Split borrow for callers that open a transaction and still need the
    /// registry.
    pub fn parts_mut(&mut self) -> (&mut Connection, &Registry) {
        (&mut self.conn, &self.registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("test.db")).unwrap();
    (dir, db)
}
