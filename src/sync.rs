use std::path::Path;

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cancel::CancelToken;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Account, BankTransaction, Donation, Invoice};
use crate::upsert::{upsert_accounts, upsert_bank_transactions, upsert_donations, upsert_invoices};

/// Records pulled from the accounting system and the CRM, as one JSON
/// document. Every section may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPayload {
    pub accounts: Vec<Account>,
    pub invoices: Vec<Invoice>,
    pub bank_transactions: Vec<BankTransaction>,
    pub donations: Vec<Donation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub accounts: usize,
    pub invoices: usize,
    pub bank_transactions: usize,
    pub donations: usize,
    pub checksum: String,
    pub repeat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    pub source: Option<String>,
    pub checksum: String,
    pub accounts: i64,
    pub invoices: i64,
    pub bank_transactions: i64,
    pub donations: i64,
    pub synced_at: String,
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn sync_file(db: &mut Database, file_path: &Path, cancel: &CancelToken) -> Result<SyncResult> {
    let data = std::fs::read(file_path)?;
    let source = file_path.file_name().and_then(|n| n.to_str());
    sync_bytes(db, &data, source, cancel)
}

pub fn sync_bytes(db: &mut Database, data: &[u8], source: Option<&str>, cancel: &CancelToken) -> Result<SyncResult> {
    let payload: SyncPayload = serde_json::from_slice(data)?;
    let checksum = compute_checksum(data);
    let repeat = db
        .conn()
        .prepare("SELECT 1 FROM sync_runs WHERE checksum = ?1")?
        .exists([&checksum])?;
    if repeat {
        tracing::info!(%checksum, "payload already synced, applying again");
    }
    let mut result = run(db, &payload, cancel)?;
    result.checksum = checksum;
    result.repeat = repeat;
    db.conn().execute(
        "INSERT INTO sync_runs (source, checksum, accounts, invoices, bank_transactions, donations) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            source,
            result.checksum,
            result.accounts as i64,
            result.invoices as i64,
            result.bank_transactions as i64,
            result.donations as i64,
        ],
    )?;
    Ok(result)
}

/// Upsert each entity kind in its own transaction. A failure in a later kind
/// leaves the earlier kinds committed.
pub fn run(db: &mut Database, payload: &SyncPayload, cancel: &CancelToken) -> Result<SyncResult> {
    let accounts = upsert_accounts(db, &payload.accounts, cancel)?;
    let invoices = upsert_invoices(db, &payload.invoices, cancel)?;
    let bank_transactions = upsert_bank_transactions(db, &payload.bank_transactions, cancel)?;
    let donations = upsert_donations(db, &payload.donations, cancel)?;
    tracing::info!(accounts, invoices, bank_transactions, donations, "sync complete");
    Ok(SyncResult {
        accounts,
        invoices,
        bank_transactions,
        donations,
        ..SyncResult::default()
    })
}

pub fn last_run(db: &Database) -> Result<Option<SyncRun>> {
    let run = db
        .conn()
        .query_row(
            "SELECT source, checksum, accounts, invoices, bank_transactions, donations, synced_at
             FROM sync_runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(SyncRun {
                    source: row.get(0)?,
                    checksum: row.get(1)?,
                    accounts: row.get(2)?,
                    invoices: row.get(3)?,
                    bank_transactions: row.get(4)?,
                    donations: row.get(5)?,
                    synced_at: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::error::Error;

    const PAYLOAD: &str = r#"{
        "accounts": [
            {"id": "acc-1", "code": "5301", "name": "Donations", "type": "REVENUE"}
        ],
        "invoices": [
            {
                "id": "inv-1", "invoice_number": "INV-0001", "status": "PAID",
                "date": "2025-05-14", "total": 196.5,
                "line_items": [
                    {"account_code": "5301", "line_amount": 200.0},
                    {"account_code": "6100", "line_amount": -3.5}
                ]
            }
        ],
        "bank_transactions": [
            {
                "id": "bt-1", "reference": "po_1", "status": "AUTHORISED",
                "date": "2025-06-03", "total": 40.0,
                "line_items": [{"account_code": "5501", "line_amount": 40.0}]
            }
        ],
        "donations": [
            {"id": "d-1", "amount": 200.0, "close_date": "2025-05-12", "dfk": "INV-0001", "campaign": "Spring"}
        ]
    }"#;

    fn count(db: &Database, table: &str) -> i64 {
        db.conn()
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_sync_bytes_counts_and_records_run() {
        let (_dir, mut db) = test_db();
        let result = sync_bytes(&mut db, PAYLOAD.as_bytes(), Some("payload.json"), &CancelToken::new()).unwrap();
        assert_eq!(result.accounts, 1);
        assert_eq!(result.invoices, 1);
        assert_eq!(result.bank_transactions, 1);
        assert_eq!(result.donations, 1);
        assert!(!result.repeat);
        assert_eq!(result.checksum.len(), 64);
        assert_eq!(count(&db, "invoice_line_items"), 2);

        let run = last_run(&db).unwrap().unwrap();
        assert_eq!(run.source.as_deref(), Some("payload.json"));
        assert_eq!(run.checksum, result.checksum);
        assert_eq!(run.donations, 1);
    }

    #[test]
    fn test_resync_is_flagged_but_idempotent() {
        let (_dir, mut db) = test_db();
        let cancel = CancelToken::new();
        sync_bytes(&mut db, PAYLOAD.as_bytes(), None, &cancel).unwrap();
        let again = sync_bytes(&mut db, PAYLOAD.as_bytes(), None, &cancel).unwrap();
        assert!(again.repeat);
        assert_eq!(count(&db, "invoices"), 1);
        assert_eq!(count(&db, "invoice_line_items"), 2);
        assert_eq!(count(&db, "sync_runs"), 2);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let (_dir, mut db) = test_db();
        let result = sync_bytes(&mut db, br#"{"donations": []}"#, None, &CancelToken::new()).unwrap();
        assert_eq!(result.accounts + result.invoices + result.bank_transactions + result.donations, 0);
    }

    #[test]
    fn test_malformed_payload_is_json_error() {
        let (_dir, mut db) = test_db();
        let err = sync_bytes(&mut db, b"{not json", None, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(last_run(&db).unwrap().is_none());
    }

    #[test]
    fn test_failed_kind_keeps_earlier_kinds() {
        let (_dir, mut db) = test_db();
        let payload = r#"{
            "accounts": [{"id": "acc-1", "code": "5301", "name": "Donations"}],
            "invoices": [{"id": "inv-1", "invoice_number": "INV-1", "status": "PAID", "date": "soon", "total": 1.0}]
        }"#;
        let err = sync_bytes(&mut db, payload.as_bytes(), None, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Transaction { ref id, .. } if id == "inv-1"));
        assert_eq!(count(&db, "accounts"), 1);
        assert_eq!(count(&db, "invoices"), 0);
        assert_eq!(count(&db, "sync_runs"), 0);
    }

    #[test]
    fn test_sync_file_reads_from_disk() {
        let (dir, mut db) = test_db();
        let path = dir.path().join("export.json");
        std::fs::write(&path, PAYLOAD).unwrap();
        let result = sync_file(&mut db, &path, &CancelToken::new()).unwrap();
        assert_eq!(result.invoices, 1);
        assert_eq!(last_run(&db).unwrap().unwrap().source.as_deref(), Some("export.json"));
    }
}
