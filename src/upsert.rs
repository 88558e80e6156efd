use rusqlite::types::Value;
use rusqlite::Connection;

use crate::cancel::{with_cancel, CancelToken};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Account, BankTransaction, Donation, Invoice, LineItem};
use crate::registry::{opt_text, text, Args, Query, Registry};

// ---------------------------------------------------------------------------
// Batch transaction
// ---------------------------------------------------------------------------

/// Write a whole batch in one transaction. The first failing record aborts
/// the batch, rolls everything back and is named in the returned error.
fn write_batch<T>(
    db: &mut Database,
    kind: &'static str,
    records: &[T],
    cancel: &CancelToken,
    id: impl Fn(&T) -> &str,
    mut write: impl FnMut(&Connection, &Registry, &T) -> Result<()>,
) -> Result<usize> {
    let (conn, registry) = db.parts_mut();
    let tx = conn.transaction()?;

    let result = with_cancel(&tx, cancel, |conn| {
        for record in records {
            write(conn, registry, record).map_err(|e| Error::Transaction {
                id: id(record).to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(records.len())
    });

    match result {
        Ok(count) => {
            tx.commit()?;
            tracing::info!(kind, count, "upsert committed");
            Ok(count)
        }
        Err(e) => {
            tracing::warn!(kind, error = %e, "upsert rolled back");
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(kind, error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn account_args(a: &Account) -> Args {
    Args::from([
        ("AccountID", text(&a.id)),
        ("Code", opt_text(a.code.as_deref())),
        ("Name", text(&a.name)),
        ("AccountType", opt_text(a.account_type.as_deref())),
        ("Status", opt_text(a.status.as_deref())),
        ("CurrencyCode", opt_text(a.currency_code.as_deref())),
        ("UpdatedAt", opt_text(a.updated_at.as_deref())),
    ])
}

pub fn upsert_accounts(db: &mut Database, accounts: &[Account], cancel: &CancelToken) -> Result<usize> {
    write_batch(db, "accounts", accounts, cancel, |a| a.id.as_str(), |conn, registry, a| {
        registry.execute(conn, Query::UpsertAccount, &account_args(a))?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Invoices and bank transactions
// ---------------------------------------------------------------------------

/// A financial record that owns line items. Its children are always
/// deleted and reinserted, so an item removed upstream cannot linger.
trait FinancialRecord {
    const ID_PARAM: &'static str;
    const DELETE_LINES: Query;
    const UPSERT: Query;
    const INSERT_LINE: Query;

    fn id(&self) -> &str;
    fn header_args(&self) -> Args;
    fn line_items(&self) -> &[LineItem];
}

impl FinancialRecord for Invoice {
    const ID_PARAM: &'static str = "InvoiceID";
    const DELETE_LINES: Query = Query::DeleteInvoiceLineItems;
    const UPSERT: Query = Query::UpsertInvoice;
    const INSERT_LINE: Query = Query::InsertInvoiceLineItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn header_args(&self) -> Args {
        Args::from([
            ("InvoiceID", text(&self.id)),
            ("InvoiceNumber", text(&self.invoice_number)),
            ("InvoiceType", opt_text(self.invoice_type.as_deref())),
            ("Status", text(&self.status)),
            ("Date", text(&self.date)),
            ("ContactName", opt_text(self.contact_name.as_deref())),
            ("Total", Value::Real(self.total)),
            ("UpdatedAt", opt_text(self.updated_at.as_deref())),
        ])
    }

    fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }
}

impl FinancialRecord for BankTransaction {
    const ID_PARAM: &'static str = "BankTransactionID";
    const DELETE_LINES: Query = Query::DeleteBankTransactionLineItems;
    const UPSERT: Query = Query::UpsertBankTransaction;
    const INSERT_LINE: Query = Query::InsertBankTransactionLineItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn header_args(&self) -> Args {
        Args::from([
            ("BankTransactionID", text(&self.id)),
            ("Reference", opt_text(self.reference.as_deref())),
            ("BankTransactionType", opt_text(self.bank_transaction_type.as_deref())),
            ("Status", text(&self.status)),
            ("Date", text(&self.date)),
            ("ContactName", opt_text(self.contact_name.as_deref())),
            ("Total", Value::Real(self.total)),
            ("UpdatedAt", opt_text(self.updated_at.as_deref())),
        ])
    }

    fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }
}

fn line_item_args(id_param: &'static str, parent_id: &str, li: &LineItem) -> Args {
    Args::from([
        (id_param, text(parent_id)),
        ("LineItemID", opt_text(li.line_item_id.as_deref())),
        ("Description", opt_text(li.description.as_deref())),
        ("AccountCode", opt_text(li.account_code.as_deref())),
        ("LineAmount", Value::Real(li.line_amount)),
        ("TaxAmount", Value::Real(li.tax_amount)),
    ])
}

fn write_record<R: FinancialRecord>(conn: &Connection, registry: &Registry, record: &R) -> Result<()> {
    let parent = Args::from([(R::ID_PARAM, text(record.id()))]);
    registry.execute(conn, R::DELETE_LINES, &parent)?;
    registry.execute(conn, R::UPSERT, &record.header_args())?;
    for li in record.line_items() {
        registry.execute(conn, R::INSERT_LINE, &line_item_args(R::ID_PARAM, record.id(), li))?;
    }
    Ok(())
}

pub fn upsert_invoices(db: &mut Database, invoices: &[Invoice], cancel: &CancelToken) -> Result<usize> {
    write_batch(db, "invoices", invoices, cancel, |i| i.id.as_str(), write_record)
}

pub fn upsert_bank_transactions(
    db: &mut Database,
    transactions: &[BankTransaction],
    cancel: &CancelToken,
) -> Result<usize> {
    write_batch(db, "bank_transactions", transactions, cancel, |t| t.id.as_str(), write_record)
}

// ---------------------------------------------------------------------------
// Donations
// ---------------------------------------------------------------------------

fn donation_args(d: &Donation) -> Result<Args> {
    Ok(Args::from([
        ("DonationID", text(&d.id)),
        ("Name", opt_text(d.name.as_deref())),
        ("Amount", Value::Real(d.amount)),
        ("CloseDate", text(&d.close_date)),
        ("Dfk", opt_text(d.dfk.as_deref())),
        ("CreatedDate", opt_text(d.created_date.as_deref())),
        ("LastModifiedDate", opt_text(d.last_modified_date.as_deref())),
        ("AdditionalFields", Value::Text(serde_json::to_string(&d.additional_fields)?)),
    ]))
}

pub fn upsert_donations(db: &mut Database, donations: &[Donation], cancel: &CancelToken) -> Result<usize> {
    write_batch(db, "donations", donations, cancel, |d| d.id.as_str(), |conn, registry, d| {
        registry.execute(conn, Query::UpsertDonation, &donation_args(d)?)?;
        Ok(())
    })
}
