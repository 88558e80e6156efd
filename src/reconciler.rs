//! Reconciliation listings.
//!
//! A financial record is reconciled when the line items booked to donation
//! account codes add up to exactly the CRM donations whose DFK equals the
//! record's reference. The arithmetic lives in the SQL templates; this module
//! turns typed arguments into statement arguments and rows into structs.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;

use crate::cancel::CancelToken;
use crate::db::Database;
use crate::error::Result;
use crate::models::{AccountRow, DonationRow, RecordSummary, WideRow};
use crate::registry::{text, Args, Query};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconciliationStatus {
    #[default]
    All,
    Reconciled,
    NotReconciled,
}

impl ReconciliationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Reconciled => "Reconciled",
            Self::NotReconciled => "NotReconciled",
        }
    }
}

impl FromStr for ReconciliationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "all" => Ok(Self::All),
            "reconciled" => Ok(Self::Reconciled),
            "notreconciled" => Ok(Self::NotReconciled),
            _ => Err(format!("unknown reconciliation status: {s}")),
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkageStatus {
    #[default]
    All,
    Linked,
    NotLinked,
}

impl LinkageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Linked => "Linked",
            Self::NotLinked => "NotLinked",
        }
    }
}

impl FromStr for LinkageStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "all" => Ok(Self::All),
            "linked" => Ok(Self::Linked),
            "notlinked" => Ok(Self::NotLinked),
            _ => Err(format!("unknown linkage status: {s}")),
        }
    }
}

impl fmt::Display for LinkageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `limit: None` is unlimited. A negative offset reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit,
            offset: offset.unwrap_or(0),
        }
    }

    fn insert_into(&self, args: &mut Args) {
        args.insert("HereLimit", Value::Integer(self.limit.unwrap_or(-1)));
        args.insert("HereOffset", Value::Integer(self.offset.max(0)));
    }
}

fn date(d: NaiveDate) -> Value {
    Value::Text(d.format("%Y-%m-%d").to_string())
}

// ---------------------------------------------------------------------------
// Typed arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordListArgs {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub account_codes: String,
    pub status: ReconciliationStatus,
    pub text_search: String,
    pub page: Page,
}

impl RecordListArgs {
    fn to_args(&self) -> Args {
        let mut args = Args::from([
            ("DateFrom", date(self.date_from)),
            ("DateTo", date(self.date_to)),
            ("AccountCodes", text(&self.account_codes)),
            ("ReconciliationStatus", text(self.status.as_str())),
            ("TextSearch", text(&self.text_search)),
        ]);
        self.page.insert_into(&mut args);
        args
    }
}

#[derive(Debug, Clone)]
pub struct RecordDetailArgs {
    pub id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub account_codes: String,
}

impl RecordDetailArgs {
    fn to_args(&self, id_param: &'static str) -> Args {
        Args::from([
            (id_param, text(&self.id)),
            ("DateFrom", date(self.date_from)),
            ("DateTo", date(self.date_to)),
            ("AccountCodes", text(&self.account_codes)),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct DonationListArgs {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub status: LinkageStatus,
    pub payout_reference: Option<String>,
    pub text_search: String,
    pub page: Page,
}

impl DonationListArgs {
    fn to_args(&self) -> Args {
        let mut args = Args::from([
            ("DateFrom", date(self.date_from)),
            ("DateTo", date(self.date_to)),
            ("LinkageStatus", text(self.status.as_str())),
            ("PayoutReference", text(self.payout_reference.as_deref().unwrap_or(""))),
            ("TextSearch", text(&self.text_search)),
        ]);
        self.page.insert_into(&mut args);
        args
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountListArgs {
    pub text_search: String,
    pub page: Page,
}

impl AccountListArgs {
    fn to_args(&self) -> Args {
        let mut args = Args::from([("TextSearch", text(&self.text_search))]);
        self.page.insert_into(&mut args);
        args
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<RecordSummary> {
    Ok(RecordSummary {
        id: row.get(0)?,
        reference: row.get(1)?,
        date: row.get(2)?,
        status: row.get(3)?,
        contact_name: row.get(4)?,
        total: row.get(5)?,
        donation_total: row.get(6)?,
        crms_total: row.get(7)?,
        is_reconciled: row.get(8)?,
        row_count: row.get(9)?,
    })
}

fn wide_from_row(row: &Row<'_>) -> rusqlite::Result<WideRow> {
    Ok(WideRow {
        id: row.get(0)?,
        reference: row.get(1)?,
        date: row.get(2)?,
        status: row.get(3)?,
        contact_name: row.get(4)?,
        total: row.get(5)?,
        donation_total: row.get(6)?,
        crms_total: row.get(7)?,
        is_reconciled: row.get(8)?,
        line_item_id: row.get(9)?,
        description: row.get(10)?,
        account_code: row.get(11)?,
        account_name: row.get(12)?,
        line_amount: row.get(13)?,
        tax_amount: row.get(14)?,
        is_donation: row.get(15)?,
    })
}

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        close_date: row.get(3)?,
        dfk: row.get(4)?,
        created_date: row.get(5)?,
        last_modified_date: row.get(6)?,
        additional_fields: row.get(7)?,
        row_count: row.get(8)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        account_type: row.get(3)?,
        status: row.get(4)?,
        currency_code: row.get(5)?,
        updated_at: row.get(6)?,
        row_count: row.get(7)?,
    })
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

pub fn list_invoices(db: &Database, args: &RecordListArgs, cancel: &CancelToken) -> Result<Vec<RecordSummary>> {
    db.registry()
        .query(db.conn(), Query::Invoices, &args.to_args(), cancel, summary_from_row)
}

pub fn list_bank_transactions(
    db: &Database,
    args: &RecordListArgs,
    cancel: &CancelToken,
) -> Result<Vec<RecordSummary>> {
    db.registry()
        .query(db.conn(), Query::BankTransactions, &args.to_args(), cancel, summary_from_row)
}

pub fn invoice_detail(db: &Database, args: &RecordDetailArgs, cancel: &CancelToken) -> Result<Vec<WideRow>> {
    db.registry()
        .query(db.conn(), Query::Invoice, &args.to_args("InvoiceID"), cancel, wide_from_row)
}

pub fn bank_transaction_detail(
    db: &Database,
    args: &RecordDetailArgs,
    cancel: &CancelToken,
) -> Result<Vec<WideRow>> {
    db.registry().query(
        db.conn(),
        Query::BankTransaction,
        &args.to_args("BankTransactionID"),
        cancel,
        wide_from_row,
    )
}

pub fn list_donations(db: &Database, args: &DonationListArgs, cancel: &CancelToken) -> Result<Vec<DonationRow>> {
    db.registry()
        .query(db.conn(), Query::Donations, &args.to_args(), cancel, donation_from_row)
}

pub fn list_accounts(db: &Database, args: &AccountListArgs, cancel: &CancelToken) -> Result<Vec<AccountRow>> {
    db.registry()
        .query(db.conn(), Query::Accounts, &args.to_args(), cancel, account_from_row)
}
