use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{RecordSummary, WideRow};
use crate::reconciler::{self, RecordDetailArgs, RecordListArgs};
use crate::settings::Settings;

use super::{open_db, showing, DetailOpts, RecordFilterOpts, RecordListOpts};

#[derive(Clone, Copy)]
pub enum Kind {
    Invoices,
    BankTransactions,
}

impl Kind {
    fn plural(self) -> &'static str {
        match self {
            Kind::Invoices => "invoices",
            Kind::BankTransactions => "bank transactions",
        }
    }

    fn reference_header(self) -> &'static str {
        match self {
            Kind::Invoices => "Invoice #",
            Kind::BankTransactions => "Reference",
        }
    }
}

pub(crate) fn list_args(filter: &RecordFilterOpts, settings: &Settings) -> Result<RecordListArgs> {
    let (date_from, date_to) = filter.range.resolve()?;
    Ok(RecordListArgs {
        date_from,
        date_to,
        account_codes: filter
            .account_codes
            .clone()
            .unwrap_or_else(|| settings.account_codes.clone()),
        status: filter.status,
        text_search: filter.search.pattern()?,
        page: Default::default(),
    })
}

pub(crate) fn fetch(kind: Kind, db: &crate::db::Database, args: &RecordListArgs) -> Result<Vec<RecordSummary>> {
    let cancel = CancelToken::new();
    match kind {
        Kind::Invoices => reconciler::list_invoices(db, args, &cancel),
        Kind::BankTransactions => reconciler::list_bank_transactions(db, args, &cancel),
    }
}

fn state_cell(is_reconciled: bool) -> Cell {
    if is_reconciled {
        Cell::new("Reconciled".green())
    } else {
        Cell::new("Unreconciled".red())
    }
}

pub fn list(kind: Kind, opts: &RecordListOpts) -> Result<()> {
    let (settings, db) = open_db()?;
    let mut args = list_args(&opts.filter, &settings)?;
    args.page = opts.page.page(&settings);

    let rows = match fetch(kind, &db, &args) {
        Err(e) if e.is_no_rows() => {
            println!("No {} found.", kind.plural());
            return Ok(());
        }
        other => other?,
    };

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        kind.reference_header(),
        "Date",
        "Contact",
        "Total",
        "Donations",
        "CRM",
        "State",
    ]);
    for r in &rows {
        table.add_row(vec![
            Cell::new(&r.id),
            Cell::new(r.reference.as_deref().unwrap_or("")),
            Cell::new(&r.date),
            Cell::new(r.contact_name.as_deref().unwrap_or("")),
            Cell::new(money(r.total)),
            Cell::new(money(r.donation_total)),
            Cell::new(money(r.crms_total)),
            state_cell(r.is_reconciled),
        ]);
    }
    println!("{table}");
    let total = rows.first().map(|r| r.row_count).unwrap_or(0);
    println!("{}", showing(args.page.offset, rows.len(), total));
    Ok(())
}

pub fn detail(kind: Kind, id: &str, opts: &DetailOpts) -> Result<()> {
    let (settings, db) = open_db()?;
    let (date_from, date_to) = opts.range.resolve()?;
    let args = RecordDetailArgs {
        id: id.to_string(),
        date_from,
        date_to,
        account_codes: opts
            .account_codes
            .clone()
            .unwrap_or_else(|| settings.account_codes.clone()),
    };
    let cancel = CancelToken::new();
    let result = match kind {
        Kind::Invoices => reconciler::invoice_detail(&db, &args, &cancel),
        Kind::BankTransactions => reconciler::bank_transaction_detail(&db, &args, &cancel),
    };
    let rows = match result {
        Err(e) if e.is_no_rows() => {
            println!("No {} with id {id} in {date_from} to {date_to}.", kind.plural());
            return Ok(());
        }
        other => other?,
    };
    print_detail(kind, &rows);
    Ok(())
}

fn print_detail(kind: Kind, rows: &[WideRow]) {
    let Some(head) = rows.first() else {
        return;
    };
    println!("{:<12}{}", format!("{}:", kind.reference_header()), head.reference.as_deref().unwrap_or(""));
    println!("{:<12}{}", "Date:", head.date);
    println!("{:<12}{}", "Status:", head.status);
    println!("{:<12}{}", "Contact:", head.contact_name.as_deref().unwrap_or(""));
    println!("{:<12}{}", "Total:", money(head.total));
    println!("{:<12}{}", "Donations:", money(head.donation_total));
    println!("{:<12}{}", "CRM:", money(head.crms_total));
    if head.is_reconciled {
        println!("{}", "Reconciled".green().bold());
    } else {
        let gap = head.donation_total - head.crms_total;
        println!("{} {}", "DISCREPANCY:".red().bold(), money(gap));
    }

    let mut table = Table::new();
    table.set_header(vec!["Account", "Name", "Description", "Amount", "Tax", "Donation"]);
    for r in rows {
        let amount = r.line_amount.map(money).unwrap_or_default();
        table.add_row(vec![
            Cell::new(r.account_code.as_deref().unwrap_or("")),
            Cell::new(r.account_name.as_deref().unwrap_or("")),
            Cell::new(r.description.as_deref().unwrap_or("")),
            if r.is_donation {
                Cell::new(amount.bold())
            } else {
                Cell::new(amount)
            },
            Cell::new(r.tax_amount.map(money).unwrap_or_default()),
            Cell::new(if r.is_donation { "yes" } else { "" }),
        ]);
    }
    println!();
    println!("{table}");
}
