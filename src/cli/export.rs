use std::path::Path;

use crate::error::Result;
use crate::models::RecordSummary;
use crate::reconciler::Page;

use super::records::{fetch, list_args, Kind};
use super::{open_db, ExportKind, RecordFilterOpts};

pub fn run(kind: ExportKind, output: &str, filter: &RecordFilterOpts) -> Result<()> {
    let (settings, db) = open_db()?;
    let mut args = list_args(filter, &settings)?;
    args.page = Page::new(None, None);

    let kind = match kind {
        ExportKind::Invoices => Kind::Invoices,
        ExportKind::BankTransactions => Kind::BankTransactions,
    };
    let rows = match fetch(kind, &db, &args) {
        Err(e) if e.is_no_rows() => Vec::new(),
        other => other?,
    };
    write_csv(Path::new(output), &rows)?;
    println!("Wrote {} rows to {output}", rows.len());
    Ok(())
}

fn write_csv(path: &Path, rows: &[RecordSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "id",
        "reference",
        "date",
        "status",
        "contact_name",
        "total",
        "donation_total",
        "crms_total",
        "is_reconciled",
    ])?;
    for r in rows {
        let total = format!("{:.2}", r.total);
        let donation_total = format!("{:.2}", r.donation_total);
        let crms_total = format!("{:.2}", r.crms_total);
        wtr.write_record([
            r.id.as_str(),
            r.reference.as_deref().unwrap_or(""),
            r.date.as_str(),
            r.status.as_str(),
            r.contact_name.as_deref().unwrap_or(""),
            total.as_str(),
            donation_total.as_str(),
            crms_total.as_str(),
            if r.is_reconciled { "true" } else { "false" },
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_header_only_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("id,reference,date"));
    }

    #[test]
    fn test_write_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let row = RecordSummary {
            id: "inv-2".to_string(),
            reference: Some("INV-0002".to_string()),
            date: "2025-05-14".to_string(),
            status: "PAID".to_string(),
            contact_name: Some("Acme, Ltd".to_string()),
            total: 196.5,
            donation_total: 200.0,
            crms_total: 200.0,
            is_reconciled: true,
            row_count: 1,
        };
        write_csv(&path, &[row]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().nth(1).unwrap();
        assert_eq!(line, r#"inv-2,INV-0002,2025-05-14,PAID,"Acme, Ltd",196.50,200.00,200.00,true"#);
    }
}
