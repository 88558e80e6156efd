use crate::db::Database;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;
use crate::sync::last_run;

const TABLES: [(&str, &str); 6] = [
    ("Accounts", "accounts"),
    ("Invoices", "invoices"),
    ("Invoice lines", "invoice_line_items"),
    ("Bank txns", "bank_transactions"),
    ("Bank txn lines", "bank_transaction_line_items"),
    ("Donations", "donations"),
];

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:       {}", settings.data_dir);
    println!("Database:       {}", db_path.display());
    println!("Account codes:  {}", settings.account_codes);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `dfk-recon init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:        {}", format_bytes(size));

    let db = Database::open(&db_path)?;
    println!();
    for (label, table) in TABLES {
        let count: i64 = db
            .conn()
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?;
        println!("{:<16}{count}", format!("{label}:"));
    }

    println!();
    match last_run(&db)? {
        Some(run) => println!(
            "Last sync:      {} ({})",
            run.synced_at,
            run.source.as_deref().unwrap_or("unnamed payload")
        ),
        None => println!("Last sync:      never"),
    }
    Ok(())
}
