pub mod accounts;
pub mod backup;
pub mod donations;
pub mod export;
pub mod init;
pub mod records;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::reconciler::{LinkageStatus, Page, ReconciliationStatus};
use crate::registry::{DirTemplates, Registry};
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "dfk-recon",
    version,
    about = "Reconcile accounting records against CRM donations by DFK."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and create the database.
    Init {
        /// Path for data (default: ~/Documents/dfk-recon)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Regex matched against account codes to find donation lines
        #[arg(long = "account-codes")]
        account_codes: Option<String>,
    },
    /// Upsert accounts, invoices, bank transactions and donations from a JSON file.
    Sync {
        /// Path to the JSON payload
        file: String,
    },
    /// List invoices with their reconciliation state.
    Invoices(RecordListOpts),
    /// List bank transactions with their reconciliation state.
    BankTransactions(RecordListOpts),
    /// Show one invoice line by line.
    Invoice {
        id: String,
        #[command(flatten)]
        range: DetailOpts,
    },
    /// Show one bank transaction line by line.
    BankTransaction {
        id: String,
        #[command(flatten)]
        range: DetailOpts,
    },
    /// List CRM donations.
    Donations(DonationListOpts),
    /// List chart-of-accounts entries.
    Accounts {
        #[command(flatten)]
        search: SearchOpts,
        #[command(flatten)]
        page: PageOpts,
    },
    /// Write a filtered listing to CSV.
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        /// Destination CSV file
        #[arg(long)]
        output: String,
        #[command(flatten)]
        filter: RecordFilterOpts,
    },
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/dfk-recon-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportKind {
    Invoices,
    BankTransactions,
}

#[derive(Args, Clone)]
pub struct DateRangeOpts {
    /// Start date, YYYY-MM-DD (default: January 1 of this year)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// End date, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl DateRangeOpts {
    pub fn resolve(&self) -> Result<(NaiveDate, NaiveDate)> {
        let today = Local::now().date_naive();
        let to = self.to.unwrap_or(today);
        let from = match self.from {
            Some(d) => d,
            None => NaiveDate::from_ymd_opt(to.year(), 1, 1)
                .ok_or_else(|| Error::InvalidArgument(format!("no January 1 in {}", to.year())))?,
        };
        if from > to {
            return Err(Error::InvalidArgument(format!("--from {from} is after --to {to}")));
        }
        Ok((from, to))
    }
}

#[derive(Args, Clone)]
pub struct SearchOpts {
    /// Case-insensitive text to look for
    #[arg(long)]
    pub search: Option<String>,
    /// Treat --search as a regular expression
    #[arg(long)]
    pub regex: bool,
}

impl SearchOpts {
    /// Search text as the pattern the listings expect.
    pub fn pattern(&self) -> Result<String> {
        match &self.search {
            None => Ok(String::new()),
            Some(s) if self.regex => {
                regex::Regex::new(s).map_err(|e| Error::InvalidArgument(e.to_string()))?;
                Ok(s.clone())
            }
            Some(s) => Ok(regex::escape(s)),
        }
    }
}

#[derive(Args, Clone)]
pub struct PageOpts {
    /// Rows per page (default from settings)
    #[arg(long)]
    pub limit: Option<i64>,
    /// Rows to skip
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<i64>,
}

impl PageOpts {
    pub fn page(&self, settings: &Settings) -> Page {
        Page::new(Some(self.limit.unwrap_or(settings.page_size)), self.offset)
    }
}

#[derive(Args, Clone)]
pub struct RecordFilterOpts {
    #[command(flatten)]
    pub range: DateRangeOpts,
    /// all, reconciled, not-reconciled
    #[arg(long, default_value = "all")]
    pub status: ReconciliationStatus,
    /// Override the donation account-code regex
    #[arg(long = "account-codes")]
    pub account_codes: Option<String>,
    #[command(flatten)]
    pub search: SearchOpts,
}

#[derive(Args, Clone)]
pub struct RecordListOpts {
    #[command(flatten)]
    pub filter: RecordFilterOpts,
    #[command(flatten)]
    pub page: PageOpts,
}

#[derive(Args, Clone)]
pub struct DetailOpts {
    #[command(flatten)]
    pub range: DateRangeOpts,
    /// Override the donation account-code regex
    #[arg(long = "account-codes")]
    pub account_codes: Option<String>,
}

#[derive(Args, Clone)]
pub struct DonationListOpts {
    #[command(flatten)]
    pub range: DateRangeOpts,
    /// all, linked, not-linked
    #[arg(long, default_value = "all")]
    pub linkage: LinkageStatus,
    /// Only donations whose DFK is this payout or invoice reference
    #[arg(long)]
    pub reference: Option<String>,
    #[command(flatten)]
    pub search: SearchOpts,
    #[command(flatten)]
    pub page: PageOpts,
}

/// Open the configured database, creating it when missing.
pub(crate) fn open_db() -> Result<(Settings, Database)> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let db = match &settings.templates_dir {
        Some(dir) => {
            let registry = Registry::load(&DirTemplates(PathBuf::from(dir)))?;
            Database::open_with(&db_path, Arc::new(registry))?
        }
        None => Database::open(&db_path)?,
    };
    Ok((settings, db))
}

/// "Showing 1-25 of 40" for a page that starts at `offset`.
pub(crate) fn showing(offset: i64, shown: usize, total: i64) -> String {
    let first = offset.max(0) + 1;
    let last = offset.max(0) + shown as i64;
    format!("Showing {first}-{last} of {total}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_escaped_unless_regex() {
        let plain = SearchOpts {
            search: Some("INV-0001 (a)".to_string()),
            regex: false,
        };
        let escaped = regex::Regex::new(&plain.pattern().unwrap()).unwrap();
        assert!(escaped.is_match("Acme INV-0001 (a)"));
        assert!(!escaped.is_match("INV-0001 a"));
        let raw = SearchOpts {
            search: Some("^po_".to_string()),
            regex: true,
        };
        assert_eq!(raw.pattern().unwrap(), "^po_");
        let bad = SearchOpts {
            search: Some("(".to_string()),
            regex: true,
        };
        assert!(matches!(bad.pattern(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let range = DateRangeOpts {
            from: NaiveDate::from_ymd_opt(2025, 7, 1),
            to: NaiveDate::from_ymd_opt(2025, 6, 1),
        };
        assert!(range.resolve().is_err());
    }

    #[test]
    fn test_date_range_defaults_to_start_of_year() {
        let range = DateRangeOpts {
            from: None,
            to: NaiveDate::from_ymd_opt(2025, 6, 30),
        };
        let (from, to) = range.resolve().unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }

    #[test]
    fn test_showing() {
        assert_eq!(showing(0, 25, 40), "Showing 1-25 of 40");
        assert_eq!(showing(25, 15, 40), "Showing 26-40 of 40");
        assert_eq!(showing(-3, 2, 2), "Showing 1-2 of 2");
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from([
            "dfk-recon",
            "invoices",
            "--from",
            "2025-04-01",
            "--status",
            "not-reconciled",
            "--limit",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Invoices(opts) => {
                assert_eq!(opts.filter.status, ReconciliationStatus::NotReconciled);
                assert_eq!(opts.page.limit, Some(4));
            }
            _ => panic!("expected invoices"),
        }
    }
}
