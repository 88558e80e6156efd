use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, Row};

use crate::cancel::{with_cancel, CancelToken};
use crate::error::{Error, Result};
use crate::template::{parameterize, Template};

/// Named arguments for one statement call, keyed by parameter name without
/// the leading colon.
pub type Args = BTreeMap<&'static str, Value>;

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn opt_text(value: Option<&str>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Statement names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Accounts,
    Invoices,
    Invoice,
    BankTransactions,
    BankTransaction,
    Donations,
    UpsertAccount,
    UpsertInvoice,
    DeleteInvoiceLineItems,
    InsertInvoiceLineItem,
    UpsertBankTransaction,
    DeleteBankTransactionLineItems,
    InsertBankTransactionLineItem,
    UpsertDonation,
}

impl Query {
    pub const ALL: &'static [Query] = &[
        Query::Accounts,
        Query::Invoices,
        Query::Invoice,
        Query::BankTransactions,
        Query::BankTransaction,
        Query::Donations,
        Query::UpsertAccount,
        Query::UpsertInvoice,
        Query::DeleteInvoiceLineItems,
        Query::InsertInvoiceLineItem,
        Query::UpsertBankTransaction,
        Query::DeleteBankTransactionLineItems,
        Query::InsertBankTransactionLineItem,
        Query::UpsertDonation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Invoices => "invoices",
            Self::Invoice => "invoice",
            Self::BankTransactions => "bank_transactions",
            Self::BankTransaction => "bank_transaction",
            Self::Donations => "donations",
            Self::UpsertAccount => "upsert_account",
            Self::UpsertInvoice => "upsert_invoice",
            Self::DeleteInvoiceLineItems => "delete_invoice_line_items",
            Self::InsertInvoiceLineItem => "insert_invoice_line_item",
            Self::UpsertBankTransaction => "upsert_bank_transaction",
            Self::DeleteBankTransactionLineItems => "delete_bank_transaction_line_items",
            Self::InsertBankTransactionLineItem => "insert_bank_transaction_line_item",
            Self::UpsertDonation => "upsert_donation",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.sql", self.name())
    }
}

// ---------------------------------------------------------------------------
// Template sources
// ---------------------------------------------------------------------------

pub trait TemplateSource {
    fn read(&self, query: Query) -> Result<String>;
}

/// Templates compiled into the binary.
pub struct EmbeddedTemplates;

impl TemplateSource for EmbeddedTemplates {
    fn read(&self, query: Query) -> Result<String> {
        let text = match query {
            Query::Accounts => include_str!("../sql/accounts.sql"),
            Query::Invoices => include_str!("../sql/invoices.sql"),
            Query::Invoice => include_str!("../sql/invoice.sql"),
            Query::BankTransactions => include_str!("../sql/bank_transactions.sql"),
            Query::BankTransaction => include_str!("../sql/bank_transaction.sql"),
            Query::Donations => include_str!("../sql/donations.sql"),
            Query::UpsertAccount => include_str!("../sql/upsert_account.sql"),
            Query::UpsertInvoice => include_str!("../sql/upsert_invoice.sql"),
            Query::DeleteInvoiceLineItems => include_str!("../sql/delete_invoice_line_items.sql"),
            Query::InsertInvoiceLineItem => include_str!("../sql/insert_invoice_line_item.sql"),
            Query::UpsertBankTransaction => include_str!("../sql/upsert_bank_transaction.sql"),
            Query::DeleteBankTransactionLineItems => {
                include_str!("../sql/delete_bank_transaction_line_items.sql")
            }
            Query::InsertBankTransactionLineItem => {
                include_str!("../sql/insert_bank_transaction_line_item.sql")
            }
            Query::UpsertDonation => include_str!("../sql/upsert_donation.sql"),
        };
        Ok(text.to_string())
    }
}

/// Templates read from a directory of `<name>.sql` files.
pub struct DirTemplates(pub PathBuf);

impl TemplateSource for DirTemplates {
    fn read(&self, query: Query) -> Result<String> {
        let path = self.0.join(query.file_name());
        std::fs::read_to_string(&path).map_err(|e| Error::Template {
            name: query.name().to_string(),
            message: format!("{}: {e}", path.display()),
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Statement {
    pub query: Query,
    pub body: String,
    pub parameters: Vec<String>,
}

impl Statement {
    pub fn check_args(&self, args: &Args) -> Result<()> {
        if args.len() != self.parameters.len() {
            return Err(Error::ArgumentCountMismatch {
                statement: self.query.name(),
                expected: self.parameters.len(),
                got: args.len(),
            });
        }
        Ok(())
    }
}

/// Every named statement, parameterized once and shared by all connections.
/// Each connection keeps its own prepared handles in its statement cache.
#[derive(Debug)]
pub struct Registry {
    statements: HashMap<Query, Statement>,
}

impl Registry {
    pub fn load(source: &dyn TemplateSource) -> Result<Self> {
        let mut statements = HashMap::new();
        for &query in Query::ALL {
            let raw = source.read(query)?;
            let Template { body, parameters } = parameterize(query.name(), &raw)?;
            statements.insert(
                query,
                Statement {
                    query,
                    body,
                    parameters,
                },
            );
        }
        tracing::info!(statements = statements.len(), "statement registry loaded");
        Ok(Self { statements })
    }

    /// Prepare every statement on `conn`, leaving the handles in its cache.
    pub fn prepare(&self, conn: &Connection) -> Result<()> {
        for stmt in self.statements.values() {
            let name = stmt.query.name();
            let prepared = conn
                .prepare_cached(&stmt.body)
                .map_err(|source| Error::Statement { name, source })?;
            if prepared.parameter_count() != stmt.parameters.len() {
                return Err(Error::Template {
                    name: name.to_string(),
                    message: format!(
                        "statement binds {} parameters but template declares {}",
                        prepared.parameter_count(),
                        stmt.parameters.len()
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn statement(&self, query: Query) -> &Statement {
        match self.statements.get(&query) {
            Some(stmt) => stmt,
            None => panic!("statement {} was never registered", query.name()),
        }
    }

    /// Run a row-returning statement. An empty result is
    /// [`Error::NoRowsFound`].
    pub fn query<T, F>(
        &self,
        conn: &Connection,
        query: Query,
        args: &Args,
        cancel: &CancelToken,
        mut map: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let stmt = self.statement(query);
        stmt.check_args(args)?;
        let name = query.name();
        tracing::debug!(statement = name, "query");

        let rows = with_cancel(conn, cancel, |conn| {
            let mut prepared = conn
                .prepare_cached(&stmt.body)
                .map_err(|source| Error::Statement { name, source })?;
            let bound = bind(args);
            let params = as_params(&bound);
            let rows = prepared
                .query_map(params.as_slice(), |row| map(row))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<T>>>())
                .map_err(|source| Error::Statement { name, source })?;
            Ok(rows)
        })?;

        if rows.is_empty() {
            return Err(Error::NoRowsFound);
        }
        Ok(rows)
    }

    /// Run a write statement, returning the number of rows changed.
    /// Cancellation is the caller's concern, usually around a transaction.
    pub fn execute(&self, conn: &Connection, query: Query, args: &Args) -> Result<usize> {
        let stmt = self.statement(query);
        stmt.check_args(args)?;
        let name = query.name();
        let mut prepared = conn
            .prepare_cached(&stmt.body)
            .map_err(|source| Error::Statement { name, source })?;
        let bound = bind(args);
        let params = as_params(&bound);
        prepared
            .execute(params.as_slice())
            .map_err(|source| Error::Statement { name, source })
    }
}

fn bind(args: &Args) -> Vec<(String, &Value)> {
    args.iter().map(|(k, v)| (format!(":{k}"), v)).collect()
}

fn as_params<'a>(bound: &'a [(String, &'a Value)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    bound
        .iter()
        .map(|(k, v)| (k.as_str(), *v as &dyn ToSql))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn args(pairs: &[(&'static str, Value)]) -> Args {
        pairs.iter().cloned().collect()
    }

    struct OneTemplate(&'static str);

    impl TemplateSource for OneTemplate {
        fn read(&self, query: Query) -> Result<String> {
            if query == Query::Accounts {
                Ok(self.0.to_string())
            } else {
                EmbeddedTemplates.read(query)
            }
        }
    }

    #[test]
    fn test_every_template_parameterizes() {
        let registry = Registry::load(&EmbeddedTemplates).unwrap();
        for &q in Query::ALL {
            assert!(!registry.statement(q).parameters.is_empty(), "{}", q.name());
        }
        assert_eq!(
            registry.statement(Query::Invoices).parameters,
            vec![
                "DateFrom",
                "DateTo",
                "AccountCodes",
                "ReconciliationStatus",
                "TextSearch",
                "HereLimit",
                "HereOffset"
            ]
        );
    }

    #[test]
    fn test_prepare_on_connection() {
        let (_dir, db) = test_db();
        db.registry().prepare(db.conn()).unwrap();
    }

    #[test]
    fn test_original_templates_run_as_examples() {
        let (_dir, db) = test_db();
        for &q in &[Query::Accounts, Query::Invoices, Query::BankTransactions, Query::Donations, Query::Invoice] {
            let raw = EmbeddedTemplates.read(q).unwrap();
            let mut stmt = db.conn().prepare(&raw).unwrap();
            assert_eq!(stmt.parameter_count(), 0, "{}", q.name());
            let mut rows = stmt.query([]).unwrap();
            assert!(rows.next().unwrap().is_none());
        }
    }

    #[test]
    fn test_argument_count_mismatch() {
        let (_dir, db) = test_db();
        let err = db
            .registry()
            .query(
                db.conn(),
                Query::Accounts,
                &args(&[("TextSearch", Value::Text(String::new()))]),
                &CancelToken::new(),
                |r| r.get::<_, String>(0),
            )
            .unwrap_err();
        match err {
            Error::ArgumentCountMismatch {
                statement,
                expected,
                got,
            } => {
                assert_eq!(statement, "accounts");
                assert_eq!(expected, 3);
                assert_eq!(got, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_arity_any_order() {
        let (_dir, db) = test_db();
        db.conn()
            .execute("INSERT INTO accounts (id, code, name) VALUES ('a1', '5301', 'Donations')", [])
            .unwrap();
        let mut reversed = Args::new();
        reversed.insert("HereOffset", Value::Integer(0));
        reversed.insert("HereLimit", Value::Integer(10));
        reversed.insert("TextSearch", Value::Text(String::new()));
        let names = db
            .registry()
            .query(db.conn(), Query::Accounts, &reversed, &CancelToken::new(), |r| {
                r.get::<_, String>(2)
            })
            .unwrap();
        assert_eq!(names, vec!["Donations".to_string()]);
    }

    #[test]
    fn test_empty_result_is_no_rows() {
        let (_dir, db) = test_db();
        let err = db
            .registry()
            .query(
                db.conn(),
                Query::Accounts,
                &args(&[
                    ("TextSearch", Value::Text(String::new())),
                    ("HereLimit", Value::Integer(10)),
                    ("HereOffset", Value::Integer(0)),
                ]),
                &CancelToken::new(),
                |r| r.get::<_, String>(0),
            )
            .unwrap_err();
        assert!(err.is_no_rows());
    }

    #[test]
    fn test_bad_template_fails_load() {
        let err = Registry::load(&OneTemplate("SELECT 1 AS One;")).unwrap_err();
        assert!(matches!(err, Error::Template { .. }), "got {err}");
    }

    #[test]
    fn test_dir_templates_read_files() {
        let dir = tempfile::tempdir().unwrap();
        for &q in Query::ALL {
            std::fs::write(dir.path().join(q.file_name()), EmbeddedTemplates.read(q).unwrap()).unwrap();
        }
        let registry = Registry::load(&DirTemplates(dir.path().to_path_buf())).unwrap();
        assert_eq!(registry.statement(Query::Donations).parameters.len(), 7);
    }

    #[test]
    fn test_dir_templates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("accounts.sql"), EmbeddedTemplates.read(Query::Accounts).unwrap()).unwrap();
        let err = Registry::load(&DirTemplates(dir.path().to_path_buf())).unwrap_err();
        match err {
            Error::Template { name, message } => {
                assert_eq!(name, "invoices");
                assert!(message.contains("invoices.sql"), "got {message}");
            }
            other => panic!("expected template error, got {other}"),
        }
    }
}
