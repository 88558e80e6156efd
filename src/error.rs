use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Template {name}: {message}")]
    Template { name: String, message: String },

    #[error("Statement {statement} expects {expected} arguments, got {got}")]
    ArgumentCountMismatch {
        statement: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("No rows found")]
    NoRowsFound,

    #[error("Statement {name} failed: {source}")]
    Statement {
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Upsert of {id} failed: {source}")]
    Transaction {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl Error {
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Error::NoRowsFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
