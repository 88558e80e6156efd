use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::{Connection, ErrorCode};

use crate::error::{Error, Result};

// SQLite VM instructions between cancellation checks.
const CHECK_EVERY_OPS: i32 = 256;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn is_interrupt(err: &Error) -> bool {
    let source = match err {
        Error::Db(e) | Error::Statement { source: e, .. } => e,
        Error::Transaction { source, .. } => return is_interrupt(source),
        _ => return false,
    };
    source.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}

/// Run `f` with the connection's progress handler watching `token`. A
/// cancelled token interrupts the statement in flight and the call returns
/// [`Error::Cancelled`].
pub fn with_cancel<T>(
    conn: &Connection,
    token: &CancelToken,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let flag = Arc::clone(&token.0);
    conn.progress_handler(CHECK_EVERY_OPS, Some(move || flag.load(Ordering::SeqCst)));
    let result = f(conn);
    conn.progress_handler(CHECK_EVERY_OPS, None::<fn() -> bool>);

    match result {
        Err(e) if token.is_cancelled() && is_interrupt(&e) => Err(Error::Cancelled),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precancelled_short_circuits() {
        let conn = Connection::open_in_memory().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut ran = false;
        let result = with_cancel(&conn, &token, |_| {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!ran);
    }

    #[test]
    fn test_cancel_interrupts_running_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let token = CancelToken::new();
        let inner = token.clone();
        let result: Result<i64> = with_cancel(&conn, &token, |c| {
            inner.cancel();
            let n = c.query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000000) \
                 SELECT count(*) FROM n",
                [],
                |r| r.get(0),
            )?;
            Ok(n)
        });
        assert!(matches!(result, Err(Error::Cancelled)), "got {result:?}");
    }

    #[test]
    fn test_handler_removed_after_call() {
        let conn = Connection::open_in_memory().unwrap();
        let token = CancelToken::new();
        with_cancel(&conn, &token, |_| Ok(())).unwrap();
        token.cancel();
        let n: i64 = conn
            .query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10000) \
                 SELECT count(*) FROM n",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 10000);
    }
}
