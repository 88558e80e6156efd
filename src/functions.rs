use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::Result;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// Compiled patterns shared by every connection in the process. Search text
// makes the key space open-ended, so the map is emptied once it reaches the cap.
const PATTERN_CACHE_CAP: usize = 256;

fn pattern_cache() -> &'static Mutex<HashMap<String, Arc<Regex>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<Regex>>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        tracing::debug!("initialising process-wide regexp cache");
        Mutex::new(HashMap::new())
    })
}

fn compile(pattern: &str) -> std::result::Result<Arc<Regex>, regex::Error> {
    let mut cache = pattern_cache().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(Arc::clone(re));
    }
    let re = Arc::new(Regex::new(pattern)?);
    if cache.len() >= PATTERN_CACHE_CAP {
        tracing::debug!(entries = cache.len(), "regexp cache full, clearing");
        cache.clear();
    }
    cache.insert(pattern.to_string(), Arc::clone(&re));
    Ok(re)
}

fn text(value: ValueRef<'_>) -> std::result::Result<Option<&str>, BoxError> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(t) => Ok(Some(std::str::from_utf8(t)?)),
        ValueRef::Integer(_) | ValueRef::Real(_) | ValueRef::Blob(_) => {
            Err("regexp expects text arguments".into())
        }
    }
}

/// Register `regexp(pattern, subject)` on the connection, which also backs
/// the `subject REGEXP pattern` operator. NULL on either side is no match.
///
/// Scalar functions belong to a connection, so this runs from every
/// connection constructor; registering again replaces the same definition.
pub fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            if matches!(ctx.get_raw(0), ValueRef::Null) {
                return Ok(false);
            }
            let re: Arc<Arc<Regex>> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                let pattern = text(vr)?.unwrap_or_default();
                Ok(compile(pattern)?)
            })?;
            let subject = text(ctx.get_raw(1)).map_err(rusqlite::Error::UserFunctionError)?;
            Ok(subject.is_some_and(|s| re.is_match(s)))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        conn
    }

    fn eval(conn: &Connection, sql: &str) -> bool {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_operator_form_matches() {
        let conn = conn();
        assert!(eval(&conn, "SELECT '5301' REGEXP '^(53|55|57)'"));
        assert!(!eval(&conn, "SELECT '4100' REGEXP '^(53|55|57)'"));
    }

    #[test]
    fn test_function_form_case_insensitive() {
        let conn = conn();
        assert!(eval(&conn, "SELECT regexp('(?i)' || 'smith', 'Jane SMITH')"));
        assert!(!eval(&conn, "SELECT regexp('smith', 'Jane SMITH')"));
    }

    #[test]
    fn test_null_is_no_match() {
        let conn = conn();
        assert!(!eval(&conn, "SELECT regexp('.*', NULL)"));
        assert!(!eval(&conn, "SELECT regexp(NULL, 'abc')"));
    }

    #[test]
    fn test_invalid_pattern_errors() {
        let conn = conn();
        let result: rusqlite::Result<bool> =
            conn.query_row("SELECT regexp('(unclosed', 'abc')", [], |r| r.get(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_registration_is_repeatable() {
        let conn = conn();
        register_regexp(&conn).unwrap();
        assert!(eval(&conn, "SELECT 'abc' REGEXP 'b'"));
    }

    #[test]
    fn test_pattern_cache_is_bounded() {
        let conn = conn();
        for n in 0..PATTERN_CACHE_CAP + 50 {
            let hit: bool = conn
                .query_row("SELECT regexp(?1, 'search 7')", [format!("(?i)search {n}")], |r| r.get(0))
                .unwrap();
            assert_eq!(hit, n == 7);
        }
        let entries = pattern_cache().lock().unwrap_or_else(|e| e.into_inner()).len();
        assert!(entries <= PATTERN_CACHE_CAP, "cache holds {entries} patterns");
    }

    #[test]
    fn test_applies_per_row() {
        let conn = conn();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM (SELECT '5301' AS c UNION ALL SELECT '4100' UNION ALL SELECT '5502') \
                 WHERE c REGEXP '^(53|55)'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
