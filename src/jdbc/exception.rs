use std::fmt;

use tracing::{debug, error, warn};

use super::SqlError;
use crate::error::SqlshapeError;

/// Broad category of a driver error, derived from its SQLState class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlErrorKind {
    Connection,
    Data,
    ConstraintViolation,
    /// Deadlock, lock timeout or serialization failure.
    Lock,
    Grammar,
    QueryTimeout,
    Generic,
}

impl SqlErrorKind {
    pub fn from_sql_state(sql_state: Option<&str>) -> Self {
        let Some(state) = sql_state else {
            return SqlErrorKind::Generic;
        };
        if state == "57014" || state.starts_with("HYT") {
            return SqlErrorKind::QueryTimeout;
        }
        match state.get(..2) {
            Some("08") => SqlErrorKind::Connection,
            Some("22") => SqlErrorKind::Data,
            Some("23") => SqlErrorKind::ConstraintViolation,
            Some("40") => SqlErrorKind::Lock,
            Some("42") | Some("37") => SqlErrorKind::Grammar,
            _ => SqlErrorKind::Generic,
        }
    }
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlErrorKind::Connection => "connection",
            SqlErrorKind::Data => "data",
            SqlErrorKind::ConstraintViolation => "constraint violation",
            SqlErrorKind::Lock => "lock acquisition",
            SqlErrorKind::Grammar => "sql grammar",
            SqlErrorKind::QueryTimeout => "query timeout",
            SqlErrorKind::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Single translation point for driver errors. Every `SqlError` leaving the
/// coordinator passes through `convert`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlExceptionHelper;

impl SqlExceptionHelper {
    /// Log a driver error and wrap it with the operation that failed and the
    /// SQL involved.
    pub fn convert(&self, err: SqlError, context: &str, sql: Option<&str>) -> SqlshapeError {
        self.log(&err);
        SqlshapeError::Jdbc {
            kind: SqlErrorKind::from_sql_state(err.sql_state.as_deref()),
            context: context.to_string(),
            sql_state: err.sql_state,
            vendor_code: err.vendor_code,
            message: err.message,
            sql: sql.map(String::from),
        }
    }

    /// Cleanup failures must never mask the outcome of the operation being
    /// cleaned up after: they are logged and dropped.
    pub fn log_cleanup_failure(&self, err: &SqlError, what: &str) {
        debug!(
            "Unable to release {}: {} (SQLState: {})",
            what,
            err.message,
            err.sql_state.as_deref().unwrap_or("n/a")
        );
    }

    fn log(&self, err: &SqlError) {
        warn!(
            "SQL Error: {}, SQLState: {}",
            err.vendor_code,
            err.sql_state.as_deref().unwrap_or("n/a")
        );
        error!("{}", err.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_sql_state() {
        assert_eq!(SqlErrorKind::from_sql_state(Some("08001")), SqlErrorKind::Connection);
        assert_eq!(SqlErrorKind::from_sql_state(Some("22003")), SqlErrorKind::Data);
        assert_eq!(SqlErrorKind::from_sql_state(Some("23505")), SqlErrorKind::ConstraintViolation);
        assert_eq!(SqlErrorKind::from_sql_state(Some("40001")), SqlErrorKind::Lock);
        assert_eq!(SqlErrorKind::from_sql_state(Some("42P01")), SqlErrorKind::Grammar);
        assert_eq!(SqlErrorKind::from_sql_state(Some("37000")), SqlErrorKind::Grammar);
        assert_eq!(SqlErrorKind::from_sql_state(Some("57014")), SqlErrorKind::QueryTimeout);
        assert_eq!(SqlErrorKind::from_sql_state(Some("HYT00")), SqlErrorKind::QueryTimeout);
        assert_eq!(SqlErrorKind::from_sql_state(Some("X")), SqlErrorKind::Generic);
        assert_eq!(SqlErrorKind::from_sql_state(None), SqlErrorKind::Generic);
    }

    #[test]
    fn test_convert_keeps_driver_details() {
        let err = SqlError::new(Some("42P01"), 7, "relation \"t\" does not exist");
        let converted = SqlExceptionHelper.convert(err, "could not prepare statement", Some("select * from t"));
        match converted {
            SqlshapeError::Jdbc { kind, context, sql_state, vendor_code, message, sql } => {
                assert_eq!(kind, SqlErrorKind::Grammar);
                assert_eq!(context, "could not prepare statement");
                assert_eq!(sql_state.as_deref(), Some("42P01"));
                assert_eq!(vendor_code, 7);
                assert_eq!(message, "relation \"t\" does not exist");
                assert_eq!(sql.as_deref(), Some("select * from t"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
