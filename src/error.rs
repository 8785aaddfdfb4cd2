use thiserror::Error;

use crate::jdbc::exception::SqlErrorKind;

/// User-facing errors.
#[derive(Error, Debug)]
pub enum SqlshapeError {
    #[error("sqlshape config error: {0}")]
    Config(String),

    #[error("sqlshape equivalence error: {0}")]
    Equivalence(String),

    /// Misuse of the connection lifecycle (closed connection, unbalanced
    /// flush calls, conflicting reconnects).
    #[error("illegal state: {0}")]
    Assertion(String),

    #[error("{context} [{kind}] {message} (SQLState: {}, error code: {vendor_code}){}",
        .sql_state.as_deref().unwrap_or("n/a"),
        .sql.as_deref().map(|s| format!(" [{}]", s)).unwrap_or_default())]
    Jdbc {
        kind: SqlErrorKind,
        context: String,
        sql_state: Option<String>,
        vendor_code: i32,
        message: String,
        sql: Option<String>,
    },

    #[error("transaction timeout expired")]
    TransactionTimeout,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SqlshapeError {
    pub fn assertion(message: impl Into<String>) -> Self {
        SqlshapeError::Assertion(message.into())
    }

    /// SQLState of a translated driver error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            SqlshapeError::Jdbc { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqlshapeError>;
