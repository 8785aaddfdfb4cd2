use serde::Deserialize;

use super::release::ReleaseMode;
use crate::error::SqlshapeError;

/// Settings for the `[jdbc]` table of `sqlshape.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JdbcSettings {
    /// `auto`, `on_close`, `after_statement` or `after_transaction`.
    pub release_mode: String,

    /// Statements queued per batch. 0 or 1 disables batching.
    pub batch_size: usize,

    /// Print every statement to stdout.
    pub show_sql: bool,

    pub format_sql: bool,

    pub highlight_sql: bool,

    /// Log queries slower than this many milliseconds. 0 disables.
    pub slow_query_ms: u64,
}

impl Default for JdbcSettings {
    fn default() -> Self {
        Self {
            release_mode: "auto".to_string(),
            batch_size: 0,
            show_sql: false,
            format_sql: false,
            highlight_sql: false,
            slow_query_ms: 0,
        }
    }
}

impl JdbcSettings {
    /// The configured release mode, with `auto` resolved to the default.
    pub fn release_mode(&self) -> Result<ReleaseMode, SqlshapeError> {
        Ok(ReleaseMode::interpret(&self.release_mode)?.unwrap_or_default())
    }
}
