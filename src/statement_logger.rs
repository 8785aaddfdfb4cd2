use std::time::{Duration, Instant};

use tracing::{debug, info, Level};

use crate::highlight::HighlightingFormatter;
use crate::jdbc::JdbcSettings;
use crate::style::{FormatStyle, Formatter};

/// Logs SQL as it is sent to the driver.
#[derive(Debug, Clone, Default)]
pub struct StatementLogger {
    show_sql: bool,
    format_sql: bool,
    highlight_sql: bool,
    slow_query: Option<Duration>,
}

impl StatementLogger {
    pub fn new(show_sql: bool, format_sql: bool, highlight_sql: bool, slow_query_ms: u64) -> Self {
        Self {
            show_sql,
            format_sql,
            highlight_sql,
            slow_query: (slow_query_ms > 0).then(|| Duration::from_millis(slow_query_ms)),
        }
    }

    pub fn from_settings(settings: &JdbcSettings) -> Self {
        Self::new(
            settings.show_sql,
            settings.format_sql,
            settings.highlight_sql,
            settings.slow_query_ms,
        )
    }

    /// The statement as it would be logged.
    pub fn render(&self, sql: &str) -> String {
        let mut text = if self.format_sql {
            FormatStyle::detect(sql).formatter().format(sql)
        } else {
            sql.to_string()
        };
        if self.highlight_sql {
            text = HighlightingFormatter::DEFAULT.format(&text);
        }
        text
    }

    /// Log `sql` at debug level under `sqlshape::sql`, and print it when
    /// `show_sql` is set. Rendering is skipped when neither would show it.
    pub fn log_statement(&self, sql: &str) {
        let enabled = tracing::enabled!(target: "sqlshape::sql", Level::DEBUG);
        if !enabled && !self.show_sql {
            return;
        }
        let text = self.render(sql);
        debug!(target: "sqlshape::sql", "{}", text);
        if self.show_sql {
            println!("sqlshape: {}", text);
        }
    }

    /// Log `sql` if it ran longer than the slow query threshold. Returns
    /// whether it was logged.
    pub fn log_slow_query(&self, sql: &str, started: Instant) -> bool {
        let Some(threshold) = self.slow_query else {
            return false;
        };
        let elapsed = started.elapsed();
        if elapsed <= threshold {
            return false;
        }
        info!(
            target: "sqlshape::sql",
            "SlowQuery: {} milliseconds. SQL: '{}'",
            elapsed.as_millis(),
            sql
        );
        true
    }
}
