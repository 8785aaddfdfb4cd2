use serde::{Deserialize, Serialize};

use crate::error::SqlshapeError;

/// When a logical connection gives up its physical connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Hold the connection until the logical connection is closed.
    OnClose,
    /// Release after every statement, unless resources are still open.
    AfterStatement,
    /// Release at transaction end, or after each statement in auto-commit
    /// mode outside a transaction.
    #[default]
    AfterTransaction,
}

impl ReleaseMode {
    /// Parse a configured mode. `auto` yields `None`, leaving the choice to
    /// the caller.
    pub fn interpret(name: &str) -> Result<Option<ReleaseMode>, SqlshapeError> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(None),
            "on_close" => Ok(Some(ReleaseMode::OnClose)),
            "after_statement" => Ok(Some(ReleaseMode::AfterStatement)),
            "after_transaction" => Ok(Some(ReleaseMode::AfterTransaction)),
            _ => Err(SqlshapeError::Config(format!(
                "Unknown connection release mode: {}",
                name
            ))),
        }
    }

    pub fn releases_at_transaction_end(self) -> bool {
        self != ReleaseMode::OnClose
    }
}

/// Whether the physical connection should be released now.
///
/// `has_registered_resources` covers both open statements or result sets
/// and an outstanding connection borrow.
pub fn should_release(
    mode: ReleaseMode,
    has_registered_resources: bool,
    releases_enabled: bool,
    in_auto_commit: bool,
    transaction_in_progress: bool,
) -> bool {
    let aggressive = match mode {
        ReleaseMode::OnClose => false,
        ReleaseMode::AfterStatement => true,
        ReleaseMode::AfterTransaction => in_auto_commit && !transaction_in_progress,
    };
    aggressive && releases_enabled && !has_registered_resources
}
