//! Connection and resource lifecycle for one logical database conversation.
//!
//! The driver itself is not part of this crate. Callers plug one in through
//! the traits below; the coordinator only ever obtains and returns physical
//! connections through a [`ConnectionProvider`].

use std::sync::Arc;

use thiserror::Error;

pub mod batch;
pub mod coordinator;
pub mod exception;
pub mod logical;
pub mod registry;
pub mod release;
pub mod settings;
pub mod timeout;

#[cfg(test)]
pub(crate) mod mock;

pub use batch::BatchKey;
pub use coordinator::JdbcCoordinator;
pub use exception::{SqlErrorKind, SqlExceptionHelper};
pub use logical::{ConnectionBorrow, LogicalConnection, SerializedConnection};
pub use registry::{CancelHandle, ResourceRegistry, ResultSetId, StatementId};
pub use release::{should_release, ReleaseMode};
pub use settings::JdbcSettings;
pub use timeout::TransactionTimeout;

/// An error raised by the driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SqlError {
    pub sql_state: Option<String>,
    pub vendor_code: i32,
    pub message: String,
}

impl SqlError {
    pub fn new(sql_state: Option<&str>, vendor_code: i32, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.map(String::from),
            vendor_code,
            message: message.into(),
        }
    }
}

pub type SqlResult<T> = std::result::Result<T, SqlError>;

/// How a statement is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Plain,
    Prepared,
    /// Stored procedure call.
    Callable,
}

/// Source of physical connections.
pub trait ConnectionProvider: Send + Sync {
    /// Obtain a physical connection.
    fn get_connection(&self) -> SqlResult<Box<dyn Connection>>;

    /// Return a connection previously handed out by `get_connection`.
    fn close_connection(&self, connection: Box<dyn Connection>) -> SqlResult<()>;
}

/// A physical database connection.
pub trait Connection: Send {
    fn prepare_statement(&mut self, sql: &str, kind: StatementKind) -> SqlResult<Box<dyn Statement>>;

    fn auto_commit(&self) -> SqlResult<bool>;
}

/// A prepared or plain statement.
pub trait Statement: Send {
    fn execute_query(&mut self) -> SqlResult<Box<dyn ResultSet>>;

    /// Returns the affected row count.
    fn execute_update(&mut self) -> SqlResult<u64>;

    fn add_batch(&mut self) -> SqlResult<()>;

    /// Returns one row count per queued batch entry.
    fn execute_batch(&mut self) -> SqlResult<Vec<u64>>;

    fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()>;

    /// A handle another thread may use to cancel the running statement.
    fn canceller(&self) -> Arc<dyn Cancel>;

    fn close(&mut self) -> SqlResult<()>;
}

pub trait ResultSet: Send {
    fn close(&mut self) -> SqlResult<()>;
}

/// Out-of-band cancellation of an executing statement.
pub trait Cancel: Send + Sync {
    fn cancel(&self) -> SqlResult<()>;
}
