use std::sync::Arc;
use std::time::Instant;

use compact_str::CompactString;
use tracing::{debug, warn};

use super::batch::{Batch, BatchKey};
use super::exception::SqlExceptionHelper;
use super::logical::{LogicalConnection, SerializedConnection};
use super::registry::{CancelHandle, ResultSetId, StatementId};
use super::release::ReleaseMode;
use super::settings::JdbcSettings;
use super::timeout::TransactionTimeout;
use super::{Connection, ConnectionProvider, StatementKind};
use crate::error::{Result, SqlshapeError};
use crate::statement_logger::StatementLogger;

/// Drives statement work over one logical connection: preparation,
/// execution, batching, flush suspension of releases and transaction
/// boundaries.
pub struct JdbcCoordinator {
    logical: LogicalConnection,
    batch: Option<Batch>,
    batch_size: usize,
    flush_depth: usize,
    transaction_in_progress: bool,
    timeout: Option<TransactionTimeout>,
    logger: StatementLogger,
    exceptions: SqlExceptionHelper,
}

impl JdbcCoordinator {
    pub fn new(logical: LogicalConnection, settings: &JdbcSettings) -> Self {
        Self {
            logical,
            batch: None,
            batch_size: settings.batch_size,
            flush_depth: 0,
            transaction_in_progress: false,
            timeout: None,
            logger: StatementLogger::from_settings(settings),
            exceptions: SqlExceptionHelper,
        }
    }

    /// Coordinator over connections from `provider`, released per the
    /// configured mode.
    pub fn managed(provider: Arc<dyn ConnectionProvider>, settings: &JdbcSettings) -> Result<Self> {
        let mode = settings.release_mode()?;
        Ok(Self::new(LogicalConnection::managed(provider, mode), settings))
    }

    pub fn user_supplied(connection: Box<dyn Connection>, settings: &JdbcSettings) -> Self {
        Self::new(LogicalConnection::user_supplied(connection), settings)
    }

    pub fn logical_connection(&self) -> &LogicalConnection {
        &self.logical
    }

    pub fn logical_connection_mut(&mut self) -> &mut LogicalConnection {
        &mut self.logical
    }

    pub fn has_registered_resources(&self) -> bool {
        self.logical.registry().has_registered_resources()
    }

    pub fn transaction_in_progress(&self) -> bool {
        self.transaction_in_progress
    }

    /// Prepare a statement that may modify data. A pending batch is executed
    /// first so its statements cannot run after this one.
    pub fn prepare_statement(&mut self, sql: &str, kind: StatementKind) -> Result<StatementId> {
        self.execute_batch()?;
        self.prepare(sql, kind)
    }

    /// Prepare a read-only statement. A pending batch stays queued.
    pub fn prepare_query_statement(&mut self, sql: &str, kind: StatementKind) -> Result<StatementId> {
        self.prepare(sql, kind)
    }

    fn prepare(&mut self, sql: &str, kind: StatementKind) -> Result<StatementId> {
        let query_timeout = self
            .timeout
            .as_ref()
            .map(TransactionTimeout::remaining_seconds)
            .transpose()?;
        self.logger.log_statement(sql);

        let mut statement = self
            .logical
            .connection()?
            .prepare_statement(sql, kind)
            .map_err(|e| self.exceptions.convert(e, "Could not prepare statement", Some(sql)))?;

        if let Some(seconds) = query_timeout {
            if let Err(e) = statement.set_query_timeout(seconds) {
                if let Err(close) = statement.close() {
                    self.exceptions.log_cleanup_failure(&close, "statement");
                }
                return Err(self.exceptions.convert(e, "Could not set query timeout", Some(sql)));
            }
        }

        Ok(self.logical.registry_mut().register_statement(statement, sql))
    }

    /// Run a registered statement as a query and register its result set
    /// under it. The statement becomes the target of `cancel_last_query`.
    pub fn execute_query(&mut self, statement: StatementId) -> Result<ResultSetId> {
        let sql = self.statement_sql(statement)?;
        let registry = self.logical.registry_mut();
        registry.register_last_query(statement);
        let started = Instant::now();
        let result = registry
            .statement_mut(statement)
            .ok_or_else(|| not_registered(statement))?
            .execute_query();
        self.logger.log_slow_query(&sql, started);

        let result_set = result
            .map_err(|e| self.exceptions.convert(e, "Could not extract ResultSet", Some(sql.as_str())))?;
        Ok(self
            .logical
            .registry_mut()
            .register_result_set(result_set, Some(statement)))
    }

    /// Run a registered statement as an update, returning the row count.
    pub fn execute_update(&mut self, statement: StatementId) -> Result<u64> {
        let sql = self.statement_sql(statement)?;
        let started = Instant::now();
        let result = self
            .logical
            .registry_mut()
            .statement_mut(statement)
            .ok_or_else(|| not_registered(statement))?
            .execute_update();
        self.logger.log_slow_query(&sql, started);

        result.map_err(|e| self.exceptions.convert(e, "Could not execute statement", Some(sql.as_str())))
    }

    fn statement_sql(&self, statement: StatementId) -> Result<CompactString> {
        self.logical
            .registry()
            .sql_of(statement)
            .map(CompactString::new)
            .ok_or_else(|| not_registered(statement))
    }

    pub fn release_statement(&mut self, statement: StatementId) {
        self.logical.registry_mut().release_statement(statement);
    }

    pub fn release_result_set(&mut self, result_set: ResultSetId) {
        self.logical.registry_mut().release_result_set(result_set);
    }

    /// Apply the release policy once the caller is done with a statement.
    pub fn after_statement_execution(&mut self) -> Result<()> {
        self.logical.after_statement(self.transaction_in_progress)
    }

    /// Suspend connection releases for the duration of a flush. Calls nest.
    pub fn flush_beginning(&mut self) {
        if self.flush_depth == 0 {
            self.logical.disable_releases();
        }
        self.flush_depth += 1;
    }

    /// End a flush. The outermost end re-enables releases and re-applies the
    /// release policy.
    pub fn flush_ending(&mut self) -> Result<()> {
        if self.flush_depth == 0 {
            return Err(SqlshapeError::assertion("Mismatched flush handling"));
        }
        self.flush_depth -= 1;
        if self.flush_depth == 0 {
            self.logical.enable_releases();
            self.after_statement_execution()?;
        }
        Ok(())
    }

    pub fn flush_depth(&self) -> usize {
        self.flush_depth
    }

    pub fn begin_transaction(&mut self) {
        debug!("Transaction begin");
        self.transaction_in_progress = true;
    }

    /// End of a transaction, committed or not. An unexecuted batch is
    /// discarded, leftover resources are closed and the connection is
    /// released per the release mode.
    pub fn after_transaction_completion(&mut self, successful: bool) -> Result<()> {
        debug!("Transaction completed (successful: {})", successful);
        if let Some(mut batch) = self.batch.take() {
            warn!(
                "Batch {} was not explicitly executed or released at transaction completion; discarding it",
                batch.key()
            );
            batch.release_statements(self.logical.registry_mut());
        }
        self.transaction_in_progress = false;
        self.timeout = None;
        self.logical.after_transaction()
    }

    pub fn set_transaction_timeout(&mut self, seconds: u32) {
        self.timeout = Some(TransactionTimeout::from_now(seconds));
    }

    /// Seconds left before the transaction deadline, if one is set. Fails
    /// once the deadline has passed.
    pub fn remaining_transaction_timeout(&self) -> Result<Option<u32>> {
        self.timeout
            .as_ref()
            .map(TransactionTimeout::remaining_seconds)
            .transpose()
    }

    /// Cancel the statement last run as a query. The reference is cleared
    /// whatever the outcome.
    pub fn cancel_last_query(&self) -> Result<bool> {
        self.logical
            .registry()
            .cancel_last_query()
            .map_err(|e| self.exceptions.convert(e, "Cannot cancel query", None))
    }

    /// Handle for cancelling the last query from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.logical.registry().cancel_handle()
    }

    /// The statement for `sql` within the batch for `key`. A pending batch
    /// under a different key is executed first.
    pub fn batch_statement(&mut self, key: &BatchKey, sql: &str) -> Result<StatementId> {
        if self.batch.as_ref().is_some_and(|batch| batch.key() != key) {
            debug!("Batch key changed; executing pending batch");
            self.execute_batch()?;
        }
        if self.batch.is_none() {
            self.batch = Some(Batch::new(key.clone(), self.batch_size));
        }
        if let Some(id) = self.batch.as_ref().and_then(|batch| batch.statement(sql)) {
            return Ok(id);
        }
        let id = self.prepare(sql, StatementKind::Prepared)?;
        if let Some(batch) = self.batch.as_mut() {
            batch.add_statement(sql, id);
        }
        Ok(id)
    }

    /// Queue the current parameters of the batch statements. Without
    /// batching they execute immediately and are released.
    pub fn add_to_batch(&mut self) -> Result<Vec<u64>> {
        let batch = self
            .batch
            .as_mut()
            .ok_or_else(|| SqlshapeError::assertion("No batch in progress"))?;
        let counts = batch.add_to_batch(self.logical.registry_mut(), &self.exceptions)?;
        if !batch.is_batching() {
            batch.release_statements(self.logical.registry_mut());
            self.batch = None;
            self.after_statement_execution()?;
        }
        Ok(counts)
    }

    /// Execute and release the pending batch, if any.
    pub fn execute_batch(&mut self) -> Result<Vec<u64>> {
        let Some(mut batch) = self.batch.take() else {
            return Ok(Vec::new());
        };
        let result = batch.execute(self.logical.registry_mut(), &self.exceptions);
        batch.release_statements(self.logical.registry_mut());
        let counts = result?;
        self.after_statement_execution()?;
        Ok(counts)
    }

    /// Release the pending batch without executing it.
    pub fn abort_batch(&mut self) {
        if let Some(mut batch) = self.batch.take() {
            debug!("Aborting batch {}", batch.key());
            batch.release_statements(self.logical.registry_mut());
        }
    }

    pub fn pending_batch(&self) -> Option<&BatchKey> {
        self.batch.as_ref().map(Batch::key)
    }

    /// Close the coordinator. Returns the user-supplied connection, if any.
    pub fn close(&mut self) -> Result<Option<Box<dyn Connection>>> {
        if let Some(mut batch) = self.batch.take() {
            warn!("Closing coordinator with unreleased batch {}", batch.key());
            batch.release_statements(self.logical.registry_mut());
        }
        self.logical.close()
    }

    pub fn serialize(&self) -> Result<SerializedConnection> {
        if self.batch.is_some() {
            return Err(SqlshapeError::Serialization(
                "Cannot serialize a coordinator with a pending batch".to_string(),
            ));
        }
        self.logical.serialize()
    }

    pub fn deserialize(
        state: SerializedConnection,
        provider: Arc<dyn ConnectionProvider>,
        settings: &JdbcSettings,
    ) -> Result<Self> {
        let mode: ReleaseMode = settings.release_mode()?;
        Ok(Self::new(
            LogicalConnection::deserialize(state, provider, mode),
            settings,
        ))
    }
}

fn not_registered(statement: StatementId) -> SqlshapeError {
    SqlshapeError::assertion(format!("Statement {:?} is not registered", statement))
}
