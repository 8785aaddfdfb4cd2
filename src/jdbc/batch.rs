use std::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::debug;

use super::exception::SqlExceptionHelper;
use super::registry::{ResourceRegistry, StatementId};
use super::{SqlResult, Statement};
use crate::error::{Result, SqlshapeError};

/// Identifies which statements may share a batch, typically an entity name
/// plus the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey(CompactString);

impl BatchKey {
    pub fn new(key: &str) -> Self {
        Self(CompactString::new(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statements queued under one key. Each distinct SQL string gets one
/// statement, kept in the order it was first requested.
#[derive(Debug)]
pub struct Batch {
    key: BatchKey,
    size: usize,
    statements: SmallVec<[(CompactString, StatementId); 4]>,
    position: usize,
}

impl Batch {
    pub fn new(key: BatchKey, size: usize) -> Self {
        Self {
            key,
            size,
            statements: SmallVec::new(),
            position: 0,
        }
    }

    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    /// Whether additions are queued. With a size of 0 or 1 every addition
    /// executes immediately.
    pub fn is_batching(&self) -> bool {
        self.size > 1
    }

    /// Additions queued since the last execution.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn statement(&self, sql: &str) -> Option<StatementId> {
        self.statements
            .iter()
            .find(|(text, _)| text.as_str() == sql)
            .map(|(_, id)| *id)
    }

    pub fn add_statement(&mut self, sql: &str, id: StatementId) {
        self.statements.push((CompactString::new(sql), id));
    }

    pub fn statement_ids(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.statements.iter().map(|(_, id)| *id)
    }

    /// Queue the current parameters of every batch statement. Returns the
    /// row counts when this addition caused an execution, otherwise an empty
    /// list.
    pub fn add_to_batch(
        &mut self,
        registry: &mut ResourceRegistry,
        exceptions: &SqlExceptionHelper,
    ) -> Result<Vec<u64>> {
        if !self.is_batching() {
            let mut counts = Vec::with_capacity(self.statements.len());
            self.run_each(registry, exceptions, "Could not execute statement", |statement| {
                counts.push(statement.execute_update()?);
                Ok(())
            })?;
            return Ok(counts);
        }
        self.run_each(registry, exceptions, "Could not perform addBatch", |statement| {
            statement.add_batch()
        })?;
        self.position += 1;
        if self.position >= self.size {
            return self.perform_execution(registry, exceptions);
        }
        Ok(Vec::new())
    }

    /// Execute whatever is queued. A no-op when nothing is.
    pub fn execute(
        &mut self,
        registry: &mut ResourceRegistry,
        exceptions: &SqlExceptionHelper,
    ) -> Result<Vec<u64>> {
        if self.position == 0 {
            debug!("No batched statements to execute for {}", self.key);
            return Ok(Vec::new());
        }
        self.perform_execution(registry, exceptions)
    }

    fn perform_execution(
        &mut self,
        registry: &mut ResourceRegistry,
        exceptions: &SqlExceptionHelper,
    ) -> Result<Vec<u64>> {
        debug!("Executing batch {} of size {}", self.key, self.position);
        let mut counts = Vec::with_capacity(self.position * self.statements.len());
        self.run_each(registry, exceptions, "Could not execute batch", |statement| {
            counts.extend(statement.execute_batch()?);
            Ok(())
        })?;
        self.position = 0;
        Ok(counts)
    }

    /// Apply `op` to every batch statement in order. The first failure
    /// releases all batch statements and is returned.
    fn run_each<F>(
        &mut self,
        registry: &mut ResourceRegistry,
        exceptions: &SqlExceptionHelper,
        context: &str,
        mut op: F,
    ) -> Result<()>
    where
        F: FnMut(&mut dyn Statement) -> SqlResult<()>,
    {
        let mut failure = None;
        for (sql, id) in &self.statements {
            let Some(statement) = registry.statement_mut(*id) else {
                failure = Some(SqlshapeError::assertion(format!(
                    "Batch statement {:?} is no longer registered",
                    id
                )));
                break;
            };
            if let Err(e) = op(statement) {
                failure = Some(exceptions.convert(e, context, Some(sql.as_str())));
                break;
            }
        }
        match failure {
            Some(err) => {
                self.release_statements(registry);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Close every batch statement and discard anything still queued.
    pub fn release_statements(&mut self, registry: &mut ResourceRegistry) {
        for (_, id) in self.statements.drain(..) {
            registry.release_statement(id);
        }
        self.position = 0;
    }
}
