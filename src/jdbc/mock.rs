//! In-memory driver doubles for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::{Cancel, Connection, ConnectionProvider, ResultSet, SqlError, SqlResult, Statement, StatementKind};

#[derive(Debug, Default)]
struct ProbeState {
    opened_connections: usize,
    closed_connections: usize,
    closed_statements: usize,
    closed_result_sets: usize,
    cancels: usize,
    prepared: Vec<String>,
    query_timeouts: Vec<u32>,
    updates: usize,
    batch_sizes: Vec<usize>,
    auto_commit: bool,
    fail_close: bool,
    fail_cancel: bool,
    fail_prepare: bool,
}

/// Shared record of everything the doubles were asked to do.
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Mutex<ProbeState>>);

impl Probe {
    fn with<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn opened_connections(&self) -> usize {
        self.with(|s| s.opened_connections)
    }

    pub fn closed_connections(&self) -> usize {
        self.with(|s| s.closed_connections)
    }

    pub fn closed_statements(&self) -> usize {
        self.with(|s| s.closed_statements)
    }

    pub fn closed_result_sets(&self) -> usize {
        self.with(|s| s.closed_result_sets)
    }

    pub fn cancels(&self) -> usize {
        self.with(|s| s.cancels)
    }

    pub fn prepared(&self) -> Vec<String> {
        self.with(|s| s.prepared.clone())
    }

    pub fn query_timeouts(&self) -> Vec<u32> {
        self.with(|s| s.query_timeouts.clone())
    }

    pub fn updates(&self) -> usize {
        self.with(|s| s.updates)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.with(|s| s.batch_sizes.clone())
    }

    pub fn set_auto_commit(&self, value: bool) {
        self.with(|s| s.auto_commit = value);
    }

    pub fn fail_close(&self, value: bool) {
        self.with(|s| s.fail_close = value);
    }

    pub fn fail_cancel(&self, value: bool) {
        self.with(|s| s.fail_cancel = value);
    }

    pub fn fail_prepare(&self, value: bool) {
        self.with(|s| s.fail_prepare = value);
    }
}

pub struct MockProvider {
    probe: Probe,
}

impl MockProvider {
    pub fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl ConnectionProvider for MockProvider {
    fn get_connection(&self) -> SqlResult<Box<dyn Connection>> {
        self.probe.with(|s| s.opened_connections += 1);
        Ok(Box::new(MockConnection::new(self.probe.clone())))
    }

    fn close_connection(&self, _connection: Box<dyn Connection>) -> SqlResult<()> {
        self.probe.with(|s| s.closed_connections += 1);
        Ok(())
    }
}

pub struct MockConnection {
    probe: Probe,
}

impl MockConnection {
    pub fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl Connection for MockConnection {
    fn prepare_statement(&mut self, sql: &str, _kind: StatementKind) -> SqlResult<Box<dyn Statement>> {
        let fail = self.probe.with(|s| {
            s.prepared.push(sql.to_string());
            s.fail_prepare
        });
        if fail {
            return Err(SqlError::new(Some("42000"), 1064, "syntax error"));
        }
        Ok(Box::new(MockStatement::new(self.probe.clone())))
    }

    fn auto_commit(&self) -> SqlResult<bool> {
        Ok(self.probe.with(|s| s.auto_commit))
    }
}

pub struct MockStatement {
    probe: Probe,
    queued: usize,
}

impl MockStatement {
    pub fn new(probe: Probe) -> Self {
        Self { probe, queued: 0 }
    }
}

impl Statement for MockStatement {
    fn execute_query(&mut self) -> SqlResult<Box<dyn ResultSet>> {
        Ok(Box::new(MockResultSet::new(self.probe.clone())))
    }

    fn execute_update(&mut self) -> SqlResult<u64> {
        self.probe.with(|s| s.updates += 1);
        Ok(1)
    }

    fn add_batch(&mut self) -> SqlResult<()> {
        self.queued += 1;
        Ok(())
    }

    fn execute_batch(&mut self) -> SqlResult<Vec<u64>> {
        let queued = std::mem::take(&mut self.queued);
        self.probe.with(|s| s.batch_sizes.push(queued));
        Ok(vec![1; queued])
    }

    fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()> {
        self.probe.with(|s| s.query_timeouts.push(seconds));
        Ok(())
    }

    fn canceller(&self) -> Arc<dyn Cancel> {
        Arc::new(MockCanceller {
            probe: self.probe.clone(),
        })
    }

    fn close(&mut self) -> SqlResult<()> {
        let fail = self.probe.with(|s| {
            s.closed_statements += 1;
            s.fail_close
        });
        if fail {
            return Err(SqlError::new(Some("HY000"), 0, "statement close failed"));
        }
        Ok(())
    }
}

pub struct MockResultSet {
    probe: Probe,
}

impl MockResultSet {
    pub fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl ResultSet for MockResultSet {
    fn close(&mut self) -> SqlResult<()> {
        let fail = self.probe.with(|s| {
            s.closed_result_sets += 1;
            s.fail_close
        });
        if fail {
            return Err(SqlError::new(Some("HY000"), 0, "result set close failed"));
        }
        Ok(())
    }
}

struct MockCanceller {
    probe: Probe,
}

impl Cancel for MockCanceller {
    fn cancel(&self) -> SqlResult<()> {
        let fail = self.probe.with(|s| {
            s.cancels += 1;
            s.fail_cancel
        });
        if fail {
            return Err(SqlError::new(Some("HY008"), 0, "cancel failed"));
        }
        Ok(())
    }
}
