//! Driver doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sqlshape::jdbc::{
    Cancel, Connection, ConnectionProvider, ResultSet, SqlError, SqlResult, Statement,
    StatementKind,
};

/// Counters observed by the tests.
#[derive(Debug, Default)]
pub struct Events {
    pub opened: AtomicUsize,
    pub provider_closed: AtomicUsize,
    pub statements_closed: AtomicUsize,
    pub result_sets_closed: AtomicUsize,
    pub cancels: AtomicUsize,
    pub updates: AtomicUsize,
    pub batched: AtomicUsize,
    pub auto_commit: AtomicBool,
}

impl Events {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct Provider(pub Arc<Events>);

impl ConnectionProvider for Provider {
    fn get_connection(&self) -> SqlResult<Box<dyn Connection>> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection(self.0.clone())))
    }

    fn close_connection(&self, _connection: Box<dyn Connection>) -> SqlResult<()> {
        self.0.provider_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnection(pub Arc<Events>);

impl Connection for FakeConnection {
    fn prepare_statement(&mut self, sql: &str, _kind: StatementKind) -> SqlResult<Box<dyn Statement>> {
        if sql.contains("syntax error") {
            return Err(SqlError::new(Some("42601"), 7, "syntax error at or near \"error\""));
        }
        Ok(Box::new(FakeStatement {
            events: self.0.clone(),
            queued: 0,
        }))
    }

    fn auto_commit(&self) -> SqlResult<bool> {
        Ok(self.0.auto_commit.load(Ordering::SeqCst))
    }
}

pub struct FakeStatement {
    events: Arc<Events>,
    queued: usize,
}

impl Statement for FakeStatement {
    fn execute_query(&mut self) -> SqlResult<Box<dyn ResultSet>> {
        Ok(Box::new(FakeResultSet(self.events.clone())))
    }

    fn execute_update(&mut self) -> SqlResult<u64> {
        self.events.updates.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    fn add_batch(&mut self) -> SqlResult<()> {
        self.queued += 1;
        Ok(())
    }

    fn execute_batch(&mut self) -> SqlResult<Vec<u64>> {
        let queued = std::mem::take(&mut self.queued);
        self.events.batched.fetch_add(queued, Ordering::SeqCst);
        Ok(vec![1; queued])
    }

    fn set_query_timeout(&mut self, _seconds: u32) -> SqlResult<()> {
        Ok(())
    }

    fn canceller(&self) -> Arc<dyn Cancel> {
        Arc::new(FakeCancel(self.events.clone()))
    }

    fn close(&mut self) -> SqlResult<()> {
        self.events.statements_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeResultSet(Arc<Events>);

impl ResultSet for FakeResultSet {
    fn close(&mut self) -> SqlResult<()> {
        self.0.result_sets_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeCancel(Arc<Events>);

impl Cancel for FakeCancel {
    fn cancel(&self) -> SqlResult<()> {
        self.0.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
