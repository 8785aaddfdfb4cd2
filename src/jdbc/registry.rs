use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::debug;

use super::exception::SqlExceptionHelper;
use super::{Cancel, ResultSet, SqlResult, Statement};

/// Opaque handle to a registered statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementId(u64);

/// Opaque handle to a registered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultSetId(u64);

struct StatementEntry {
    statement: Box<dyn Statement>,
    sql: CompactString,
    /// Result sets produced by this statement and not yet released.
    result_sets: SmallVec<[ResultSetId; 2]>,
}

struct ResultSetEntry {
    result_set: Box<dyn ResultSet>,
    owner: Option<StatementId>,
}

/// Shared reference to the statement most recently executed as a query.
///
/// This is the only part of the registry that may be touched from another
/// thread, e.g. a reaper enforcing a timeout. Cancelling takes the reference
/// out before calling the driver, so it is cleared whether or not the cancel
/// succeeds and a second cancel is a no-op.
#[derive(Clone, Default)]
pub struct CancelHandle {
    last_query: Arc<Mutex<Option<(StatementId, Arc<dyn Cancel>)>>>,
}

impl CancelHandle {
    fn set(&self, id: StatementId, canceller: Arc<dyn Cancel>) {
        *self.lock() = Some((id, canceller));
    }

    fn clear(&self) {
        self.lock().take();
    }

    fn clear_if(&self, id: StatementId) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|(last, _)| *last == id) {
            guard.take();
        }
    }

    pub fn last_query(&self) -> Option<StatementId> {
        self.lock().as_ref().map(|(id, _)| *id)
    }

    /// Cancel the last query, if any. Returns whether there was one.
    pub fn cancel(&self) -> SqlResult<bool> {
        let taken = self.lock().take();
        match taken {
            Some((id, canceller)) => {
                debug!("Cancelling last query {:?}", id);
                canceller.cancel().map(|()| true)
            }
            None => Ok(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(StatementId, Arc<dyn Cancel>)>> {
        self.last_query.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("last_query", &self.last_query())
            .finish()
    }
}

/// Tracks the statements and result sets opened on one logical connection.
///
/// Resources live in an arena keyed by ids; a statement keeps the ids of its
/// result sets, and result sets without an owner are kept in a separate set.
/// The registry is owned by a single thread. Bulk release iterates over a
/// snapshot of the ids, so releasing never observes a map it is mutating.
pub struct ResourceRegistry {
    next_id: u64,
    statements: BTreeMap<StatementId, StatementEntry>,
    result_sets: BTreeMap<ResultSetId, ResultSetEntry>,
    unassociated: BTreeSet<ResultSetId>,
    last_query: CancelHandle,
    exceptions: SqlExceptionHelper,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            statements: BTreeMap::new(),
            result_sets: BTreeMap::new(),
            unassociated: BTreeSet::new(),
            last_query: CancelHandle::default(),
            exceptions: SqlExceptionHelper,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register_statement(&mut self, statement: Box<dyn Statement>, sql: &str) -> StatementId {
        let id = StatementId(self.next_id());
        debug!("Registering statement {:?}", id);
        self.statements.insert(
            id,
            StatementEntry {
                statement,
                sql: CompactString::new(sql),
                result_sets: SmallVec::new(),
            },
        );
        id
    }

    /// Register a result set under its owning statement. An owner that is
    /// not registered is logged and the result set is kept unassociated.
    pub fn register_result_set(
        &mut self,
        result_set: Box<dyn ResultSet>,
        owner: Option<StatementId>,
    ) -> ResultSetId {
        let id = ResultSetId(self.next_id());
        let owner = match owner {
            Some(statement) => match self.statements.get_mut(&statement) {
                Some(entry) => {
                    entry.result_sets.push(id);
                    Some(statement)
                }
                None => {
                    debug!("Result set owner {:?} was not registered", statement);
                    None
                }
            },
            None => None,
        };
        if owner.is_none() {
            self.unassociated.insert(id);
        }
        debug!("Registering result set {:?} (owner {:?})", id, owner);
        self.result_sets.insert(id, ResultSetEntry { result_set, owner });
        id
    }

    pub fn statement_mut(&mut self, id: StatementId) -> Option<&mut (dyn Statement + 'static)> {
        match self.statements.get_mut(&id) {
            Some(entry) => Some(entry.statement.as_mut()),
            None => None,
        }
    }

    pub fn result_set_mut(&mut self, id: ResultSetId) -> Option<&mut (dyn ResultSet + 'static)> {
        match self.result_sets.get_mut(&id) {
            Some(entry) => Some(entry.result_set.as_mut()),
            None => None,
        }
    }

    /// The SQL a statement was prepared with.
    pub fn sql_of(&self, id: StatementId) -> Option<&str> {
        self.statements.get(&id).map(|entry| entry.sql.as_str())
    }

    pub fn contains_statement(&self, id: StatementId) -> bool {
        self.statements.contains_key(&id)
    }

    pub fn contains_result_set(&self, id: ResultSetId) -> bool {
        self.result_sets.contains_key(&id)
    }

    /// Result sets currently registered under `id`.
    pub fn result_sets_of(&self, id: StatementId) -> &[ResultSetId] {
        self.statements
            .get(&id)
            .map(|entry| entry.result_sets.as_slice())
            .unwrap_or_default()
    }

    /// Close and forget a result set. The owning statement stays registered
    /// even when this was its last result set.
    pub fn release_result_set(&mut self, id: ResultSetId) {
        let Some(mut entry) = self.result_sets.remove(&id) else {
            debug!("Result set {:?} was not registered (on release)", id);
            return;
        };
        match entry.owner {
            Some(owner) => {
                if let Some(statement) = self.statements.get_mut(&owner) {
                    statement.result_sets.retain(|rs| *rs != id);
                }
            }
            None => {
                self.unassociated.remove(&id);
            }
        }
        self.close_result_set(id, entry.result_set.as_mut());
    }

    /// Close a statement after closing every result set it still owns.
    pub fn release_statement(&mut self, id: StatementId) {
        let Some(mut entry) = self.statements.remove(&id) else {
            debug!("Statement {:?} was not registered (on release)", id);
            return;
        };
        for rs in entry.result_sets.drain(..) {
            if let Some(mut result_set) = self.result_sets.remove(&rs) {
                self.close_result_set(rs, result_set.result_set.as_mut());
            }
        }
        self.last_query.clear_if(id);
        self.close_statement(id, entry.statement.as_mut());
    }

    /// Release everything: statements (with their result sets) first, then
    /// unassociated result sets.
    pub fn release_resources(&mut self) {
        debug!(
            "Releasing JDBC resources ({} statements, {} unassociated result sets)",
            self.statements.len(),
            self.unassociated.len()
        );
        let statements: Vec<StatementId> = self.statements.keys().copied().collect();
        for id in statements {
            self.release_statement(id);
        }
        let unassociated: Vec<ResultSetId> = self.unassociated.iter().copied().collect();
        for id in unassociated {
            self.release_result_set(id);
        }
        self.last_query.clear();
    }

    pub fn has_registered_resources(&self) -> bool {
        !self.statements.is_empty() || !self.unassociated.is_empty()
    }

    /// Remember `id` as the statement to cancel on `cancel_last_query`.
    pub fn register_last_query(&mut self, id: StatementId) {
        match self.statements.get(&id) {
            Some(entry) => self.last_query.set(id, entry.statement.canceller()),
            None => debug!("Statement {:?} was not registered (on last query)", id),
        }
    }

    pub fn cancel_last_query(&self) -> SqlResult<bool> {
        self.last_query.cancel()
    }

    /// Handle that lets another thread cancel the last query.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.last_query.clone()
    }

    fn close_result_set(&self, id: ResultSetId, result_set: &mut dyn ResultSet) {
        debug!("Closing result set {:?}", id);
        if let Err(e) = result_set.close() {
            self.exceptions.log_cleanup_failure(&e, "result set");
        }
    }

    fn close_statement(&self, id: StatementId, statement: &mut dyn Statement) {
        debug!("Closing statement {:?}", id);
        if let Err(e) = statement.close() {
            self.exceptions.log_cleanup_failure(&e, "statement");
        }
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("statements", &self.statements.len())
            .field("result_sets", &self.result_sets.len())
            .field("unassociated", &self.unassociated.len())
            .field("last_query", &self.last_query)
            .finish()
    }
}
