// crates/shard-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Shard Cluster
// Description: Deterministic in-process connection factory with fault injection.
// Purpose: Exercise coordinator and load-generator semantics without a server.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryShardCluster`] stands in for a set of shard databases. It keeps
//! committed scripts and rows per shard, buffers transactional work until
//! commit, and counts opened/closed connections and open transactions so
//! tests can assert that nothing leaks. Failures can be injected per shard
//! (connect, execute, commit, close) or per SQL substring.
//!
//! The cluster speaks the `PostgreSQL` dialect for statement rendering but
//! does not parse SQL: batches are logged verbatim and parameterized inserts
//! are stored keyed by their first parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::core::ShardDescriptor;
use crate::core::ShardKey;
use crate::core::SqlDialect;
use crate::interfaces::ConnectPolicy;
use crate::interfaces::ConnectionFactory;
use crate::interfaces::ShardConnection;
use crate::interfaces::ShardDbError;
use crate::interfaces::ShardRow;
use crate::interfaces::SqlParam;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Stored row: column values keyed by the row id.
type RowTable = BTreeMap<String, Vec<Option<String>>>;

/// Mutable cluster state shared by the factory and its connections.
#[derive(Debug, Default)]
struct ClusterState {
    /// Connections opened successfully.
    opened: usize,
    /// Connections closed.
    closed: usize,
    /// Transactions currently open.
    open_transactions: usize,
    /// Remaining injected connect failures per shard.
    connect_failures: BTreeMap<ShardKey, u32>,
    /// Shards whose statements fail.
    execute_failures: BTreeSet<ShardKey>,
    /// Shards whose commits fail.
    commit_failures: BTreeSet<ShardKey>,
    /// Shards whose close fails.
    close_failures: BTreeSet<ShardKey>,
    /// SQL substrings that fail on every shard.
    failing_patterns: Vec<String>,
    /// Committed batch scripts per shard.
    committed: BTreeMap<ShardKey, Vec<String>>,
    /// Committed rows per shard.
    rows: BTreeMap<ShardKey, RowTable>,
}

impl ClusterState {
    /// Returns the injected statement failure for `key` and `sql`, if any.
    fn statement_failure(&self, key: ShardKey, sql: &str) -> Option<ShardDbError> {
        if self.execute_failures.contains(&key) {
            return Some(ShardDbError::Execute(format!("injected failure on shard {key}")));
        }
        self.failing_patterns
            .iter()
            .find(|pattern| sql.contains(pattern.as_str()))
            .map(|pattern| ShardDbError::Execute(format!("statement matched failing pattern '{pattern}'")))
    }
}

// ============================================================================
// SECTION: Cluster
// ============================================================================

/// In-memory connection factory for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShardCluster {
    /// Shared cluster state.
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryShardCluster {
    /// Creates an empty cluster with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every connection attempt to `key` fail.
    pub fn fail_connect(&self, key: ShardKey) {
        self.fail_connect_times(key, u32::MAX);
    }

    /// Makes the next `times` connection attempts to `key` fail.
    pub fn fail_connect_times(&self, key: ShardKey, times: u32) {
        self.lock().connect_failures.insert(key, times);
    }

    /// Makes every statement on `key` fail.
    pub fn fail_execute(&self, key: ShardKey) {
        self.lock().execute_failures.insert(key);
    }

    /// Makes every commit on `key` fail.
    pub fn fail_commit(&self, key: ShardKey) {
        self.lock().commit_failures.insert(key);
    }

    /// Makes every close on `key` report a failure.
    pub fn fail_close(&self, key: ShardKey) {
        self.lock().close_failures.insert(key);
    }

    /// Makes any statement containing `pattern` fail on every shard.
    pub fn fail_sql_containing(&self, pattern: impl Into<String>) {
        self.lock().failing_patterns.push(pattern.into());
    }

    /// Connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Connections closed so far.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Transactions currently open.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.lock().open_transactions
    }

    /// Batch scripts committed on `key`, in commit order.
    #[must_use]
    pub fn committed_scripts(&self, key: ShardKey) -> Vec<String> {
        self.lock().committed.get(&key).cloned().unwrap_or_default()
    }

    /// Rows committed on `key`.
    #[must_use]
    pub fn row_count(&self, key: ShardKey) -> usize {
        self.lock().rows.get(&key).map_or(0, BTreeMap::len)
    }

    /// Rows committed across every shard.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.lock().rows.values().map(BTreeMap::len).sum()
    }

    /// Returns true when the row with id `id` is committed on `key`.
    #[must_use]
    pub fn contains_row(&self, key: ShardKey, id: &str) -> bool {
        self.lock().rows.get(&key).is_some_and(|rows| rows.contains_key(id))
    }
}

impl ConnectionFactory for InMemoryShardCluster {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn connect(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        _policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError> {
        let mut state = self.lock();
        if let Some(remaining) = state.connect_failures.get_mut(&key)
            && *remaining > 0
        {
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            return Err(ShardDbError::Connect(format!(
                "injected connect failure for shard {key} ({}:{})",
                descriptor.host, descriptor.port
            )));
        }
        state.opened += 1;
        Ok(Box::new(InMemoryConnection {
            key,
            state: Arc::clone(&self.state),
            in_transaction: false,
            pending_scripts: Vec::new(),
            pending_rows: Vec::new(),
        }))
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// One in-memory session bound to a shard.
struct InMemoryConnection {
    /// Shard this connection talks to.
    key: ShardKey,
    /// Shared cluster state.
    state: Arc<Mutex<ClusterState>>,
    /// Whether a transaction is open.
    in_transaction: bool,
    /// Scripts buffered until commit.
    pending_scripts: Vec<String>,
    /// Rows buffered until commit.
    pending_rows: Vec<(String, Vec<Option<String>>)>,
}

impl InMemoryConnection {
    /// Locks the shared state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops buffered work and marks the transaction finished.
    fn end_transaction(&mut self) {
        if self.in_transaction {
            self.in_transaction = false;
            self.pending_scripts.clear();
            self.pending_rows.clear();
            let mut state = self.lock();
            state.open_transactions = state.open_transactions.saturating_sub(1);
        }
    }
}

/// Renders a parameter as stored text.
fn param_text(param: &SqlParam) -> String {
    match param {
        SqlParam::Text(value) => value.clone(),
        SqlParam::Uuid(value) => value.hyphenated().to_string(),
    }
}

impl ShardConnection for InMemoryConnection {
    fn begin(&mut self) -> Result<(), ShardDbError> {
        if self.in_transaction {
            return Err(ShardDbError::Execute("transaction already open".to_string()));
        }
        self.in_transaction = true;
        self.lock().open_transactions += 1;
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError> {
        let key = self.key;
        let mut state = self.lock();
        if let Some(err) = state.statement_failure(key, sql) {
            return Err(err);
        }
        if self.in_transaction {
            drop(state);
            self.pending_scripts.push(sql.to_string());
        } else {
            state.committed.entry(key).or_default().push(sql.to_string());
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError> {
        let key = self.key;
        let mut state = self.lock();
        if let Some(err) = state.statement_failure(key, sql) {
            return Err(err);
        }
        let Some(id) = params.first().map(param_text) else {
            return Err(ShardDbError::Execute("statement requires an id parameter".to_string()));
        };
        let duplicate = state.rows.get(&key).is_some_and(|rows| rows.contains_key(&id))
            || self.pending_rows.iter().any(|(pending, _)| *pending == id);
        if duplicate {
            return Err(ShardDbError::Execute(format!("duplicate key value {id}")));
        }
        let mut columns = vec![Some(id.clone())];
        columns.extend(params.iter().skip(1).map(|param| Some(param_text(param))));
        columns.push(Some("1970-01-01 00:00:00+00".to_string()));
        if self.in_transaction {
            drop(state);
            self.pending_rows.push((id, columns));
        } else {
            state.rows.entry(key).or_default().insert(id, columns);
        }
        Ok(1)
    }

    fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError> {
        let state = self.lock();
        if let Some(err) = state.statement_failure(self.key, sql) {
            return Err(ShardDbError::Query(err.to_string()));
        }
        let Some(id) = params.first().map(param_text) else {
            return Ok(None);
        };
        let committed = state.rows.get(&self.key).and_then(|rows| rows.get(&id)).cloned();
        let pending = || {
            self.pending_rows
                .iter()
                .find(|(pending, _)| *pending == id)
                .map(|(_, columns)| columns.clone())
        };
        Ok(committed.or_else(pending).map(|columns| ShardRow {
            columns,
        }))
    }

    fn commit(&mut self) -> Result<(), ShardDbError> {
        if !self.in_transaction {
            return Err(ShardDbError::Commit("no transaction is open".to_string()));
        }
        let key = self.key;
        let fails = self.lock().commit_failures.contains(&key);
        if fails {
            self.end_transaction();
            return Err(ShardDbError::Commit(format!("injected commit failure on shard {key}")));
        }
        let scripts = std::mem::take(&mut self.pending_scripts);
        let rows = std::mem::take(&mut self.pending_rows);
        {
            let mut state = self.lock();
            state.committed.entry(key).or_default().extend(scripts);
            state.rows.entry(key).or_default().extend(rows);
        }
        self.end_transaction();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ShardDbError> {
        self.end_transaction();
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), ShardDbError> {
        self.end_transaction();
        let key = self.key;
        let mut state = self.lock();
        state.closed += 1;
        if state.close_failures.contains(&key) {
            return Err(ShardDbError::Close(format!("injected close failure on shard {key}")));
        }
        Ok(())
    }
}
