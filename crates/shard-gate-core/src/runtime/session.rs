// crates/shard-gate-core/src/runtime/session.rs
// ============================================================================
// Module: Transaction Session
// Description: Scoped ownership of one shard connection and its transaction.
// Purpose: Guarantee rollback and close on every exit path.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! A [`TransactionSession`] owns exactly one [`ShardConnection`] and tracks
//! whether a transaction is open on it. [`TransactionSession::close`] releases
//! the connection explicitly; if the session is dropped instead (early
//! return, `?`, panic unwinding) the `Drop` impl rolls back any open
//! transaction and closes the connection, reporting failures to the event
//! sink. Either way the connection is closed exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ShardDescriptor;
use crate::core::ShardKey;
use crate::interfaces::ConnectPolicy;
use crate::interfaces::ConnectionFactory;
use crate::interfaces::EventSink;
use crate::interfaces::GateEvent;
use crate::interfaces::ShardConnection;
use crate::interfaces::ShardDbError;
use crate::interfaces::ShardRow;
use crate::interfaces::SqlParam;

// ============================================================================
// SECTION: Session
// ============================================================================

/// One open shard connection with an optional open transaction.
///
/// # Invariants
/// - `connection` is `Some` until the session is closed or dropped.
/// - `in_transaction` is true only between a successful `begin` and the
///   following `commit`/`rollback` attempt.
pub struct TransactionSession<'a> {
    /// Shard this session is bound to.
    key: ShardKey,
    /// Owned connection, taken on close.
    connection: Option<Box<dyn ShardConnection>>,
    /// Whether a transaction is currently open.
    in_transaction: bool,
    /// Sink for release failures observed on drop.
    sink: &'a dyn EventSink,
}

impl<'a> TransactionSession<'a> {
    /// Wraps an already-open connection.
    #[must_use]
    pub fn new(
        key: ShardKey,
        connection: Box<dyn ShardConnection>,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            key,
            connection: Some(connection),
            in_transaction: false,
            sink,
        }
    }

    /// Opens a connection through `factory`, retrying connection failures up
    /// to `policy.connect_retries` additional times.
    ///
    /// # Errors
    ///
    /// Returns the last [`ShardDbError`] when every attempt fails.
    pub fn open(
        factory: &dyn ConnectionFactory,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
        sink: &'a dyn EventSink,
    ) -> Result<Self, ShardDbError> {
        let mut attempt: u32 = 1;
        loop {
            match factory.connect(key, descriptor, policy) {
                Ok(connection) => return Ok(Self::new(key, connection, sink)),
                Err(err) if attempt <= policy.connect_retries => {
                    sink.record(&GateEvent::ConnectRetry {
                        shard_key: key,
                        attempt,
                        error: err.to_string(),
                    });
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns the shard key this session is bound to.
    #[must_use]
    pub const fn key(&self) -> ShardKey {
        self.key
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when the driver rejects the begin.
    pub fn begin(&mut self) -> Result<(), ShardDbError> {
        self.connection_mut()?.begin()?;
        self.in_transaction = true;
        Ok(())
    }

    /// Executes a statement batch.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError> {
        self.connection_mut()?.execute_batch(sql)
    }

    /// Executes a parameterized statement.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when the statement fails.
    pub fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError> {
        self.connection_mut()?.execute(sql, params)
    }

    /// Runs a parameterized query and returns its first row.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when the query fails.
    pub fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError> {
        self.connection_mut()?.query_opt(sql, params)
    }

    /// Commits the open transaction. The transaction counts as finished
    /// whether or not the commit succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when the commit fails.
    pub fn commit(&mut self) -> Result<(), ShardDbError> {
        let result = self.connection_mut()?.commit();
        self.in_transaction = false;
        result
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError`] when the rollback fails.
    pub fn rollback(&mut self) -> Result<(), ShardDbError> {
        let result = self.connection_mut()?.rollback();
        self.in_transaction = false;
        result
    }

    /// Rolls back any open transaction and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the close error, or the rollback error when only the rollback
    /// failed.
    pub fn close(mut self) -> Result<(), ShardDbError> {
        self.release()
    }

    /// Shared release path for `close` and `Drop`.
    fn release(&mut self) -> Result<(), ShardDbError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        let rollback = if self.in_transaction {
            self.in_transaction = false;
            connection.rollback()
        } else {
            Ok(())
        };
        connection.close()?;
        rollback
    }

    /// Returns the live connection.
    fn connection_mut(&mut self) -> Result<&mut Box<dyn ShardConnection>, ShardDbError> {
        self.connection
            .as_mut()
            .ok_or_else(|| ShardDbError::Execute(format!("session for shard {} is closed", self.key)))
    }
}

impl Drop for TransactionSession<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            self.sink.record(&GateEvent::CloseFailed {
                shard_key: self.key,
                error: err.to_string(),
            });
        }
    }
}
