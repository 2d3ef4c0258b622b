//! Transaction options and the transaction coordinator.
//!
//! [`transaction`] runs a unit of work on a fresh transaction and commits it on
//! `Ok`, rolls it back on `Err` or panic.
//!
//! # Example
//!
//! ```ignore
//! use pgmodel::{transaction, TransactionOptions, TransactionIsolation};
//!
//! let opts = TransactionOptions::new().isolation_level(TransactionIsolation::Serializable);
//! let moved = transaction(&conn, opts, |tx| {
//!     Box::pin(async move {
//!         accounts.update(debit).where_sql("id = $1", args![1]).execute_on(tx).await?;
//!         accounts.update(credit).where_sql("id = $1", args![2]).execute_on(tx).await
//!     })
//! })
//! .await?;
//! ```

use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for savepoint names of nested transactions.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("pgmodel_sp_{n}")
}

/// Transaction isolation level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionIsolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for TransactionIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        })
    }
}

/// Options applied when a transaction begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    isolation_level: Option<TransactionIsolation>,
    read_only: Option<bool>,
    deferrable: Option<bool>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: TransactionIsolation) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Only meaningful for `SERIALIZABLE READ ONLY` transactions.
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// The `BEGIN` statement for these options.
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation_level {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(&level.to_string());
        }
        match self.read_only {
            Some(true) => sql.push_str(" READ ONLY"),
            Some(false) => sql.push_str(" READ WRITE"),
            None => {}
        }
        match self.deferrable {
            Some(true) => sql.push_str(" DEFERRABLE"),
            Some(false) => sql.push_str(" NOT DEFERRABLE"),
            None => {}
        }
        sql
    }
}

/// Run `work` inside a transaction on `conn`.
///
/// - `Ok` commits; a commit failure is returned as-is.
/// - `Err` rolls back and returns the error. If the rollback fails too the
///   result is [`OrmError::RollbackFailed`] carrying both errors.
/// - A panic inside `work` is caught, the transaction is rolled back and the
///   panic is reported as [`OrmError::Panic`].
///
/// Exactly one of commit or rollback is attempted.
pub async fn transaction<T, F>(conn: &dyn Connection, options: TransactionOptions, work: F) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t dyn Connection) -> BoxFuture<'t, OrmResult<T>>,
{
    let tx = conn.begin_tx(options).await?;
    tracing::debug!(target: "pgmodel.tx", begin = %options.begin_sql(), "transaction started");

    let outcome = AssertUnwindSafe(async { work(&*tx).await })
        .catch_unwind()
        .await;

    let error = match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            tracing::debug!(target: "pgmodel.tx", "transaction committed");
            return Ok(value);
        }
        Ok(Err(error)) => error,
        Err(payload) => OrmError::Panic(panic_message(&*payload)),
    };

    match tx.rollback().await {
        Ok(()) => {
            tracing::debug!(target: "pgmodel.tx", error = %error, "transaction rolled back");
            Err(error)
        }
        Err(rollback) => {
            tracing::warn!(
                target: "pgmodel.tx",
                error = %error,
                rollback_error = %rollback,
                "transaction rollback failed"
            );
            Err(OrmError::rollback_failed(error, rollback))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
