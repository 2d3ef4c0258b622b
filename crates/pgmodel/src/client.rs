//! The connection abstraction statements execute on.
//!
//! Statements never talk to a driver directly: they hand their SQL and
//! [`Value`] arguments to a [`Connection`]. [`PgConnection`] adapts a
//! `tokio_postgres::Client`; with the `pool` feature a
//! `deadpool_postgres::Pool` is a connection too.

use crate::error::{OrmError, OrmResult};
use crate::row::{Row, from_pg_rows};
use crate::transaction::{TransactionOptions, next_savepoint_name};
use crate::value::Value;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_postgres::types::ToSql;

/// Something statements can run on: a client, a pool, or a transaction.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    /// Execute a query and return the **first** row.
    ///
    /// Returns [`OrmError::NotFound`] when the query yields no rows.
    async fn query_row(&self, sql: &str, args: &[Value]) -> OrmResult<Row> {
        let rows = self.query(sql, args).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("Expected one row, got none"))
    }

    /// Execute a statement and return the number of affected rows.
    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64>;

    /// Start a transaction.
    ///
    /// Calling this on a transaction opens a savepoint instead.
    async fn begin_tx<'a>(&'a self, options: TransactionOptions) -> OrmResult<Box<dyn Transaction + 'a>>;

    /// Rewrite the rendered statement before it is sent.
    ///
    /// Statements render `$N` placeholders; adapters for other placeholder
    /// styles override this. The default passes both through unchanged.
    fn convert_parameters(&self, sql: String, args: Vec<Value>) -> (String, Vec<Value>) {
        (sql, args)
    }
}

/// An open transaction. Exactly one of `commit` / `rollback` should be called.
#[async_trait::async_trait]
pub trait Transaction: Connection {
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

// ==================== tokio-postgres adapter ====================

/// [`Connection`] over a `tokio_postgres::Client`.
///
/// Transactions are issued as `BEGIN` / `COMMIT` / `ROLLBACK` statements and
/// hold the connection until they finish: other calls on the same
/// `PgConnection` wait for them. Inside a transaction, run statements on the
/// transaction handle (`execute_on(tx)`); a call on the connection itself
/// would wait for the transaction it is part of.
///
/// A transaction dropped before it finishes is rolled back before the next
/// statement runs on this connection.
pub struct PgConnection {
    client: tokio_postgres::Client,
    statement_timeout: Option<Duration>,
    gate: tokio::sync::Mutex<()>,
    owed: PendingCleanup,
}

impl PgConnection {
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client,
            statement_timeout: None,
            gate: tokio::sync::Mutex::new(()),
            owed: PendingCleanup::default(),
        }
    }

    /// Fail any single call that takes longer than `timeout` with
    /// [`OrmError::Timeout`].
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// The driver client. Calls made on it directly bypass transaction
    /// ordering.
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    pub fn into_inner(self) -> tokio_postgres::Client {
        self.client
    }
}

impl From<tokio_postgres::Client> for PgConnection {
    fn from(client: tokio_postgres::Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl Connection for PgConnection {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let _gate = self.gate.lock().await;
        self.owed.flush(&self.client).await?;
        with_timeout(self.statement_timeout, pg_query(&self.client, sql, args)).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let _gate = self.gate.lock().await;
        self.owed.flush(&self.client).await?;
        with_timeout(self.statement_timeout, pg_exec(&self.client, sql, args)).await
    }

    async fn begin_tx<'a>(&'a self, options: TransactionOptions) -> OrmResult<Box<dyn Transaction + 'a>> {
        let gate = self.gate.lock().await;
        self.owed.flush(&self.client).await?;
        let parent = Parent::Connection {
            owed: &self.owed,
            _gate: gate,
        };
        let tx = PgTransaction::begin(&self.client, parent, &options, self.statement_timeout).await?;
        Ok(Box::new(tx))
    }
}

/// Rollbacks owed by transactions dropped before they finished. They run
/// before the next statement on the same client.
#[derive(Debug, Default)]
pub(crate) struct PendingCleanup(Mutex<Vec<String>>);

impl PendingCleanup {
    fn defer(&self, sql: String) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(sql);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn flush(&self, client: &tokio_postgres::Client) -> OrmResult<()> {
        for sql in self.take() {
            tracing::debug!(target: "pgmodel.tx", sql = %sql, "cleaning up dropped transaction");
            client.batch_execute(&sql).await?;
        }
        Ok(())
    }
}

/// Access to the underlying driver client of a transaction.
pub(crate) trait PgClientRef: Send + Sync {
    fn pg_client(&self) -> &tokio_postgres::Client;

    /// Clean up after a transaction the client's owner dropped unfinished.
    /// Borrowed clients report through their [`Parent`] instead.
    fn abandon(self, _sql: String)
    where
        Self: Sized,
    {
    }
}

impl PgClientRef for &tokio_postgres::Client {
    fn pg_client(&self) -> &tokio_postgres::Client {
        self
    }
}

/// Where an unfinished transaction leaves its rollback when dropped.
pub(crate) enum Parent<'a> {
    /// Top level on a [`PgConnection`]; holds the connection until dropped.
    Connection {
        owed: &'a PendingCleanup,
        _gate: tokio::sync::MutexGuard<'a, ()>,
    },
    /// Top level on a client the transaction owns.
    Owned,
    /// A savepoint inside another transaction.
    Savepoint(&'a PendingCleanup),
}

/// A transaction (or savepoint) on a tokio-postgres client.
pub(crate) struct PgTransaction<'a, C: PgClientRef> {
    client: Option<C>,
    parent: Parent<'a>,
    savepoint: Option<String>,
    owed: PendingCleanup,
    statement_timeout: Option<Duration>,
    finished: bool,
}

impl<'a, C: PgClientRef> PgTransaction<'a, C> {
    pub(crate) async fn begin(
        client: C,
        parent: Parent<'a>,
        options: &TransactionOptions,
        statement_timeout: Option<Duration>,
    ) -> OrmResult<Self> {
        let mut tx = Self {
            client: Some(client),
            parent,
            savepoint: None,
            owed: PendingCleanup::default(),
            statement_timeout,
            finished: false,
        };
        let began = tx.client()?.batch_execute(&options.begin_sql()).await;
        if let Err(err) = began {
            tx.finished = true;
            return Err(err.into());
        }
        Ok(tx)
    }

    fn client(&self) -> OrmResult<&tokio_postgres::Client> {
        self.client
            .as_ref()
            .map(PgClientRef::pg_client)
            .ok_or_else(|| OrmError::Other("transaction client already released".to_string()))
    }

    /// The client, after rolling back any savepoint dropped inside this
    /// transaction.
    async fn ready(&self) -> OrmResult<&tokio_postgres::Client> {
        let client = self.client()?;
        self.owed.flush(client).await?;
        Ok(client)
    }

    async fn finish(mut self: Box<Self>, commit: bool) -> OrmResult<()> {
        let client = if commit { self.ready().await? } else { self.client()? };
        let sql = match (&self.savepoint, commit) {
            (Some(name), true) => format!("RELEASE SAVEPOINT {name}"),
            (None, true) => "COMMIT".to_string(),
            (savepoint, false) => abandon_sql(savepoint.as_deref()),
        };
        let result = client.batch_execute(&sql).await;
        self.finished = true;
        Ok(result?)
    }
}

fn abandon_sql(savepoint: Option<&str>) -> String {
    match savepoint {
        Some(name) => format!("ROLLBACK TO SAVEPOINT {name}"),
        None => "ROLLBACK".to_string(),
    }
}

impl<C: PgClientRef> Drop for PgTransaction<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match &self.savepoint {
            Some(name) => tracing::warn!(
                target: "pgmodel.tx",
                savepoint = %name,
                "savepoint dropped without release or rollback, rolling back to it"
            ),
            None => tracing::warn!(
                target: "pgmodel.tx",
                "transaction dropped without commit or rollback, rolling back"
            ),
        }
        let sql = abandon_sql(self.savepoint.as_deref());
        match &self.parent {
            Parent::Connection { owed, .. } | Parent::Savepoint(owed) => owed.defer(sql),
            Parent::Owned => {
                if let Some(client) = self.client.take() {
                    client.abandon(sql);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<'a, C: PgClientRef> Connection for PgTransaction<'a, C> {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let client = self.ready().await?;
        with_timeout(self.statement_timeout, pg_query(client, sql, args)).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let client = self.ready().await?;
        with_timeout(self.statement_timeout, pg_exec(client, sql, args)).await
    }

    async fn begin_tx<'b>(&'b self, options: TransactionOptions) -> OrmResult<Box<dyn Transaction + 'b>> {
        if options != TransactionOptions::default() {
            tracing::debug!(
                target: "pgmodel.tx",
                "transaction options are ignored for savepoints"
            );
        }
        let client = self.ready().await?;
        let name = next_savepoint_name();
        let mut savepoint = PgTransaction {
            client: Some(client),
            parent: Parent::Savepoint(&self.owed),
            savepoint: Some(name.clone()),
            owed: PendingCleanup::default(),
            statement_timeout: self.statement_timeout,
            finished: false,
        };
        let began = client.batch_execute(&format!("SAVEPOINT {name}")).await;
        if let Err(err) = began {
            savepoint.finished = true;
            return Err(err.into());
        }
        Ok(Box::new(savepoint))
    }
}

#[async_trait::async_trait]
impl<'a, C: PgClientRef> Transaction for PgTransaction<'a, C> {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.finish(true).await
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.finish(false).await
    }
}

pub(crate) async fn pg_query(
    client: &tokio_postgres::Client,
    sql: &str,
    args: &[Value],
) -> OrmResult<Vec<Row>> {
    let params: Vec<&(dyn ToSql + Sync)> = args.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
    let rows = client.query(sql, &params).await?;
    from_pg_rows(&rows)
}

pub(crate) async fn pg_exec(client: &tokio_postgres::Client, sql: &str, args: &[Value]) -> OrmResult<u64> {
    let params: Vec<&(dyn ToSql + Sync)> = args.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
    Ok(client.execute(sql, &params).await?)
}

pub(crate) async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = OrmResult<T>>,
) -> OrmResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| OrmError::Timeout(limit))?,
        None => fut.await,
    }
}
