#![allow(dead_code)]

use pgmodel::{Connection, OrmError, OrmResult, Row, Transaction, TransactionOptions, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    log: Vec<(String, Vec<Value>)>,
    results: VecDeque<Vec<Row>>,
    affected: u64,
    fail_commit: bool,
    fail_rollback: bool,
}

/// In-memory connection: records every statement and answers queries from a
/// queue of canned results (empty once the queue runs out).
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn Connection> {
        Arc::new(self.clone())
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.lock().unwrap().results.push_back(rows);
    }

    pub fn set_affected(&self, affected: u64) {
        self.state.lock().unwrap().affected = affected;
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    pub fn log(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log().into_iter().map(|(sql, _)| sql).collect()
    }

    fn record(&self, sql: &str, args: &[Value]) {
        self.state
            .lock()
            .unwrap()
            .log
            .push((sql.to_string(), args.to_vec()));
    }
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql, args);
        Ok(self.state.lock().unwrap().results.pop_front().unwrap_or_default())
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.record(sql, args);
        Ok(self.state.lock().unwrap().affected)
    }

    async fn begin_tx<'a>(&'a self, options: TransactionOptions) -> OrmResult<Box<dyn Transaction + 'a>> {
        self.record(&options.begin_sql(), &[]);
        Ok(Box::new(MockTx { conn: self.clone() }))
    }
}

pub struct MockTx {
    conn: MockConnection,
}

#[async_trait::async_trait]
impl Connection for MockTx {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.conn.query(sql, args).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.conn.exec(sql, args).await
    }

    async fn begin_tx<'a>(&'a self, _options: TransactionOptions) -> OrmResult<Box<dyn Transaction + 'a>> {
        Err(OrmError::Other("nested transactions are not mocked".into()))
    }
}

#[async_trait::async_trait]
impl Transaction for MockTx {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.conn.record("COMMIT", &[]);
        if self.conn.state.lock().unwrap().fail_commit {
            return Err(OrmError::Other("commit refused".into()));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.conn.record("ROLLBACK", &[]);
        if self.conn.state.lock().unwrap().fail_rollback {
            return Err(OrmError::Other("connection lost".into()));
        }
        Ok(())
    }
}

pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().copied(), values)
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
