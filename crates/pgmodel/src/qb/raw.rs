//! Hand-written SQL statements.

use crate::client::Connection;
use crate::qb::traits::SqlQb;
use crate::value::{ToValue, Value};
use std::fmt;
use std::sync::Arc;

/// Caller-written SQL with `$1..$N` arguments.
///
/// Executes like any builder and can serve as a CTE body.
///
/// ```ignore
/// let total: i64 = RawSql::new("SELECT COUNT(*) FROM users WHERE status = $1")
///     .bind("active")
///     .fetch_on(&conn)
///     .await?;
/// ```
#[derive(Clone)]
pub struct RawSql {
    sql: String,
    args: Vec<Value>,
    conn: Option<Arc<dyn Connection>>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            conn: None,
        }
    }

    /// Replace the argument list.
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one argument.
    pub fn bind(mut self, value: impl ToValue) -> Self {
        self.args.push(value.to_value());
        self
    }

    /// Run on `conn` when executed without an explicit connection.
    pub fn with_conn(mut self, conn: Arc<dyn Connection>) -> Self {
        self.conn = Some(conn);
        self
    }

    pub(crate) fn with_conn_opt(mut self, conn: Option<Arc<dyn Connection>>) -> Self {
        self.conn = conn;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arguments(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Debug for RawSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSql")
            .field("sql", &self.sql)
            .field("args", &self.args)
            .field("bound", &self.conn.is_some())
            .finish()
    }
}

impl SqlQb for RawSql {
    fn render(&self) -> (String, Vec<Value>) {
        (self.sql.clone(), self.args.clone())
    }

    fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.conn.as_ref()
    }
}
