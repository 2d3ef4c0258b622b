//! DELETE statement builder.

use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::condition::{Conditions, where_methods};
use crate::qb::cte::{Ctes, cte_methods};
use crate::qb::params::Params;
use crate::qb::traits::SqlQb;
use crate::schema::Record;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// DELETE builder for the table of `R`.
///
/// A DELETE without conditions removes every row; nothing guards against it.
pub struct DeleteQb<R: Record> {
    conn: Option<Arc<dyn Connection>>,
    ctes: Ctes,
    using: Vec<String>,
    conditions: Conditions,
    params: Params,
    returning: Vec<String>,
    build_error: Option<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> DeleteQb<R> {
    pub(crate) fn new(conn: Option<Arc<dyn Connection>>) -> Self {
        Self::from_select(conn, Ctes::default(), Conditions::new(), Params::new(), None)
    }

    pub(crate) fn from_select(
        conn: Option<Arc<dyn Connection>>,
        ctes: Ctes,
        conditions: Conditions,
        params: Params,
        build_error: Option<String>,
    ) -> Self {
        Self {
            conn,
            ctes,
            using: Vec::new(),
            conditions,
            params,
            returning: Vec::new(),
            build_error,
            _record: PhantomData,
        }
    }

    /// Add USING items (`DELETE FROM t USING a, b`).
    pub fn using(mut self, items: &[&str]) -> Self {
        self.using.extend(items.iter().map(|i| i.to_string()));
        self
    }

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &[&str]) -> Self {
        self.returning = cols.iter().map(|c| c.to_string()).collect();
        self
    }
}

where_methods!(DeleteQb);
cte_methods!(DeleteQb);

impl<R: Record> SqlQb for DeleteQb<R> {
    fn render(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        self.ctes.write_prefix(&mut sql);
        sql.push_str("DELETE FROM ");
        sql.push_str(R::schema().table_name());
        if !self.using.is_empty() {
            sql.push_str(" USING ");
            sql.push_str(&self.using.join(", "));
        }
        self.conditions.write_clause(&mut sql, "WHERE");

        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }
        (sql, self.params.as_slice().to_vec())
    }

    fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.conn.as_ref()
    }

    fn validate(&self) -> OrmResult<()> {
        match &self.build_error {
            Some(err) => Err(OrmError::validation(err.clone())),
            None => Ok(()),
        }
    }
}

impl<R: Record> Clone for DeleteQb<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            ctes: self.ctes.clone(),
            using: self.using.clone(),
            conditions: self.conditions.clone(),
            params: self.params.clone(),
            returning: self.returning.clone(),
            build_error: self.build_error.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for DeleteQb<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, args) = self.render();
        f.debug_struct("DeleteQb")
            .field("sql", &sql)
            .field("args", &args)
            .finish()
    }
}
