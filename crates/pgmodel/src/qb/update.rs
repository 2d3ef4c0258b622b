//! UPDATE statement builder.

use crate::changeset::ChangeSet;
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

/// UPDATE builder for the table of `R`.
///
/// WHERE and CTE arguments are bound as they are added and take `$1..$K`;
/// the SET arguments are allocated at render time and follow them.
pub struct UpdateQb<R: Record> {
    conn: Option<Arc<dyn Connection>>,
    changes: ChangeSet<R>,
    ctes: Ctes,
    conditions: Conditions,
    params: Params,
    returning: Vec<String>,
    build_error: Option<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> UpdateQb<R> {
    pub(crate) fn new(conn: Option<Arc<dyn Connection>>, changes: ChangeSet<R>) -> Self {
        Self::from_select(
            conn,
            Ctes::default(),
            Conditions::new(),
            Params::new(),
            None,
            changes,
        )
    }

    pub(crate) fn from_select(
        conn: Option<Arc<dyn Connection>>,
        ctes: Ctes,
        conditions: Conditions,
        params: Params,
        build_error: Option<String>,
        changes: ChangeSet<R>,
    ) -> Self {
        Self {
            conn,
            changes,
            ctes,
            conditions,
            params,
            returning: Vec::new(),
            build_error,
            _record: PhantomData,
        }
    }

    /// The change set being written.
    pub fn changes(&self) -> &ChangeSet<R> {
        &self.changes
    }

    /// Merge more changes into SET (last write wins).
    pub fn set(mut self, changes: ChangeSet<R>) -> Self {
        self.changes = std::mem::take(&mut self.changes).merged_with(changes);
        self
    }

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &[&str]) -> Self {
        self.returning = cols.iter().map(|c| c.to_string()).collect();
        self
    }
}

where_methods!(UpdateQb);
cte_methods!(UpdateQb);

impl<R: Record> SqlQb for UpdateQb<R> {
    fn render(&self) -> (String, Vec<Value>) {
        let mut params = self.params.clone();
        let assignments = self.changes.render_update(&mut params);

        let mut sql = String::new();
        self.ctes.write_prefix(&mut sql);
        sql.push_str("UPDATE ");
        sql.push_str(R::schema().table_name());
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));
        self.conditions.write_clause(&mut sql, "WHERE");

        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning.join(", "));
        }
        (sql, params.into_vec())
    }

    fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.conn.as_ref()
    }

    fn validate(&self) -> OrmResult<()> {
        if let Some(err) = &self.build_error {
            return Err(OrmError::validation(err.clone()));
        }
        self.changes.check()?;
        if self.changes.is_empty() {
            return Err(OrmError::validation("UPDATE requires at least one SET value"));
        }
        Ok(())
    }
}

impl<R: Record> Clone for UpdateQb<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            changes: self.changes.clone(),
            ctes: self.ctes.clone(),
            conditions: self.conditions.clone(),
            params: self.params.clone(),
            returning: self.returning.clone(),
            build_error: self.build_error.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for UpdateQb<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, args) = self.render();
        f.debug_struct("UpdateQb")
            .field("sql", &sql)
            .field("args", &args)
            .finish()
    }
}
