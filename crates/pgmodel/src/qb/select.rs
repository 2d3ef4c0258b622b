//! SELECT statement builder.

use crate::changeset::ChangeSet;
use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::condition::{Conditions, where_methods};
use crate::qb::cte::{Ctes, cte_methods};
use crate::qb::delete::DeleteQb;
use crate::qb::params::Params;
use crate::qb::raw::RawSql;
use crate::qb::traits::SqlQb;
use crate::qb::update::UpdateQb;
use crate::schema::Record;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
struct SelectField {
    expr: String,
    jsonb: bool,
}

/// SELECT builder for the table of `R`.
///
/// Conditions, HAVING and CTEs bind their arguments when they are added, so
/// placeholders follow call order.
pub struct SelectQb<R: Record> {
    conn: Option<Arc<dyn Connection>>,
    fields: Vec<SelectField>,
    from: Vec<String>,
    joins: Vec<String>,
    ctes: Ctes,
    conditions: Conditions,
    group_by: Option<String>,
    having: Conditions,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    params: Params,
    build_error: Option<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> SelectQb<R> {
    /// Select every mapped column: plain columns first, then JSONB groups.
    pub(crate) fn all(conn: Option<Arc<dyn Connection>>) -> Self {
        let schema = R::schema();
        let fields = schema
            .plain_fields()
            .map(|f| SelectField {
                expr: f.column_name().to_string(),
                jsonb: false,
            })
            .chain(schema.jsonb_groups().iter().map(|g| SelectField {
                expr: g.clone(),
                jsonb: true,
            }))
            .collect();
        Self::with_fields(conn, fields)
    }

    /// Select only the given expressions.
    pub(crate) fn only(conn: Option<Arc<dyn Connection>>, exprs: &[&str]) -> Self {
        Self::with_fields(conn, plain_fields(exprs))
    }

    fn with_fields(conn: Option<Arc<dyn Connection>>, fields: Vec<SelectField>) -> Self {
        Self {
            conn,
            fields,
            from: vec![R::schema().table_name().to_string()],
            joins: Vec::new(),
            ctes: Ctes::default(),
            conditions: Conditions::new(),
            group_by: None,
            having: Conditions::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            params: Params::new(),
            build_error: None,
            _record: PhantomData,
        }
    }

    // ==================== SELECT list ====================

    /// Replace the select list.
    pub fn select(mut self, exprs: &[&str]) -> Self {
        self.fields = plain_fields(exprs);
        self
    }

    /// Add expressions to the select list, ahead of any JSONB group columns.
    pub fn add_select(mut self, exprs: &[&str]) -> Self {
        let at = self
            .fields
            .iter()
            .position(|f| f.jsonb)
            .unwrap_or(self.fields.len());
        self.fields.splice(at..at, plain_fields(exprs));
        self
    }

    // ==================== FROM / JOIN ====================

    /// Add another FROM item (`FROM table, item`).
    pub fn from(mut self, item: &str) -> Self {
        self.from.push(item.to_string());
        self
    }

    /// Add a join clause as written, e.g. `CROSS JOIN LATERAL f(x)`.
    pub fn join(mut self, clause: &str) -> Self {
        self.joins.push(clause.to_string());
        self
    }

    /// Add INNER JOIN.
    pub fn inner_join(mut self, table: &str, on: &str) -> Self {
        self.joins.push(format!("INNER JOIN {table} ON {on}"));
        self
    }

    /// Add LEFT JOIN.
    pub fn left_join(mut self, table: &str, on: &str) -> Self {
        self.joins.push(format!("LEFT JOIN {table} ON {on}"));
        self
    }

    // ==================== Grouping ====================

    /// Set GROUP BY clause.
    pub fn group_by(mut self, clause: &str) -> Self {
        self.group_by = Some(clause.to_string());
        self
    }

    /// Add a HAVING condition; arguments follow the same rules as
    /// [`SelectQb::where_sql`].
    pub fn having_sql(mut self, condition: &str, args: Vec<Value>) -> Self {
        self.having.push_sql(&mut self.params, condition, args);
        self
    }

    // ==================== Ordering & Pagination ====================

    /// Add ORDER BY clause.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_by.push(clause.to_string());
        self
    }

    /// Set LIMIT (`None` removes it).
    pub fn limit(mut self, limit: impl Into<Option<i64>>) -> Self {
        self.limit = limit.into();
        self
    }

    /// Set OFFSET (`None` removes it).
    pub fn offset(mut self, offset: impl Into<Option<i64>>) -> Self {
        self.offset = offset.into();
        self
    }

    // ==================== Derived statements ====================

    /// `SELECT COUNT(*)` over the same FROM / WHERE.
    ///
    /// Grouped queries are counted through a subquery so the result is the
    /// number of groups.
    pub fn count_query(&self) -> RawSql {
        let mut sql = String::new();
        self.ctes.write_prefix(&mut sql);
        if self.group_by.is_some() || !self.having.is_empty() {
            sql.push_str("SELECT COUNT(*) FROM (SELECT 1");
            self.write_body(&mut sql);
            sql.push_str(") AS t");
        } else {
            sql.push_str("SELECT COUNT(*)");
            self.write_body(&mut sql);
        }
        self.derived(sql)
    }

    /// `SELECT 1 AS one ... LIMIT 1` over the same FROM / WHERE.
    pub fn exists_query(&self) -> RawSql {
        let mut sql = String::new();
        self.ctes.write_prefix(&mut sql);
        sql.push_str("SELECT 1 AS one");
        self.write_body(&mut sql);
        sql.push_str(" LIMIT 1");
        self.derived(sql)
    }

    fn derived(&self, sql: String) -> RawSql {
        RawSql::new(sql)
            .args(self.params.as_slice().to_vec())
            .with_conn_opt(self.conn.clone())
    }

    /// Count matching rows.
    pub async fn count(&self) -> OrmResult<i64> {
        self.validate()?;
        self.count_query().fetch::<i64>().await
    }

    /// Count matching rows on `conn`.
    pub async fn count_on(&self, conn: &dyn Connection) -> OrmResult<i64> {
        self.validate()?;
        self.count_query().fetch_on::<i64>(conn).await
    }

    /// Whether any row matches.
    pub async fn exists(&self) -> OrmResult<bool> {
        self.validate()?;
        Ok(!self.exists_query().query_rows().await?.is_empty())
    }

    /// Whether any row matches, on `conn`.
    pub async fn exists_on(&self, conn: &dyn Connection) -> OrmResult<bool> {
        self.validate()?;
        Ok(!self.exists_query().query_rows_on(conn).await?.is_empty())
    }

    /// Turn this query into an UPDATE of the matching rows.
    ///
    /// CTEs, WHERE conditions and their arguments carry over. HAVING cannot,
    /// so a select with HAVING conditions yields an UPDATE that fails
    /// validation.
    pub fn into_update(self, changes: ChangeSet<R>) -> UpdateQb<R> {
        let build_error = self.donation_error("UPDATE");
        UpdateQb::from_select(
            self.conn,
            self.ctes,
            self.conditions,
            self.params,
            build_error,
            changes,
        )
    }

    /// Turn this query into a DELETE of the matching rows.
    pub fn into_delete(self) -> DeleteQb<R> {
        let build_error = self.donation_error("DELETE");
        DeleteQb::from_select(self.conn, self.ctes, self.conditions, self.params, build_error)
    }

    fn donation_error(&self, target: &str) -> Option<String> {
        if let Some(err) = &self.build_error {
            return Some(err.clone());
        }
        (!self.having.is_empty())
            .then(|| format!("a SELECT with HAVING conditions cannot be converted into {target}"))
    }

    // ==================== Rendering ====================

    /// FROM, JOIN, WHERE, GROUP BY and HAVING.
    fn write_body(&self, sql: &mut String) {
        sql.push_str(" FROM ");
        sql.push_str(&self.from.join(", "));
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        self.conditions.write_clause(sql, "WHERE");
        if let Some(group) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }
        self.having.write_clause(sql, "HAVING");
    }

    fn select_list(&self) -> String {
        if self.fields.is_empty() {
            return "*".to_string();
        }
        self.fields
            .iter()
            .map(|f| f.expr.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn plain_fields(exprs: &[&str]) -> Vec<SelectField> {
    exprs
        .iter()
        .map(|e| SelectField {
            expr: e.to_string(),
            jsonb: false,
        })
        .collect()
}

where_methods!(SelectQb);
cte_methods!(SelectQb);

impl<R: Record> SqlQb for SelectQb<R> {
    fn render(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        self.ctes.write_prefix(&mut sql);
        sql.push_str("SELECT ");
        sql.push_str(&self.select_list());
        self.write_body(&mut sql);

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
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

impl<R: Record> Clone for SelectQb<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            fields: self.fields.clone(),
            from: self.from.clone(),
            joins: self.joins.clone(),
            ctes: self.ctes.clone(),
            conditions: self.conditions.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            params: self.params.clone(),
            build_error: self.build_error.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for SelectQb<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, args) = self.render();
        f.debug_struct("SelectQb")
            .field("sql", &sql)
            .field("args", &args)
            .finish()
    }
}
