//! Entry point for building statements over one record type.

use crate::changeset::ChangeSet;
use crate::client::Connection;
use crate::error::OrmResult;
use crate::qb::{DeleteQb, InsertQb, RawSql, SelectQb, UpdateQb};
use crate::schema::{FieldDescriptor, Record};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Statement factory for the table of `R`.
///
/// Each call returns a fresh builder; builders created from a model bound
/// with [`Model::with_conn`] run on that connection.
///
/// ```ignore
/// let users = Model::<User>::with_conn(conn);
/// let id: i64 = users
///     .insert([ChangeSet::new().set("name", "alice")])
///     .returning(&["id"])
///     .fetch()
///     .await?;
/// ```
pub struct Model<R: Record> {
    conn: Option<Arc<dyn Connection>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Model<R> {
    /// A model without a connection; run its statements with the `*_on` methods.
    pub fn new() -> Self {
        Self {
            conn: None,
            _record: PhantomData,
        }
    }

    pub fn with_conn(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn: Some(conn),
            _record: PhantomData,
        }
    }

    pub fn table_name(&self) -> &'static str {
        R::schema().table_name()
    }

    /// Storage columns: plain columns, then JSONB groups.
    pub fn columns(&self) -> Vec<&'static str> {
        R::schema().columns()
    }

    pub fn fields(&self) -> &'static [FieldDescriptor<R>] {
        R::schema().fields()
    }

    // ==================== Statements ====================

    /// SELECT every mapped column.
    pub fn find(&self) -> SelectQb<R> {
        SelectQb::all(self.conn.clone())
    }

    /// SELECT only the given expressions.
    pub fn select(&self, exprs: &[&str]) -> SelectQb<R> {
        SelectQb::only(self.conn.clone(), exprs)
    }

    /// INSERT one row built from the merged change sets.
    pub fn insert(&self, changes: impl IntoIterator<Item = ChangeSet<R>>) -> InsertQb<R> {
        InsertQb::new(self.conn.clone(), ChangeSet::merge(changes))
    }

    /// UPDATE with SET built from the merged change sets.
    pub fn update(&self, changes: impl IntoIterator<Item = ChangeSet<R>>) -> UpdateQb<R> {
        UpdateQb::new(self.conn.clone(), ChangeSet::merge(changes))
    }

    pub fn delete(&self) -> DeleteQb<R> {
        DeleteQb::new(self.conn.clone())
    }

    /// Hand-written SQL on this model's connection.
    pub fn raw(&self, sql: impl Into<String>, args: Vec<Value>) -> RawSql {
        RawSql::new(sql).args(args).with_conn_opt(self.conn.clone())
    }

    // ==================== Change sets ====================

    pub fn changes(&self) -> ChangeSet<R> {
        ChangeSet::new()
    }

    /// Changes for the named fields of `record`.
    pub fn field_changes(&self, record: &R, fields: &[&str]) -> OrmResult<ChangeSet<R>> {
        ChangeSet::from_record_fields(record, fields)
    }

    /// Changes from external JSON, matched by external name over visible fields.
    pub fn filter(&self, input: &serde_json::Value) -> OrmResult<ChangeSet<R>> {
        ChangeSet::from_json(input, None)
    }

    /// Like [`Model::filter`], keeping only the permitted names.
    pub fn permit(&self, input: &serde_json::Value, names: &[&str]) -> OrmResult<ChangeSet<R>> {
        ChangeSet::from_json(input, Some(names))
    }
}

impl<R: Record> Default for Model<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Clone for Model<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for Model<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table_name())
            .field("bound", &self.conn.is_some())
            .finish()
    }
}
