//! INSERT statement builder.

use crate::changeset::ChangeSet;
use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::params::Params;
use crate::qb::traits::SqlQb;
use crate::schema::Record;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Conflict resolution action.
#[derive(Clone, Debug, PartialEq)]
pub enum ConflictAction {
    /// DO NOTHING
    DoNothing,
    /// DO UPDATE SET with a caller-written assignment list numbered `$1..$N`
    /// against its own arguments.
    DoUpdate(String, Vec<Value>),
    /// DO UPDATE SET every inserted column from `EXCLUDED`.
    DoUpdateAll,
    /// Like `DoUpdateAll`, skipping the named fields or columns.
    DoUpdateAllExcept(Vec<String>),
}

/// INSERT builder for the table of `R`.
pub struct InsertQb<R: Record> {
    conn: Option<Arc<dyn Connection>>,
    changes: ChangeSet<R>,
    conflict_targets: Option<Vec<String>>,
    conflict_action: Option<ConflictAction>,
    returning: Vec<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> InsertQb<R> {
    pub(crate) fn new(conn: Option<Arc<dyn Connection>>, changes: ChangeSet<R>) -> Self {
        Self {
            conn,
            changes,
            conflict_targets: None,
            conflict_action: None,
            returning: Vec::new(),
            _record: PhantomData,
        }
    }

    /// The change set being inserted.
    pub fn changes(&self) -> &ChangeSet<R> {
        &self.changes
    }

    /// Merge more changes into the row (last write wins).
    pub fn set(mut self, changes: ChangeSet<R>) -> Self {
        self.changes = std::mem::take(&mut self.changes).merged_with(changes);
        self
    }

    /// Declare `ON CONFLICT (targets)`. Targets may be field names or columns;
    /// an empty list renders a bare `ON CONFLICT`.
    pub fn on_conflict(mut self, targets: &[&str]) -> Self {
        let schema = R::schema();
        let targets = targets
            .iter()
            .map(|t| match schema.field(t) {
                Some(field) if !field.is_jsonb() => field.column_name().to_string(),
                _ => t.to_string(),
            })
            .collect();
        self.conflict_targets = Some(targets);
        self
    }

    /// `DO NOTHING` on conflict.
    pub fn do_nothing(mut self) -> Self {
        self.conflict_action = Some(ConflictAction::DoNothing);
        self
    }

    /// `DO UPDATE SET <set_sql>` on conflict.
    pub fn do_update(self, set_sql: &str) -> Self {
        self.do_update_with(set_sql, Vec::new())
    }

    /// `DO UPDATE SET <set_sql>` with arguments numbered `$1..$N` locally.
    pub fn do_update_with(mut self, set_sql: &str, args: Vec<Value>) -> Self {
        self.conflict_action = Some(ConflictAction::DoUpdate(set_sql.to_string(), args));
        self
    }

    /// Overwrite every inserted column with its `EXCLUDED` value on conflict.
    pub fn do_update_all(mut self) -> Self {
        self.conflict_action = Some(ConflictAction::DoUpdateAll);
        self
    }

    /// Like [`InsertQb::do_update_all`], leaving the named fields alone.
    ///
    /// Excluding every inserted column is rejected by `validate()`, since
    /// there would be nothing left to assign.
    pub fn do_update_all_except(mut self, names: &[&str]) -> Self {
        let names = names.iter().map(|n| n.to_string()).collect();
        self.conflict_action = Some(ConflictAction::DoUpdateAllExcept(names));
        self
    }

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &[&str]) -> Self {
        self.returning = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// `col = EXCLUDED.col` for each inserted column not in `skip`.
    fn excluded_assignments(&self, skip: &[String]) -> Vec<String> {
        let schema = R::schema();
        let skipped: Vec<&str> = skip
            .iter()
            .map(|name| match schema.field(name) {
                Some(field) => field.storage_column(),
                None => name.as_str(),
            })
            .collect();
        self.changes
            .columns()
            .into_iter()
            .filter(|col| !skipped.contains(&col.as_str()))
            .map(|col| format!("{col} = EXCLUDED.{col}"))
            .collect()
    }

    fn write_conflict(&self, sql: &mut String, params: &mut Params) {
        let (Some(targets), Some(action)) = (&self.conflict_targets, &self.conflict_action) else {
            return;
        };
        sql.push_str(" ON CONFLICT");
        if !targets.is_empty() {
            sql.push_str(&format!(" ({})", targets.join(", ")));
        }

        let assignments = match action {
            ConflictAction::DoNothing => Vec::new(),
            ConflictAction::DoUpdate(set_sql, args) => vec![params.splice(set_sql, args.clone())],
            ConflictAction::DoUpdateAll => self.excluded_assignments(&[]),
            ConflictAction::DoUpdateAllExcept(skip) => self.excluded_assignments(skip),
        };
        if assignments.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            sql.push_str(" DO UPDATE SET ");
            sql.push_str(&assignments.join(", "));
        }
    }
}

impl<R: Record> SqlQb for InsertQb<R> {
    fn render(&self) -> (String, Vec<Value>) {
        let mut params = Params::new();
        let table = R::schema().table_name();
        let (columns, values) = self.changes.render_insert(&mut params);

        let mut sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                values.join(", ")
            )
        };
        self.write_conflict(&mut sql, &mut params);

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
        self.changes.check()?;
        // Without both a declaration and an action this is a plain INSERT.
        let (Some(targets), Some(action)) = (&self.conflict_targets, &self.conflict_action) else {
            return Ok(());
        };
        let skip = match action {
            ConflictAction::DoNothing => return Ok(()),
            ConflictAction::DoUpdate(..) => None,
            ConflictAction::DoUpdateAll => Some(&[][..]),
            ConflictAction::DoUpdateAllExcept(names) => Some(names.as_slice()),
        };
        if targets.is_empty() {
            return Err(OrmError::validation("ON CONFLICT DO UPDATE requires conflict targets"));
        }
        if let Some(skip) = skip
            && self.excluded_assignments(skip).is_empty()
        {
            return Err(OrmError::validation("ON CONFLICT DO UPDATE has no columns left to update"));
        }
        Ok(())
    }
}

impl<R: Record> Clone for InsertQb<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            changes: self.changes.clone(),
            conflict_targets: self.conflict_targets.clone(),
            conflict_action: self.conflict_action.clone(),
            returning: self.returning.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for InsertQb<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, args) = self.render();
        f.debug_struct("InsertQb")
            .field("sql", &sql)
            .field("args", &args)
            .finish()
    }
}
