//! Record schemas: the per-type Field Descriptor registry.
//!
//! A [`Schema`] is built once per record type, either by `#[derive(Record)]` or
//! by hand through [`Schema::builder`], and handed out as `&'static` through
//! [`Record::schema`].

mod field;
mod naming;

pub use field::{Field, FieldDescriptor};
pub use naming::{NamingStrategy, SnakeCase, Verbatim, pluralize};

use crate::error::{OrmError, OrmResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A struct mapped to a table.
pub trait Record: Default + Send + Sync + 'static {
    /// The registered schema for this type.
    fn schema() -> &'static Schema<Self>;
}

/// Table name plus the ordered field descriptors of a record type.
pub struct Schema<R> {
    table: String,
    fields: Vec<FieldDescriptor<R>>,
    by_name: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
    jsonb_groups: Vec<String>,
}

impl<R: 'static> Schema<R> {
    /// Start building a schema for `R`.
    pub fn builder() -> SchemaBuilder<R> {
        SchemaBuilder::new()
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// All fields in declaration order (embedded fields flattened in place).
    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    /// Look up a field by logical name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Look up a field by logical name, failing with `UnknownField`.
    pub fn require_field(&self, name: &str) -> OrmResult<(usize, &FieldDescriptor<R>)> {
        self.index_of(name)
            .map(|idx| (idx, &self.fields[idx]))
            .ok_or_else(|| OrmError::UnknownField {
                table: self.table.clone(),
                field: name.to_string(),
            })
    }

    /// Look up a non-JSONB field by its column name.
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor<R>> {
        self.by_column.get(column).map(|&idx| &self.fields[idx])
    }

    /// JSONB group columns in first-declared order.
    pub fn jsonb_groups(&self) -> &[String] {
        &self.jsonb_groups
    }

    pub fn is_jsonb_group(&self, column: &str) -> bool {
        self.jsonb_groups.iter().any(|g| g == column)
    }

    /// Fields stored in the JSONB column `group`.
    pub fn jsonb_fields<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a FieldDescriptor<R>> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.jsonb_group.as_deref() == Some(group))
    }

    /// Fields stored in their own column.
    pub fn plain_fields(&self) -> impl Iterator<Item = &FieldDescriptor<R>> {
        self.fields.iter().filter(|f| f.jsonb_group.is_none())
    }

    /// Selectable columns: every plain column, then each JSONB group.
    pub fn columns(&self) -> Vec<&str> {
        self.plain_fields()
            .map(|f| f.column_name.as_str())
            .chain(self.jsonb_groups.iter().map(String::as_str))
            .collect()
    }

    /// Number of result columns a full row of this record occupies.
    pub fn column_count(&self) -> usize {
        self.by_column.len() + self.jsonb_groups.len()
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish()
    }
}

enum Pending<R> {
    Declared(Field<R>),
    Resolved(FieldDescriptor<R>),
}

/// Builder for [`Schema`].
pub struct SchemaBuilder<R> {
    table: Option<String>,
    naming: Box<dyn NamingStrategy>,
    fields: Vec<Pending<R>>,
}

impl<R: 'static> Default for SchemaBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static> SchemaBuilder<R> {
    pub fn new() -> Self {
        Self {
            table: None,
            naming: Box::new(SnakeCase),
            fields: Vec::new(),
        }
    }

    /// Set the table name explicitly (otherwise derived from the type name).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Use a naming strategy other than [`SnakeCase`].
    pub fn naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    /// Add a field.
    pub fn field(mut self, field: Field<R>) -> Self {
        self.fields.push(Pending::Declared(field));
        self
    }

    /// Flatten the fields of an embedded record into this schema.
    ///
    /// Embedded fields keep their own names and columns; their nested path is
    /// prefixed with `name`.
    pub fn embed<S, G, M>(mut self, name: &str, get: G, get_mut: M) -> Self
    where
        S: Record,
        G: Fn(&R) -> &S + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut S + Send + Sync + 'static,
    {
        let outer: Arc<dyn Fn(&R) -> &S + Send + Sync> = Arc::new(get);
        let outer_mut: Arc<dyn Fn(&mut R) -> &mut S + Send + Sync> = Arc::new(get_mut);
        for field in S::schema().fields() {
            self.fields.push(Pending::Resolved(field.embed_in(
                name,
                outer.clone(),
                outer_mut.clone(),
            )));
        }
        self
    }

    /// Resolve names and check the registration invariants.
    pub fn build(self) -> OrmResult<Schema<R>> {
        let type_name = naming::short_type_name(std::any::type_name::<R>());
        let table = match self.table {
            Some(table) => table,
            None => self.naming.table_name(type_name),
        };
        let invalid = |message: String| OrmError::InvalidSchema {
            table: table.clone(),
            message,
        };

        let naming = &self.naming;
        let fields: Vec<FieldDescriptor<R>> = self
            .fields
            .into_iter()
            .map(|pending| match pending {
                Pending::Resolved(desc) => desc,
                Pending::Declared(field) => FieldDescriptor {
                    column_name: field
                        .column_name
                        .unwrap_or_else(|| naming.column_name(&field.name)),
                    external_name: field
                        .external_name
                        .unwrap_or_else(|| naming.external_name(&field.name)),
                    name: field.name,
                    jsonb_group: field.jsonb_group,
                    strict: field.strict,
                    nested_path: Vec::new(),
                    visible: field.visible,
                    get: field.get,
                    set: field.set,
                },
            })
            .collect();

        let mut by_name = HashMap::new();
        let mut by_column = HashMap::new();
        let mut jsonb_groups: Vec<String> = Vec::new();
        let mut jsonb_keys: HashSet<(&str, &str)> = HashSet::new();

        for (idx, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(invalid("field with empty name".to_string()));
            }
            if by_name.insert(field.name.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate field name '{}'", field.name)));
            }
            match &field.jsonb_group {
                None => {
                    if by_column.insert(field.column_name.clone(), idx).is_some() {
                        return Err(invalid(format!(
                            "duplicate column '{}' (field '{}')",
                            field.column_name, field.name
                        )));
                    }
                }
                Some(group) => {
                    if !jsonb_keys.insert((group.as_str(), field.column_name.as_str())) {
                        return Err(invalid(format!(
                            "duplicate key '{}' in JSONB column '{}'",
                            field.column_name, group
                        )));
                    }
                    if !jsonb_groups.contains(group) {
                        jsonb_groups.push(group.clone());
                    }
                }
            }
        }

        if let Some(clash) = jsonb_groups.iter().find(|g| by_column.contains_key(*g)) {
            return Err(invalid(format!(
                "JSONB column '{clash}' is also used as a plain column"
            )));
        }

        Ok(Schema {
            table,
            fields,
            by_name,
            by_column,
            jsonb_groups,
        })
    }
}

/// Initialise a record's static schema on first use.
///
/// Schemas are fixed at compile time, so an invalid one is a programming error
/// and panics with the registration message.
pub fn register<R: 'static>(
    cell: &'static OnceLock<Schema<R>>,
    init: impl FnOnce() -> OrmResult<Schema<R>>,
) -> &'static Schema<R> {
    cell.get_or_init(|| match init() {
        Ok(schema) => schema,
        Err(err) => panic!("{err}"),
    })
}
