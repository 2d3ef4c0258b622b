//! Change sets: the field values written by INSERT and UPDATE.

use crate::error::{OrmError, OrmResult};
use crate::qb::params::Params;
use crate::schema::{FieldDescriptor, Record, Schema};
use crate::value::{ToValue, Value};
use std::fmt;
use std::marker::PhantomData;

/// What a change writes into its field.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeValue {
    /// A bound argument.
    Bind(Value),
    /// SQL inserted verbatim, e.g. `now()` or `counter + 1`.
    Raw(String),
    /// SQL with one argument, referenced as `$?` (or `$1`).
    RawWithArg(String, Value),
}

/// Ordered field assignments for one record type.
///
/// Fields keep the position of their first assignment; later assignments to
/// the same field replace the value.
pub struct ChangeSet<R: Record> {
    entries: Vec<(usize, ChangeValue)>,
    error: Option<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for ChangeSet<R> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            error: self.error.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for ChangeSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(field, value)| (field.name(), value)))
            .finish()
    }
}

impl<R: Record> Default for ChangeSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> ChangeSet<R> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            error: None,
            _record: PhantomData,
        }
    }

    fn schema() -> &'static Schema<R> {
        R::schema()
    }

    /// Assign a bound value to a field.
    ///
    /// An unknown field name is remembered and reported by
    /// [`ChangeSet::check`] and by any statement built from this set.
    pub fn set(self, field: &str, value: impl ToValue) -> Self {
        self.put(field, ChangeValue::Bind(value.to_value()))
    }

    /// Assign raw SQL to a field.
    pub fn set_raw(self, field: &str, sql: impl Into<String>) -> Self {
        self.put(field, ChangeValue::Raw(sql.into()))
    }

    /// Assign an SQL expression with one argument (`$?` or `$1`) to a field.
    pub fn set_expr(self, field: &str, sql: impl Into<String>, arg: impl ToValue) -> Self {
        self.put(field, ChangeValue::RawWithArg(sql.into(), arg.to_value()))
    }

    /// Assign a value, failing immediately on an unknown field.
    pub fn try_set(self, field: &str, value: impl ToValue) -> OrmResult<Self> {
        Self::schema().require_field(field)?;
        Ok(self.set(field, value))
    }

    fn put(mut self, field: &str, value: ChangeValue) -> Self {
        match Self::schema().index_of(field) {
            Some(idx) => self.insert(idx, value),
            None => {
                if self.error.is_none() {
                    self.error = Some(field.to_string());
                }
            }
        }
        self
    }

    fn insert(&mut self, idx: usize, value: ChangeValue) {
        match self.entries.iter_mut().find(|(i, _)| *i == idx) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((idx, value)),
        }
    }

    /// Merge change sets; later sets override earlier ones per field.
    pub fn merge(sets: impl IntoIterator<Item = ChangeSet<R>>) -> Self {
        sets.into_iter().fold(Self::new(), Self::merged_with)
    }

    /// Apply `other` on top of `self`.
    pub fn merged_with(mut self, other: ChangeSet<R>) -> Self {
        if self.error.is_none() {
            self.error = other.error;
        }
        for (idx, value) in other.entries {
            self.insert(idx, value);
        }
        self
    }

    /// Every field of `record`.
    pub fn from_record(record: &R) -> OrmResult<Self> {
        let mut set = Self::new();
        for (idx, field) in Self::schema().fields().iter().enumerate() {
            set.insert(idx, ChangeValue::Bind(field.get_value(record)?));
        }
        Ok(set)
    }

    /// The named fields of `record`.
    pub fn from_record_fields(record: &R, fields: &[&str]) -> OrmResult<Self> {
        let mut set = Self::new();
        for name in fields {
            let (idx, field) = Self::schema().require_field(name)?;
            set.insert(idx, ChangeValue::Bind(field.get_value(record)?));
        }
        Ok(set)
    }

    /// Changes from external JSON input, matched by external name.
    ///
    /// Hidden fields are never taken from input. When `permit` is given only
    /// the listed fields (by field or external name) are accepted.
    pub fn from_json(input: &serde_json::Value, permit: Option<&[&str]>) -> OrmResult<Self> {
        let object = input
            .as_object()
            .ok_or_else(|| OrmError::validation("change input must be a JSON object"))?;
        let mut set = Self::new();
        for (idx, field) in Self::schema().fields().iter().enumerate() {
            if !field.is_visible() {
                continue;
            }
            if let Some(permit) = permit {
                let allowed = permit
                    .iter()
                    .any(|p| *p == field.name() || *p == field.external_name());
                if !allowed {
                    continue;
                }
            }
            if let Some(value) = object.get(field.external_name()) {
                set.insert(idx, ChangeValue::Bind(Value::from_json(value.clone())));
            }
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The assignment for a field, if any.
    pub fn get(&self, field: &str) -> Option<&ChangeValue> {
        let idx = Self::schema().index_of(field)?;
        self.entries.iter().find(|(i, _)| *i == idx).map(|(_, v)| v)
    }

    /// Fields and values in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldDescriptor<R>, &ChangeValue)> {
        let fields = Self::schema().fields();
        self.entries.iter().map(move |(idx, v)| (&fields[*idx], v))
    }

    /// Report the first unknown field assigned through [`ChangeSet::set`].
    pub fn check(&self) -> OrmResult<()> {
        match &self.error {
            Some(field) => Err(OrmError::UnknownField {
                table: Self::schema().table_name().to_string(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Group entries by storage column in first-seen order.
    fn slots(&self) -> Vec<Slot<'_, R>> {
        let mut slots: Vec<Slot<'_, R>> = Vec::new();
        for (field, value) in self.iter() {
            match field.jsonb_group() {
                None => slots.push(Slot::Plain(field, value)),
                Some(group) => {
                    let existing = slots.iter_mut().find_map(|s| match s {
                        Slot::Group(name, members) if *name == group => Some(members),
                        _ => None,
                    });
                    match existing {
                        Some(members) => members.push((field, value)),
                        None => slots.push(Slot::Group(group, vec![(field, value)])),
                    }
                }
            }
        }
        slots
    }

    /// Render `(columns, values)` for an INSERT row.
    ///
    /// Each JSONB group becomes one column holding a single JSON object of its
    /// bound keys; raw values are layered on with `jsonb_set`.
    pub(crate) fn render_insert(&self, params: &mut Params) -> (Vec<String>, Vec<String>) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for slot in self.slots() {
            match slot {
                Slot::Plain(field, value) => {
                    columns.push(field.column_name().to_string());
                    values.push(render_value(params, value));
                }
                Slot::Group(group, members) => {
                    let mut object = serde_json::Map::new();
                    for (field, value) in &members {
                        if let ChangeValue::Bind(v) = value {
                            object.insert(field.column_name().to_string(), v.to_json());
                        }
                    }
                    let mut expr = if object.is_empty() {
                        "'{}'::jsonb".to_string()
                    } else {
                        params.placeholder(Value::Json(serde_json::Value::Object(object)))
                    };
                    for (field, value) in &members {
                        let raw = match value {
                            ChangeValue::Bind(_) => continue,
                            ChangeValue::Raw(sql) => sql.clone(),
                            ChangeValue::RawWithArg(sql, arg) => params.bind_expr(sql, arg.clone()),
                        };
                        expr = jsonb_set(&expr, field.column_name(), &raw);
                    }
                    columns.push(group.to_string());
                    values.push(expr);
                }
            }
        }
        (columns, values)
    }

    /// Render the `column = expr` assignments of an UPDATE.
    ///
    /// JSONB keys fold into nested `jsonb_set` calls on the existing column.
    pub(crate) fn render_update(&self, params: &mut Params) -> Vec<String> {
        let mut assignments = Vec::new();
        for slot in self.slots() {
            match slot {
                Slot::Plain(field, value) => {
                    let expr = render_value(params, value);
                    assignments.push(format!("{} = {}", field.column_name(), expr));
                }
                Slot::Group(group, members) => {
                    let mut expr = format!("COALESCE({group}, '{{}}'::jsonb)");
                    for (field, value) in members {
                        let new_value = match value {
                            ChangeValue::Bind(v) => params.placeholder(Value::Json(v.to_json())),
                            ChangeValue::Raw(sql) => sql.clone(),
                            ChangeValue::RawWithArg(sql, arg) => params.bind_expr(sql, arg.clone()),
                        };
                        expr = jsonb_set(&expr, field.column_name(), &new_value);
                    }
                    assignments.push(format!("{group} = {expr}"));
                }
            }
        }
        assignments
    }

    /// Storage columns touched by this set, in render order.
    pub(crate) fn columns(&self) -> Vec<String> {
        self.slots()
            .into_iter()
            .map(|slot| match slot {
                Slot::Plain(field, _) => field.column_name().to_string(),
                Slot::Group(group, _) => group.to_string(),
            })
            .collect()
    }
}

enum Slot<'a, R: 'static> {
    Plain(&'static FieldDescriptor<R>, &'a ChangeValue),
    Group(&'static str, Vec<(&'static FieldDescriptor<R>, &'a ChangeValue)>),
}

fn render_value(params: &mut Params, value: &ChangeValue) -> String {
    match value {
        ChangeValue::Bind(v) => params.placeholder(v.clone()),
        ChangeValue::Raw(sql) => sql.clone(),
        ChangeValue::RawWithArg(sql, arg) => params.bind_expr(sql, arg.clone()),
    }
}

fn jsonb_set(base: &str, key: &str, value: &str) -> String {
    format!("jsonb_set({base}, '{{{key}}}', {value})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, register};
    use std::sync::OnceLock;

    #[derive(Default, Debug)]
    struct Post {
        id: i64,
        title: String,
        views: i64,
        color: String,
        size: i32,
        secret: String,
    }

    impl Record for Post {
        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Post>> = OnceLock::new();
            register(&SCHEMA, || {
                Schema::builder()
                    .table("posts")
                    .field(Field::column("id", |p: &Post| &p.id, |p: &mut Post| &mut p.id))
                    .field(Field::column("title", |p: &Post| &p.title, |p: &mut Post| &mut p.title))
                    .field(Field::column("views", |p: &Post| &p.views, |p: &mut Post| &mut p.views))
                    .field(Field::jsonb("color", "meta", |p: &Post| &p.color, |p: &mut Post| &mut p.color))
                    .field(Field::jsonb("size", "meta", |p: &Post| &p.size, |p: &mut Post| &mut p.size))
                    .field(
                        Field::column("secret", |p: &Post| &p.secret, |p: &mut Post| &mut p.secret)
                            .hidden(),
                    )
                    .build()
            })
        }
    }

    #[test]
    fn merge_is_last_write_wins_in_first_seen_order() {
        let a = ChangeSet::<Post>::new().set("title", "a").set("views", 1);
        let b = ChangeSet::<Post>::new().set("views", 2).set("title", "b").set("id", 3);
        let merged = ChangeSet::merge([a, b]);

        let names: Vec<&str> = merged.iter().map(|(f, _)| f.name()).collect();
        assert_eq!(names, vec!["title", "views", "id"]);
        assert_eq!(merged.get("title"), Some(&ChangeValue::Bind(Value::Text("b".into()))));
        assert_eq!(merged.get("views"), Some(&ChangeValue::Bind(Value::Int(2))));
    }

    #[test]
    fn unknown_fields_are_reported() {
        let set = ChangeSet::<Post>::new().set("nope", 1);
        assert!(matches!(set.check(), Err(OrmError::UnknownField { .. })));
        assert!(ChangeSet::<Post>::new().try_set("nope", 1).is_err());
    }

    #[test]
    fn insert_packs_jsonb_group_into_one_argument() {
        let set = ChangeSet::<Post>::new()
            .set("size", 3)
            .set("title", "t")
            .set("color", "red");
        let mut params = Params::new();
        let (columns, values) = set.render_insert(&mut params);
        assert_eq!(columns, vec!["meta", "title"]);
        assert_eq!(values, vec!["$1", "$2"]);
        assert_eq!(
            params.as_slice()[0],
            Value::Json(serde_json::json!({"size": 3, "color": "red"}))
        );
    }

    #[test]
    fn insert_layers_raw_jsonb_values() {
        let set = ChangeSet::<Post>::new()
            .set("color", "red")
            .set_raw("size", "to_jsonb(42)");
        let mut params = Params::new();
        let (_, values) = set.render_insert(&mut params);
        assert_eq!(values, vec!["jsonb_set($1, '{size}', to_jsonb(42))"]);
    }

    #[test]
    fn update_folds_jsonb_keys() {
        let set = ChangeSet::<Post>::new()
            .set("color", "blue")
            .set_expr("views", "views + $?", 1)
            .set("size", 9);
        let mut params = Params::from(vec![Value::Int(7)]);
        let assignments = set.render_update(&mut params);
        assert_eq!(
            assignments,
            vec![
                "meta = jsonb_set(jsonb_set(COALESCE(meta, '{}'::jsonb), '{color}', $2), '{size}', $3)",
                "views = views + $4",
            ]
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn from_json_respects_visibility_and_permit_list() {
        let input = serde_json::json!({"title": "x", "views": 5, "secret": "s", "color": "red"});
        let set = ChangeSet::<Post>::from_json(&input, None).unwrap();
        assert!(set.get("secret").is_none());
        assert_eq!(set.len(), 3);

        let permitted = ChangeSet::<Post>::from_json(&input, Some(&["title"])).unwrap();
        assert_eq!(permitted.len(), 1);
        assert!(ChangeSet::<Post>::from_json(&serde_json::json!([1]), None).is_err());
    }

    #[test]
    fn from_record_reads_every_field() {
        let post = Post {
            id: 1,
            title: "hello".into(),
            ..Default::default()
        };
        let set = ChangeSet::from_record(&post).unwrap();
        assert_eq!(set.len(), 6);
        let some = ChangeSet::from_record_fields(&post, &["title"]).unwrap();
        assert_eq!(some.get("title"), Some(&ChangeValue::Bind(Value::Text("hello".into()))));
        assert!(ChangeSet::from_record_fields(&post, &["bogus"]).is_err());
    }
}
