//! Field descriptors: per-field mapping metadata plus explicit accessors.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, ToValue, Value, ValueError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

type Getter<R> = Arc<dyn Fn(&R) -> OrmResult<Value> + Send + Sync>;
type Setter<R> = Arc<dyn Fn(&mut R, &Value) -> Result<(), ValueError> + Send + Sync>;

/// A field declaration handed to [`SchemaBuilder::field`](super::SchemaBuilder::field).
///
/// Names left unset are filled in by the schema's naming strategy.
pub struct Field<R> {
    pub(super) name: String,
    pub(super) column_name: Option<String>,
    pub(super) external_name: Option<String>,
    pub(super) jsonb_group: Option<String>,
    pub(super) strict: bool,
    pub(super) visible: bool,
    pub(super) get: Getter<R>,
    pub(super) set: Setter<R>,
}

impl<R: 'static> Field<R> {
    /// A field stored in its own column.
    ///
    /// ```ignore
    /// Field::column("email", |u: &User| &u.email, |u: &mut User| &mut u.email)
    /// ```
    pub fn column<T, G, M>(name: impl Into<String>, get: G, get_mut: M) -> Self
    where
        T: ToValue + FromValue + 'static,
        G: Fn(&R) -> &T + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            column_name: None,
            external_name: None,
            jsonb_group: None,
            strict: false,
            visible: true,
            get: Arc::new(move |r: &R| Ok(get(r).to_value())),
            set: Arc::new(move |r: &mut R, v: &Value| {
                *get_mut(r) = T::from_value(v)?;
                Ok(())
            }),
        }
    }

    /// A field stored as one key of the JSONB column `group`.
    ///
    /// The key is the field's column name.
    pub fn jsonb<T, G, M>(name: impl Into<String>, group: impl Into<String>, get: G, get_mut: M) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
        G: Fn(&R) -> &T + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            column_name: None,
            external_name: None,
            jsonb_group: Some(group.into()),
            strict: false,
            visible: true,
            get: Arc::new(move |r: &R| {
                let json = serde_json::to_value(get(r)).map_err(OrmError::from)?;
                Ok(Value::Json(json))
            }),
            set: Arc::new(move |r: &mut R, v: &Value| {
                let decoded: T = serde_json::from_value(v.to_json())
                    .map_err(|e| ValueError::new(e.to_string()))?;
                *get_mut(r) = decoded;
                Ok(())
            }),
        }
    }

    /// Override the column name (or JSONB key for JSONB fields).
    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Override the name used in external JSON input.
    pub fn external_name(mut self, name: impl Into<String>) -> Self {
        self.external_name = Some(name.into());
        self
    }

    /// Fail result binding when this JSONB key cannot be decoded.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Exclude the field from external JSON input.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Resolved mapping metadata for one field of a record.
pub struct FieldDescriptor<R> {
    pub(super) name: String,
    pub(super) column_name: String,
    pub(super) external_name: String,
    pub(super) jsonb_group: Option<String>,
    pub(super) strict: bool,
    pub(super) nested_path: Vec<String>,
    pub(super) visible: bool,
    pub(super) get: Getter<R>,
    pub(super) set: Setter<R>,
}

impl<R> FieldDescriptor<R> {
    /// Logical field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name, or the key inside the JSONB group column.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    /// JSONB column holding this field, if any.
    pub fn jsonb_group(&self) -> Option<&str> {
        self.jsonb_group.as_deref()
    }

    pub fn is_jsonb(&self) -> bool {
        self.jsonb_group.is_some()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Embedding fields leading to this field, outermost first.
    pub fn nested_path(&self) -> &[String] {
        &self.nested_path
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The column this field lives in: its own column or its JSONB group.
    pub fn storage_column(&self) -> &str {
        self.jsonb_group.as_deref().unwrap_or(&self.column_name)
    }

    /// Read the field from a record.
    pub fn get_value(&self, record: &R) -> OrmResult<Value> {
        (self.get)(record)
    }

    /// Write a value into the field of a record.
    pub fn set_value(&self, record: &mut R, value: &Value) -> Result<(), ValueError> {
        (self.set)(record, value)
    }

    /// Re-home this descriptor inside an outer record `P` reached through `outer`.
    pub(super) fn embed_in<P: 'static>(
        &self,
        prefix: &str,
        outer: Arc<dyn Fn(&P) -> &R + Send + Sync>,
        outer_mut: Arc<dyn Fn(&mut P) -> &mut R + Send + Sync>,
    ) -> FieldDescriptor<P>
    where
        R: 'static,
    {
        let get = self.get.clone();
        let set = self.set.clone();
        let mut nested_path = Vec::with_capacity(self.nested_path.len() + 1);
        nested_path.push(prefix.to_string());
        nested_path.extend(self.nested_path.iter().cloned());

        FieldDescriptor {
            name: self.name.clone(),
            column_name: self.column_name.clone(),
            external_name: self.external_name.clone(),
            jsonb_group: self.jsonb_group.clone(),
            strict: self.strict,
            nested_path,
            visible: self.visible,
            get: Arc::new(move |p: &P| get(outer(p))),
            set: Arc::new(move |p: &mut P, v: &Value| set(outer_mut(p), v)),
        }
    }
}

impl<R> Clone for FieldDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            column_name: self.column_name.clone(),
            external_name: self.external_name.clone(),
            jsonb_group: self.jsonb_group.clone(),
            strict: self.strict,
            nested_path: self.nested_path.clone(),
            visible: self.visible,
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column_name", &self.column_name)
            .field("external_name", &self.external_name)
            .field("jsonb_group", &self.jsonb_group)
            .field("strict", &self.strict)
            .field("nested_path", &self.nested_path)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}
