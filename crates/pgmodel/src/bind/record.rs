//! Binding columns into records through their schema.

use super::Columns;
use crate::error::{OrmError, OrmResult};
use crate::schema::{Record, Schema};
use crate::value::Value;

/// Bind columns into `record` by column name.
///
/// In terminal position every remaining column is consumed; otherwise
/// exactly the record's column count. Plain columns go through the field
/// setter; JSONB group columns are unpacked key by key.
pub fn bind_record<R: Record>(record: &mut R, cols: &mut Columns<'_>, terminal: bool) -> OrmResult<()> {
    let schema = R::schema();
    let count = if terminal {
        cols.remaining()
    } else {
        schema.column_count()
    };
    if count > cols.remaining() {
        return Err(OrmError::invalid_target(format!(
            "'{}' needs {} columns, row has {} left",
            schema.table_name(),
            count,
            cols.remaining()
        )));
    }

    for _ in 0..count {
        let (column, value) = cols.take()?;
        if let Some(field) = schema.field_by_column(column) {
            field
                .set_value(record, value)
                .map_err(|e| OrmError::decode(column, e.to_string()))?;
        } else if schema.is_jsonb_group(column) {
            bind_jsonb(schema, record, column, value)?;
        } else {
            return Err(OrmError::invalid_target(format!(
                "column '{column}' does not map to a field of '{}'",
                schema.table_name()
            )));
        }
    }
    Ok(())
}

/// Unpack a JSONB group column into its fields.
///
/// NULL leaves every field untouched, as does a key missing from the object.
/// A key that fails to decode is skipped unless the field is strict.
fn bind_jsonb<R: Record>(schema: &Schema<R>, record: &mut R, column: &str, value: &Value) -> OrmResult<()> {
    let object = match value {
        Value::Null | Value::Json(serde_json::Value::Null) => return Ok(()),
        Value::Json(serde_json::Value::Object(object)) => object,
        Value::Json(other) => {
            return Err(OrmError::TypeAssertion {
                column: column.to_string(),
                message: format!("expected a JSON object, found {}", json_kind(other)),
            });
        }
        other => {
            return Err(OrmError::TypeAssertion {
                column: column.to_string(),
                message: format!("expected a JSON object, found {}", other.kind()),
            });
        }
    };

    for field in schema.jsonb_fields(column) {
        let Some(raw) = object.get(field.column_name()) else {
            continue;
        };
        if let Err(err) = field.set_value(record, &Value::Json(raw.clone())) {
            if field.is_strict() {
                return Err(OrmError::JsonbField {
                    field: field.name().to_string(),
                    column: column.to_string(),
                    message: err.to_string(),
                });
            }
            tracing::debug!(
                target: "pgmodel.bind",
                field = field.name(),
                column,
                error = %err,
                "skipping undecodable JSONB key"
            );
        }
    }
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Implement [`FromColumns`](crate::bind::FromColumns) and
/// [`Destination`](crate::bind::Destination) for a hand-written [`Record`].
///
/// `#[derive(Record)]` generates these impls itself.
#[macro_export]
macro_rules! impl_record_binding {
    ($ty:ty) => {
        impl $crate::bind::FromColumns for $ty {
            fn from_columns(
                cols: &mut $crate::bind::Columns<'_>,
                terminal: bool,
            ) -> $crate::OrmResult<Self> {
                let mut record = <$ty as ::std::default::Default>::default();
                $crate::bind::bind_record(&mut record, cols, terminal)?;
                Ok(record)
            }
        }

        impl $crate::bind::Destination for $ty {
            const SHAPE: $crate::bind::DestinationShape = $crate::bind::DestinationShape::Record;

            fn bind_row(&mut self, cols: &mut $crate::bind::Columns<'_>) -> $crate::OrmResult<()> {
                $crate::bind::bind_record(self, cols, true)
            }
        }
    };
}
