//! Driver-independent result rows

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// A result row: ordered column names plus their values.
///
/// Rows of one result set share the column-name list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from column names and values.
    ///
    /// Missing trailing values are padded with `NULL`; extra values are dropped.
    pub fn new<I, S>(columns: I, values: Vec<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Arc<[String]> = columns.into_iter().map(Into::into).collect();
        Self::with_shared_columns(columns, values)
    }

    /// Create a row reusing an existing column-name list.
    pub fn with_shared_columns(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column position.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the first column with the given name.
    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Decode a named column into `T`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get_by_name(column)
            .ok_or_else(|| OrmError::decode(column, "column not found"))?;
        T::from_value(value).map_err(|e| OrmError::decode(column, e.to_string()))
    }

    /// Split into column names and values.
    pub fn into_parts(self) -> (Arc<[String]>, Vec<Value>) {
        (self.columns, self.values)
    }
}

impl TryFrom<&tokio_postgres::Row> for Row {
    type Error = OrmError;

    fn try_from(row: &tokio_postgres::Row) -> OrmResult<Self> {
        let columns: Arc<[String]> = row.columns().iter().map(|c| c.name().to_string()).collect();
        decode_pg_row(columns, row)
    }
}

/// Convert a driver result set, sharing one column-name list across rows.
pub(crate) fn from_pg_rows(rows: &[tokio_postgres::Row]) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| decode_pg_row(columns.clone(), row))
        .collect()
}

fn decode_pg_row(columns: Arc<[String]>, row: &tokio_postgres::Row) -> OrmResult<Row> {
    let mut values = Vec::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        let value: Value = row
            .try_get(idx)
            .map_err(|e| OrmError::decode(name.as_str(), e.to_string()))?;
        values.push(value);
    }
    Ok(Row { columns, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_by_name_and_decode() {
        let row = Row::new(["id", "name"], vec![Value::Int(7), Value::Text("a".into())]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("name").unwrap(), "a");
        assert!(matches!(
            row.try_get::<i64>("missing"),
            Err(OrmError::Decode { .. })
        ));
    }

    #[test]
    fn short_value_lists_are_padded() {
        let row = Row::new(["a", "b"], vec![Value::Int(1)]);
        assert_eq!(row.get(1), Some(&Value::Null));
    }
}
