//! Result binding: destructuring rows into Rust destinations.
//!
//! A destination's [`DestinationShape`] is fixed by its type:
//!
//! | Destination              | Shape             | Rows used          |
//! |--------------------------|-------------------|--------------------|
//! | `i64`, `Option<String>`  | `Scalar`          | first row          |
//! | record, tuple            | `Record`          | first row          |
//! | `Vec<T>`                 | `Sequence`        | all rows, appended |
//! | `HashMap<K, V>`          | `FlatMap`         | all rows, keyed    |
//! | `HashMap<K1, HashMap<..>>` | `NestedMap`     | all rows, keyed    |
//! | `HashMap<K, Vec<V>>`     | `GroupedSequence` | all rows, grouped  |
//!
//! Map keys consume columns left to right: one for a scalar, one per element
//! for a tuple, the record's column count for a record. The value then takes
//! the remaining columns.

mod record;

pub use record::bind_record;

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::{FromValue, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// How rows are laid out in a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationShape {
    Scalar,
    Record,
    Sequence,
    FlatMap,
    NestedMap,
    GroupedSequence,
}

impl DestinationShape {
    /// Whether only the first row is bound.
    pub const fn is_single_row(self) -> bool {
        matches!(self, Self::Scalar | Self::Record)
    }
}

/// Cursor over the columns of one row.
pub struct Columns<'r> {
    names: &'r [String],
    values: &'r [Value],
    pos: usize,
}

impl<'r> Columns<'r> {
    pub fn new(row: &'r Row) -> Self {
        Self {
            names: row.columns(),
            values: row.values(),
            pos: 0,
        }
    }

    /// Columns not consumed yet.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.pos)
    }

    /// Consume the next column.
    pub fn next_column(&mut self) -> Option<(&'r str, &'r Value)> {
        let value = self.values.get(self.pos)?;
        let name = self.names.get(self.pos).map(String::as_str).unwrap_or("");
        self.pos += 1;
        Some((name, value))
    }

    /// Consume the next column, failing when the row is exhausted.
    pub fn take(&mut self) -> OrmResult<(&'r str, &'r Value)> {
        self.next_column().ok_or_else(|| {
            OrmError::invalid_target(format!(
                "row has {} columns, destination needs more",
                self.values.len()
            ))
        })
    }

    /// Fail if any column is left over.
    pub fn finish(&self) -> OrmResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(OrmError::invalid_target(format!(
                "{n} unused column(s) starting at '{}'",
                self.names.get(self.pos).map(String::as_str).unwrap_or("?")
            ))),
        }
    }
}

/// A value decoded from one or more leading columns: map keys, sequence
/// elements and tuple members.
pub trait FromColumns: Sized {
    /// Decode from the cursor. `terminal` is true when nothing follows this
    /// value in the row, so it must consume every remaining column.
    fn from_columns(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<Self>;
}

/// A type rows can be bound into.
pub trait Destination: Default {
    const SHAPE: DestinationShape;

    /// Bind one row.
    fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()>;
}

/// Bind `rows` into a fresh destination.
///
/// Single-row shapes use the first row and fail with
/// [`OrmError::NotFound`] when there is none.
pub fn bind_rows<D: Destination>(rows: &[Row]) -> OrmResult<D> {
    let mut dest = D::default();
    bind_into(&mut dest, rows)?;
    Ok(dest)
}

/// Bind `rows` into an existing destination.
///
/// On failure, whatever was bound before the failing row stays in `dest`.
pub fn bind_into<D: Destination>(dest: &mut D, rows: &[Row]) -> OrmResult<()> {
    if D::SHAPE.is_single_row() {
        let row = rows
            .first()
            .ok_or_else(|| OrmError::not_found("Expected one row, got none"))?;
        return dest.bind_row(&mut Columns::new(row));
    }
    for row in rows {
        dest.bind_row(&mut Columns::new(row))?;
    }
    Ok(())
}

fn decode_scalar<T: FromValue>(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<T> {
    let (name, value) = cols.take()?;
    let decoded = T::from_value(value).map_err(|e| OrmError::decode(name, e.to_string()))?;
    if terminal {
        cols.finish()?;
    }
    Ok(decoded)
}

macro_rules! scalar_destination {
    ($($ty:ty),* $(,)?) => {$(
        impl FromColumns for $ty {
            fn from_columns(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<Self> {
                decode_scalar(cols, terminal)
            }
        }

        impl Destination for $ty {
            const SHAPE: DestinationShape = DestinationShape::Scalar;

            fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
                *self = decode_scalar(cols, true)?;
                Ok(())
            }
        }
    )*};
}

scalar_destination!(
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    String,
    Value,
    serde_json::Value,
    uuid::Uuid,
    DateTime<Utc>,
    NaiveDateTime,
    NaiveDate,
);

// `Vec<T>` is the sequence destination, so `bytea` is only available as a key
// or tuple member.
impl FromColumns for Vec<u8> {
    fn from_columns(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<Self> {
        decode_scalar(cols, terminal)
    }
}

impl<T: FromValue> FromColumns for Option<T> {
    fn from_columns(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<Self> {
        decode_scalar(cols, terminal)
    }
}

impl<T: FromValue> Destination for Option<T> {
    const SHAPE: DestinationShape = DestinationShape::Scalar;

    fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
        *self = decode_scalar(cols, true)?;
        Ok(())
    }
}

macro_rules! tuple_destination {
    ($($name:ident),+ ; $last:ident) => {
        impl<$($name: FromColumns,)+ $last: FromColumns> FromColumns for ($($name,)+ $last,) {
            fn from_columns(cols: &mut Columns<'_>, terminal: bool) -> OrmResult<Self> {
                Ok(($($name::from_columns(cols, false)?,)+ $last::from_columns(cols, terminal)?,))
            }
        }

        impl<$($name: FromColumns + Default,)+ $last: FromColumns + Default> Destination
            for ($($name,)+ $last,)
        {
            const SHAPE: DestinationShape = DestinationShape::Record;

            fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
                *self = Self::from_columns(cols, true)?;
                Ok(())
            }
        }
    };
}

tuple_destination!(A; B);
tuple_destination!(A, B; C);
tuple_destination!(A, B, C; D);
tuple_destination!(A, B, C, D; E);
tuple_destination!(A, B, C, D, E; F);

impl<T: FromColumns> Destination for Vec<T> {
    const SHAPE: DestinationShape = DestinationShape::Sequence;

    fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
        self.push(T::from_columns(cols, true)?);
        Ok(())
    }
}

const fn map_shape(value: DestinationShape) -> DestinationShape {
    match value {
        DestinationShape::Sequence => DestinationShape::GroupedSequence,
        DestinationShape::FlatMap | DestinationShape::NestedMap | DestinationShape::GroupedSequence => {
            DestinationShape::NestedMap
        }
        DestinationShape::Scalar | DestinationShape::Record => DestinationShape::FlatMap,
    }
}

/// Scalar and record values replace whatever a repeated key bound before.
const fn overwrites<V: Destination>() -> bool {
    matches!(V::SHAPE, DestinationShape::Scalar | DestinationShape::Record)
}

fn fresh_value<V: Destination>(cols: &mut Columns<'_>) -> OrmResult<V> {
    let mut value = V::default();
    value.bind_row(cols)?;
    Ok(value)
}

impl<K, V> Destination for HashMap<K, V>
where
    K: FromColumns + Eq + Hash,
    V: Destination,
{
    const SHAPE: DestinationShape = map_shape(V::SHAPE);

    fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
        let key = K::from_columns(cols, false)?;
        if overwrites::<V>() {
            let value = fresh_value::<V>(cols)?;
            self.insert(key, value);
            return Ok(());
        }
        self.entry(key).or_default().bind_row(cols)
    }
}

impl<K, V> Destination for BTreeMap<K, V>
where
    K: FromColumns + Ord,
    V: Destination,
{
    const SHAPE: DestinationShape = map_shape(V::SHAPE);

    fn bind_row(&mut self, cols: &mut Columns<'_>) -> OrmResult<()> {
        let key = K::from_columns(cols, false)?;
        if overwrites::<V>() {
            let value = fresh_value::<V>(cols)?;
            self.insert(key, value);
            return Ok(());
        }
        self.entry(key).or_default().bind_row(cols)
    }
}

#[cfg(test)]
mod tests;
