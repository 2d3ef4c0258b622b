//! # pgmodel
//!
//! Runtime statement building and result binding for PostgreSQL over plain
//! Rust structs.
//!
//! ## Features
//!
//! - **Field registry**: each record type carries a [`Schema`] of field
//!   descriptors (column, external name, JSONB group, accessors), written by
//!   hand or generated with `#[derive(Record)]`
//! - **Change sets**: ordered, mergeable field assignments; fields sharing a
//!   JSONB column are packed into one argument
//! - **Statement builders**: SELECT / INSERT / UPDATE / DELETE with CTEs,
//!   joins, grouping, conflict handling and RETURNING, numbering `$N`
//!   placeholders across spliced fragments
//! - **Result binding**: rows into scalars, records, tuples, vectors, flat,
//!   nested and grouped maps, chosen by the destination type
//! - **Transactions**: commit on success, rollback on error or panic
//!
//! ## Example
//!
//! ```ignore
//! use pgmodel::prelude::*;
//!
//! #[derive(Debug, Default, Record)]
//! #[orm(table = "users")]
//! struct User {
//!     id: i64,
//!     name: String,
//!     #[orm(jsonb = "settings")]
//!     theme: String,
//! }
//!
//! let users = Model::<User>::with_conn(conn.clone());
//! users
//!     .insert([ChangeSet::new().set("name", "alice").set("theme", "dark")])
//!     .execute()
//!     .await?;
//!
//! let by_id: HashMap<i64, User> = users.find().fetch().await?;
//! ```

pub mod bind;
pub mod changeset;
pub mod client;
pub mod error;
pub mod model;
pub mod qb;
pub mod row;
pub mod schema;
pub mod transaction;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub mod prelude;

pub use bind::{Columns, Destination, DestinationShape, FromColumns, bind_into, bind_rows};
pub use changeset::{ChangeSet, ChangeValue};
pub use client::{Connection, PgConnection, Transaction};
pub use error::{OrmError, OrmResult};
pub use model::Model;
pub use qb::{ConflictAction, DeleteQb, InsertQb, RawSql, SelectQb, SqlQb, UpdateQb};
pub use row::Row;
pub use schema::{Field, FieldDescriptor, NamingStrategy, Record, Schema, SnakeCase, Verbatim};
pub use transaction::{TransactionIsolation, TransactionOptions, transaction};
pub use value::{FromValue, ToValue, Value, ValueError};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use pgmodel_derive::Record;
