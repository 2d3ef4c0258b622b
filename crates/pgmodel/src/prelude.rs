//! Convenient imports for typical `pgmodel` usage.
//!
//! ```ignore
//! use pgmodel::prelude::*;
//! ```

pub use crate::{
    ChangeSet, Connection, Destination, Model, OrmError, OrmResult, Record, SqlQb, ToValue,
    TransactionOptions, Value, args, transaction,
};

#[cfg(feature = "pool")]
pub use crate::create_pool;
