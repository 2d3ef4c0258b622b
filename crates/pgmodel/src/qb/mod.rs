//! Statement builders.
//!
//! Every builder is created from a [`Model`](crate::Model), renders to
//! `(sql, args)` through [`SqlQb::render`] and runs through the same trait.
//!
//! ```ignore
//! let users: Vec<User> = Model::<User>::with_conn(conn.clone())
//!     .find()
//!     .eq("status", "active")
//!     .order_by("created_at DESC")
//!     .limit(20)
//!     .fetch()
//!     .await?;
//!
//! Model::<User>::with_conn(conn)
//!     .update([ChangeSet::new().set("status", "inactive")])
//!     .eq("id", user_id)
//!     .execute()
//!     .await?;
//! ```

pub(crate) mod condition;
pub(crate) mod cte;
mod delete;
mod insert;
pub mod params;
mod raw;
mod select;
mod traits;
mod update;

pub use condition::Conditions;
pub use cte::Ctes;
pub use delete::DeleteQb;
pub use insert::{ConflictAction, InsertQb};
pub use params::{Params, renumber};
pub use raw::RawSql;
pub use select::SelectQb;
pub use traits::SqlQb;
pub use update::UpdateQb;

#[cfg(test)]
mod tests;
