//! Common table expressions (`WITH name AS (...)`).
//!
//! A CTE body is spliced into the owning statement's ledger when it is added:
//! its placeholders are renumbered past the arguments already bound.

use crate::qb::params::Params;
use crate::value::Value;

/// Rendered `name AS (body)` entries in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ctes {
    items: Vec<String>,
}

impl Ctes {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, params: &mut Params, name: &str, sql: &str, args: Vec<Value>) {
        let body = params.splice(sql, args);
        self.items.push(format!("{name} AS ({body})"));
    }

    /// Write `WITH a AS (...), b AS (...) ` (with trailing space) when non-empty.
    pub(crate) fn write_prefix(&self, sql: &mut String) {
        if !self.items.is_empty() {
            sql.push_str("WITH ");
            sql.push_str(&self.items.join(", "));
            sql.push(' ');
        }
    }
}

/// Generate `with_raw` / `with_query` / `with_select` on a statement type with
/// `ctes: Ctes` and `params: Params` fields.
macro_rules! cte_methods {
    ($ty:ident) => {
        impl<R: $crate::schema::Record> $ty<R> {
            /// Add a CTE from SQL numbered `$1..$N` against its own `args`.
            pub fn with_raw(mut self, name: &str, sql: &str, args: Vec<$crate::value::Value>) -> Self {
                self.ctes.push(&mut self.params, name, sql, args);
                self
            }

            /// Add a CTE whose body is another statement.
            pub fn with_query(mut self, name: &str, query: &impl $crate::qb::SqlQb) -> Self {
                let (sql, args) = query.render();
                self.ctes.push(&mut self.params, name, &sql, args);
                self
            }

            /// Add a CTE whose body is a SELECT over any record type.
            pub fn with_select<S: $crate::schema::Record>(
                self,
                name: &str,
                select: &$crate::qb::SelectQb<S>,
            ) -> Self {
                self.with_query(name, select)
            }
        }
    };
}

pub(crate) use cte_methods;
