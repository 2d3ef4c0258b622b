//! WHERE / HAVING condition lists.
//!
//! Conditions are rendered against the owning statement's ledger when they are
//! added, so their placeholder numbers are absolute.

use crate::qb::params::Params;
use crate::value::Value;

/// An ordered list of AND-ed conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    items: Vec<String>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a condition numbered from `$1` relative to its own `args`.
    ///
    /// When exactly one argument is given, every `$?` in `sql` also resolves
    /// to that argument. With zero or several arguments `$?` is left in the
    /// text unchanged, so placeholders must then be numbered explicitly.
    pub fn push_sql(&mut self, params: &mut Params, sql: &str, args: Vec<Value>) {
        let text = params.splice_condition(sql, args);
        self.items.push(text);
    }

    /// Add a condition that carries no arguments.
    pub fn push_raw(&mut self, sql: &str) {
        self.items.push(sql.to_string());
    }

    /// Add `column op $N`.
    pub fn compare(&mut self, params: &mut Params, column: &str, op: &str, value: Value) {
        let ph = params.placeholder(value);
        self.items.push(format!("{column} {op} {ph}"));
    }

    /// Add `column IN ($N, ...)`; an empty list matches nothing.
    pub fn in_list(&mut self, params: &mut Params, column: &str, values: Vec<Value>) {
        if values.is_empty() {
            self.items.push("1=0".to_string());
            return;
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| params.placeholder(v)).collect();
        self.items
            .push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    /// Render the combined condition, if any.
    ///
    /// One condition renders as written; several are each parenthesized and
    /// joined with AND in the order they were added.
    pub fn render(&self) -> Option<String> {
        match self.items.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(
                many.iter()
                    .map(|c| format!("({c})"))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        }
    }

    /// Append ` <keyword> <conditions>` to `sql` when there are conditions.
    pub(crate) fn write_clause(&self, sql: &mut String, keyword: &str) {
        if let Some(rendered) = self.render() {
            sql.push(' ');
            sql.push_str(keyword);
            sql.push(' ');
            sql.push_str(&rendered);
        }
    }
}

/// Generate the consuming WHERE helpers shared by SELECT, UPDATE and DELETE.
///
/// The target type must have `conditions: Conditions` and `params: Params` fields.
macro_rules! where_methods {
    ($ty:ident) => {
        impl<R: $crate::schema::Record> $ty<R> {
            /// Add a WHERE condition with its own `$1..$N` arguments.
            ///
            /// Placeholders are renumbered to follow the arguments already
            /// bound. If exactly one argument is passed, `$?` also refers to
            /// it; with several arguments `$?` is NOT resolved and the
            /// condition must use `$1`, `$2`, ... instead.
            pub fn where_sql(mut self, condition: &str, args: Vec<$crate::value::Value>) -> Self {
                self.conditions.push_sql(&mut self.params, condition, args);
                self
            }

            /// Add a WHERE condition without arguments.
            pub fn where_raw(mut self, condition: &str) -> Self {
                self.conditions.push_raw(condition);
                self
            }

            /// Add WHERE: column = value
            pub fn eq(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "=", value.to_value());
                self
            }

            /// Add WHERE: column <> value
            pub fn ne(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "<>", value.to_value());
                self
            }

            /// Add WHERE: column > value
            pub fn gt(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, ">", value.to_value());
                self
            }

            /// Add WHERE: column >= value
            pub fn gte(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, ">=", value.to_value());
                self
            }

            /// Add WHERE: column < value
            pub fn lt(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "<", value.to_value());
                self
            }

            /// Add WHERE: column <= value
            pub fn lte(mut self, column: &str, value: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "<=", value.to_value());
                self
            }

            /// Add WHERE: column LIKE pattern
            pub fn like(mut self, column: &str, pattern: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "LIKE", pattern.to_value());
                self
            }

            /// Add WHERE: column ILIKE pattern
            pub fn ilike(mut self, column: &str, pattern: impl $crate::value::ToValue) -> Self {
                self.conditions.compare(&mut self.params, column, "ILIKE", pattern.to_value());
                self
            }

            /// Add WHERE: column IS NULL
            pub fn is_null(mut self, column: &str) -> Self {
                self.conditions.push_raw(&format!("{column} IS NULL"));
                self
            }

            /// Add WHERE: column IS NOT NULL
            pub fn is_not_null(mut self, column: &str) -> Self {
                self.conditions.push_raw(&format!("{column} IS NOT NULL"));
                self
            }

            /// Add WHERE: column IN (values...)
            pub fn in_list<T: $crate::value::ToValue>(mut self, column: &str, values: Vec<T>) -> Self {
                let values = values.iter().map($crate::value::ToValue::to_value).collect();
                self.conditions.in_list(&mut self.params, column, values);
                self
            }
        }
    };
}

pub(crate) use where_methods;
