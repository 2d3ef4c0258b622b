//! Parameter ledger and placeholder renumbering.

use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+)").expect("invalid built-in placeholder regex"))
}

/// Shift every `$N` placeholder in `sql` to `$(N + offset)`.
///
/// `$?` and all other text are left untouched.
pub fn renumber(sql: &str, offset: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }
    placeholder_re()
        .replace_all(sql, |caps: &regex::Captures<'_>| match caps[1].parse::<usize>() {
            Ok(n) => format!("${}", n + offset),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// Ordered statement arguments: argument `N` is bound to `$N`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Append a value and return its 1-based index.
    pub fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len()
    }

    /// Append a value and return its `$N` placeholder.
    pub fn placeholder(&mut self, value: Value) -> String {
        format!("${}", self.push(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    /// Append a fragment numbered from `$1` relative to its own `args`.
    ///
    /// The fragment is renumbered by the current ledger length and the
    /// arguments are appended, so the returned text is valid in the
    /// enclosing statement.
    pub fn splice(&mut self, sql: &str, args: Vec<Value>) -> String {
        let text = renumber(sql, self.len());
        self.extend(args);
        text
    }

    /// Like [`Params::splice`], additionally resolving `$?` when exactly one
    /// argument accompanies the fragment.
    ///
    /// With zero or several arguments `$?` stays in the text as written.
    pub fn splice_condition(&mut self, sql: &str, args: Vec<Value>) -> String {
        let offset = self.len();
        let mut text = renumber(sql, offset);
        if args.len() == 1 {
            text = text.replace("$?", &format!("${}", offset + 1));
        }
        self.extend(args);
        text
    }

    /// Bind a single value into an expression such as `COALESCE($?, 0)` or
    /// `price * $1`, returning the rewritten expression.
    pub fn bind_expr(&mut self, expr: &str, value: Value) -> String {
        let idx = self.push(value);
        if expr.contains("$?") {
            expr.replace("$?", &format!("${idx}"))
        } else {
            renumber(expr, idx - 1)
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}
