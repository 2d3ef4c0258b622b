//! Naming strategies for tables, columns and external (JSON) names.

use heck::{ToLowerCamelCase, ToSnakeCase};

/// Derives storage and external names from Rust identifiers.
///
/// Explicit names given on a field or schema always win over the strategy.
pub trait NamingStrategy: Send + Sync {
    /// Table name for a record type (`type_name` is the bare struct name).
    fn table_name(&self, type_name: &str) -> String;

    /// Column name for a field.
    fn column_name(&self, field: &str) -> String;

    /// Name used for the field in external JSON input.
    fn external_name(&self, field: &str) -> String;
}

/// Default strategy: snake_case columns, camelCase external names and
/// pluralized snake_case table names (`Category` -> `categories`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SnakeCase;

impl NamingStrategy for SnakeCase {
    fn table_name(&self, type_name: &str) -> String {
        pluralize(&type_name.to_snake_case())
    }

    fn column_name(&self, field: &str) -> String {
        field.to_snake_case()
    }

    fn external_name(&self, field: &str) -> String {
        field.to_lower_camel_case()
    }
}

/// Keeps identifiers as written; table names are not pluralized.
#[derive(Clone, Copy, Debug, Default)]
pub struct Verbatim;

impl NamingStrategy for Verbatim {
    fn table_name(&self, type_name: &str) -> String {
        type_name.to_string()
    }

    fn column_name(&self, field: &str) -> String {
        field.to_string()
    }

    fn external_name(&self, field: &str) -> String {
        field.to_string()
    }
}

/// English plural of a snake_case word.
pub fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u') | None) {
            return format!("{stem}ies");
        }
    }
    let sibilant = ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix));
    if sibilant {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// Bare type name from `std::any::type_name` (module path and generics removed).
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
