//! Derive macro for pgmodel
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod record;

/// Derive `Record` (field registry) plus result binding for a struct.
///
/// # Example
///
/// ```ignore
/// use pgmodel::Record;
///
/// #[derive(Debug, Default, Record)]
/// #[orm(table = "users")]
/// struct User {
///     id: i64,
///     #[orm(column = "user_name", external = "login")]
///     name: String,
///     #[orm(jsonb = "settings")]
///     theme: String,
///     #[orm(jsonb = "settings", strict)]
///     page_size: i32,
///     #[orm(embed)]
///     audit: Audit,
///     #[orm(hidden)]
///     password_hash: String,
///     #[orm(skip)]
///     cached: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// Struct:
/// - `#[orm(table = "name")]` - Table name (default: pluralized snake_case type name)
///
/// Field:
/// - `#[orm(column = "name")]` - Column name, or the key inside a JSONB column
/// - `#[orm(external = "name")]` - Name used for external JSON input
/// - `#[orm(jsonb = "column")]` - Store the field as a key of a JSONB column
/// - `#[orm(strict)]` - Fail binding when the JSONB value does not decode
/// - `#[orm(hidden)]` - Ignore the field for external JSON input
/// - `#[orm(embed)]` - Flatten the fields of another `Record` type
/// - `#[orm(skip)]` - Do not map the field
///
/// The struct must implement `Default`; bound fields are written into a
/// default instance.
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
