//! Attribute parsing for the Record derive macro.
//!
//! Handles struct-level and field-level `#[orm(...)]` attributes.

use syn::{DeriveInput, Result};

/// Struct-level options.
#[derive(Default)]
pub(crate) struct StructAttr {
    pub table: Option<String>,
}

/// Field-level options.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub column: Option<String>,
    pub external: Option<String>,
    pub jsonb: Option<String>,
    pub strict: bool,
    pub hidden: bool,
    pub embed: bool,
    pub skip: bool,
}

/// One `key = "value"` pair or a bare `flag`.
enum Item {
    Pair(syn::Ident, syn::LitStr),
    Flag(syn::Ident),
}

struct Items(Vec<Item>);

impl syn::parse::Parse for Items {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut items = Vec::new();
        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if input.peek(syn::Token![=]) {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                items.push(Item::Pair(ident, value));
            } else {
                items.push(Item::Flag(ident));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }
        Ok(Items(items))
    }
}

fn orm_items(attrs: &[syn::Attribute]) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("orm") {
            items.extend(attr.parse_args::<Items>()?.0);
        }
    }
    Ok(items)
}

fn unknown(ident: &syn::Ident) -> syn::Error {
    syn::Error::new_spanned(ident, format!("unknown orm attribute `{ident}`"))
}

pub(crate) fn struct_attr(input: &DeriveInput) -> Result<StructAttr> {
    let mut out = StructAttr::default();
    for item in orm_items(&input.attrs)? {
        match item {
            Item::Pair(key, value) if key == "table" => out.table = Some(value.value()),
            Item::Pair(key, _) | Item::Flag(key) => return Err(unknown(&key)),
        }
    }
    Ok(out)
}

pub(crate) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for item in orm_items(&field.attrs)? {
        match item {
            Item::Pair(key, value) => {
                let slot = if key == "column" {
                    &mut out.column
                } else if key == "external" {
                    &mut out.external
                } else if key == "jsonb" {
                    &mut out.jsonb
                } else {
                    return Err(unknown(&key));
                };
                *slot = Some(value.value());
            }
            Item::Flag(key) => {
                let flag = if key == "strict" {
                    &mut out.strict
                } else if key == "hidden" {
                    &mut out.hidden
                } else if key == "embed" {
                    &mut out.embed
                } else if key == "skip" {
                    &mut out.skip
                } else {
                    return Err(unknown(&key));
                };
                *flag = true;
            }
        }
    }

    if out.embed && (out.column.is_some() || out.jsonb.is_some() || out.external.is_some()) {
        return Err(syn::Error::new_spanned(
            field,
            "#[orm(embed)] cannot be combined with column, external or jsonb",
        ));
    }
    if out.strict && out.jsonb.is_none() {
        return Err(syn::Error::new_spanned(
            field,
            "#[orm(strict)] only applies to jsonb fields",
        ));
    }
    Ok(out)
}
