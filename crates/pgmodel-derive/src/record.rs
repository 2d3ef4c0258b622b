//! Record derive macro implementation

use crate::attrs::{field_attr, struct_attr};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let table = struct_attr(&input)?.table.map(|table| quote! { .table(#table) });

    let mut registrations = Vec::new();
    for field in fields {
        let attr = field_attr(field)?;
        if attr.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.to_string();
        let get = quote! { |r: &#name| &r.#ident };
        let get_mut = quote! { |r: &mut #name| &mut r.#ident };

        if attr.embed {
            registrations.push(quote! { .embed(#field_name, #get, #get_mut) });
            continue;
        }

        let mut desc = match &attr.jsonb {
            Some(group) => quote! { ::pgmodel::Field::jsonb(#field_name, #group, #get, #get_mut) },
            None => quote! { ::pgmodel::Field::column(#field_name, #get, #get_mut) },
        };
        if let Some(column) = &attr.column {
            desc = quote! { #desc.column_name(#column) };
        }
        if let Some(external) = &attr.external {
            desc = quote! { #desc.external_name(#external) };
        }
        if attr.strict {
            desc = quote! { #desc.strict() };
        }
        if attr.hidden {
            desc = quote! { #desc.hidden() };
        }
        registrations.push(quote! { .field(#desc) });
    }

    Ok(quote! {
        impl ::pgmodel::Record for #name {
            fn schema() -> &'static ::pgmodel::Schema<Self> {
                static SCHEMA: ::std::sync::OnceLock<::pgmodel::Schema<#name>> =
                    ::std::sync::OnceLock::new();
                ::pgmodel::schema::register(&SCHEMA, || {
                    ::pgmodel::Schema::<#name>::builder()
                        #table
                        #(#registrations)*
                        .build()
                })
            }
        }

        ::pgmodel::impl_record_binding!(#name);
    })
}
