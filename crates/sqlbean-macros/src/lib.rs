//! Procedural macros for sqlbean.
//!
//! `sqlbean-macros` is the compile-time codegen layer. `#[derive(Bean)]`
//! turns a plain struct into a bean: a static table of field declarations
//! plus positional accessors that move field values in and out of
//! `sqlbean_core::Value`. Names, indexes and lifecycle columns are resolved
//! later by the metadata registry, so a naming convention change never
//! requires recompiling.

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod infer;
mod parse;
mod validate;

use parse::{BeanDef, FieldDef, parse_bean};

/// Derive macro for the `Bean` trait.
///
/// # Field attributes
///
/// - `#[bean(pk)]`, `#[bean(autoincr)]` - primary key / generated key
/// - `#[bean(created)]`, `#[bean(updated)]` - stamped with the current time
/// - `#[bean(deleted)]` - soft-delete marker
/// - `#[bean(version)]` - optimistic-lock counter
/// - `#[bean(unique)]`, `#[bean(unique = "name")]` - unique index (named ones group columns)
/// - `#[bean(index)]`, `#[bean(index = "name")]` - plain index
/// - `#[bean(null)]`, `#[bean(notnull)]` - override nullability (defaults to `Option<T>`-ness)
/// - `#[bean(len = 64)]` - VARCHAR length for strings
/// - `#[bean(column = "name")]` - explicit column name
/// - `#[bean(sql_type = "TEXT")]` - explicit SQL type
/// - `#[bean(default = "0")]` - SQL default expression
/// - `#[bean(json)]` - store the field as JSON text
/// - `#[bean(skip)]` - not persisted
///
/// # Struct attributes
///
/// - `#[bean(table = "name")]` - explicit table name
/// - `#[bean(no_cache)]` - never cache results for this type
/// - `#[bean(index(name = "n", columns = "a, b"))]`, `#[bean(unique(...))]` - composite indexes
///
/// # Example
///
/// ```ignore
/// use sqlbean::{Bean, Timestamp};
///
/// #[derive(Bean, Default)]
/// struct Account {
///     #[bean(pk, autoincr)]
///     id: i64,
///     #[bean(unique, len = 64)]
///     name: String,
///     #[bean(version)]
///     version: i32,
///     #[bean(deleted)]
///     deleted_at: Option<Timestamp>,
/// }
/// ```
#[proc_macro_derive(Bean, attributes(bean))]
pub fn derive_bean(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let bean = match parse_bean(&input) {
        Ok(b) => b,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_bean(&bean) {
        return e.to_compile_error().into();
    }

    generate_bean_impl(&bean).into()
}

/// How a field's value crosses the `Value` boundary.
enum Codec {
    /// `Value::from` / `FromValue`
    Direct,
    /// JSON text through serde
    Json,
    /// No SQL representation; accessors fail at runtime
    Unsupported,
}

fn codec_of(field: &FieldDef) -> Codec {
    if field.json {
        Codec::Json
    } else if field.sql_type.is_some() || infer::infer_sql_type(&field.ty, field.len).is_some() {
        Codec::Direct
    } else {
        Codec::Unsupported
    }
}

/// Generate the Bean trait implementation from a parsed definition.
fn generate_bean_impl(bean: &BeanDef) -> proc_macro2::TokenStream {
    let name = &bean.name;
    let struct_name = name.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = bean.generics.split_for_impl();

    let table_ts = match &bean.table_name {
        Some(t) => quote::quote! { Some(#t) },
        None => quote::quote! { None },
    };
    let cacheable = !bean.no_cache;

    let field_infos = generate_field_infos(bean);
    let field_count = bean.fields.len();
    let index_infos = generate_index_infos(bean);
    let index_count = bean.indexes.len();
    let getters = generate_field_value(bean);
    let setters = generate_set_field_value(bean);

    quote::quote! {
        impl #impl_generics sqlbean_core::Bean for #name #ty_generics #where_clause {
            const STRUCT_NAME: &'static str = #struct_name;
            const TABLE_NAME: Option<&'static str> = #table_ts;
            const CACHEABLE: bool = #cacheable;

            fn fields() -> &'static [sqlbean_core::FieldInfo] {
                static FIELDS: [sqlbean_core::FieldInfo; #field_count] = [#(#field_infos),*];
                &FIELDS
            }

            fn indexes() -> &'static [sqlbean_core::IndexInfo] {
                static INDEXES: [sqlbean_core::IndexInfo; #index_count] = [#(#index_infos),*];
                &INDEXES
            }

            fn field_value(&self, index: usize) -> sqlbean_core::Result<sqlbean_core::Value> {
                match index {
                    #(#getters)*
                    _ => Err(sqlbean_core::bean::field_index_error(Self::STRUCT_NAME, index)),
                }
            }

            fn set_field_value(
                &mut self,
                index: usize,
                value: &sqlbean_core::Value,
            ) -> sqlbean_core::Result<()> {
                match index {
                    #(#setters)*
                    _ => return Err(sqlbean_core::bean::field_index_error(Self::STRUCT_NAME, index)),
                }
                Ok(())
            }
        }
    }
}

/// One `FieldInfo` const-builder chain per field.
fn generate_field_infos(bean: &BeanDef) -> Vec<proc_macro2::TokenStream> {
    bean.fields
        .iter()
        .map(|field| {
            let field_name = field.name.unraw().to_string();
            let sql_type_ts = match codec_of(field) {
                Codec::Json => quote::quote! { Some(sqlbean_core::SqlType::Text) },
                _ => match &field.sql_type {
                    Some(explicit) => {
                        let ty = infer::parse_sql_type_attr(explicit);
                        quote::quote! { Some(#ty) }
                    }
                    None => match infer::infer_sql_type(&field.ty, field.len) {
                        Some(ty) => quote::quote! { Some(#ty) },
                        None => quote::quote! { None },
                    },
                },
            };

            let mut chain = quote::quote! {
                sqlbean_core::FieldInfo::new(#field_name, #sql_type_ts)
            };
            if let Some(col) = &field.column {
                chain.extend(quote::quote! { .column(#col) });
            }
            if field.nullable {
                chain.extend(quote::quote! { .nullable(true) });
            }
            if let Some(d) = &field.default {
                chain.extend(quote::quote! { .default_value(#d) });
            }
            for (flag, method) in [
                (field.primary_key, "primary_key"),
                (field.auto_increment, "auto_increment"),
                (field.created, "created"),
                (field.updated, "updated"),
                (field.deleted, "deleted"),
                (field.version, "version"),
                (field.json, "json"),
            ] {
                if flag {
                    let method = syn::Ident::new(method, proc_macro2::Span::call_site());
                    chain.extend(quote::quote! { .#method(true) });
                }
            }
            if let Some(u) = &field.unique {
                chain.extend(quote::quote! { .unique(#u) });
            }
            if let Some(i) = &field.index {
                chain.extend(quote::quote! { .index(#i) });
            }
            let rust_type = infer::type_to_string(&field.ty);
            chain.extend(quote::quote! { .rust_type(#rust_type) });
            chain
        })
        .collect()
}

fn generate_index_infos(bean: &BeanDef) -> Vec<proc_macro2::TokenStream> {
    bean.indexes
        .iter()
        .map(|idx| {
            let name = &idx.name;
            let columns = &idx.columns;
            let unique = idx.unique;
            quote::quote_spanned! { idx.span =>
                sqlbean_core::IndexInfo::new(#name, &[#(#columns),*], #unique)
            }
        })
        .collect()
}

fn generate_field_value(bean: &BeanDef) -> Vec<proc_macro2::TokenStream> {
    bean.fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let ident = &field.name;
            let body = match codec_of(field) {
                Codec::Direct => quote::quote! {
                    Ok(sqlbean_core::Value::from(::core::clone::Clone::clone(&self.#ident)))
                },
                Codec::Json => quote::quote! {
                    sqlbean_core::bean::encode_json(&self.#ident)
                },
                Codec::Unsupported => unsupported_tokens(field),
            };
            quote::quote! { #i => #body, }
        })
        .collect()
}

fn generate_set_field_value(bean: &BeanDef) -> Vec<proc_macro2::TokenStream> {
    bean.fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let ident = &field.name;
            let ty = &field.ty;
            let body = match codec_of(field) {
                // NULL into a non-Option field leaves its zero value.
                Codec::Direct if !field.is_option => quote::quote! {
                    if value.is_null() {
                        self.#ident = ::core::default::Default::default();
                    } else {
                        self.#ident = <#ty as sqlbean_core::FromValue>::from_value(value)?;
                    }
                },
                Codec::Direct => quote::quote! {
                    self.#ident = <#ty as sqlbean_core::FromValue>::from_value(value)?;
                },
                Codec::Json => quote::quote! {
                    self.#ident = sqlbean_core::bean::decode_json::<#ty>(value)?;
                },
                Codec::Unsupported => {
                    let err = unsupported_tokens(field);
                    quote::quote! { return #err; }
                }
            };
            quote::quote! { #i => { #body } }
        })
        .collect()
}

fn unsupported_tokens(field: &FieldDef) -> proc_macro2::TokenStream {
    let field_name = field.name.unraw().to_string();
    let rust_type = infer::type_to_string(&field.ty);
    quote::quote! {
        Err(sqlbean_core::bean::unsupported_field(Self::STRUCT_NAME, #field_name, #rust_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: syn::DeriveInput) -> String {
        let bean = parse_bean(&input).unwrap();
        generate_bean_impl(&bean).to_string()
    }

    #[test]
    fn test_generates_field_table() {
        let out = expand(parse_quote! {
            #[bean(table = "accounts")]
            struct Account {
                #[bean(pk, autoincr)]
                id: i64,
                #[bean(unique, len = 64)]
                name: String,
                #[bean(version)]
                ver: i32,
            }
        });
        assert!(out.contains("impl sqlbean_core :: Bean for Account"));
        assert!(out.contains("Some (\"accounts\")"));
        assert!(out.contains(". primary_key (true)"));
        assert!(out.contains(". auto_increment (true)"));
        assert!(out.contains("VarChar (64u32)"));
        assert!(out.contains(". version (true)"));
        assert!(out.contains("[sqlbean_core :: FieldInfo ; 3usize]"));
    }

    #[test]
    fn test_json_and_unsupported_fields() {
        let out = expand(parse_quote! {
            struct Doc {
                #[bean(pk)]
                id: i64,
                #[bean(json)]
                tags: Vec<String>,
                extra: HashMap<String, i32>,
            }
        });
        assert!(out.contains("encode_json"));
        assert!(out.contains("decode_json"));
        assert!(out.contains("unsupported_field"));
        assert!(out.contains("FieldInfo :: new (\"extra\" , None)"));
    }

    #[test]
    fn test_non_option_fields_zero_on_null() {
        let out = expand(parse_quote! {
            struct Probe {
                #[bean(pk)]
                id: i64,
                note: Option<String>,
            }
        });
        assert!(out.contains("if value . is_null ()"));
        assert!(out.contains("FromValue"));
    }

    #[test]
    fn test_no_cache_and_indexes() {
        let out = expand(parse_quote! {
            #[bean(no_cache, index(name = "ab", columns = "a, b"))]
            struct Probe {
                a: i32,
                b: i32,
            }
        });
        assert!(out.contains("const CACHEABLE : bool = false"));
        assert!(out.contains("IndexInfo :: new (\"ab\" , & [\"a\" , \"b\"] , false)"));
    }
}
