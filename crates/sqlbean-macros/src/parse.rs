//! Parsing logic for the Bean derive macro.
//!
//! This module extracts struct-level and field-level `#[bean(...)]`
//! attributes from the derive input to build `BeanDef` and `FieldDef`
//! structures used for code generation.

use proc_macro2::Span;
use quote::ToTokens;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

use crate::infer::is_option_type;

/// Parsed bean definition from a struct with `#[derive(Bean)]`.
#[derive(Debug)]
pub struct BeanDef {
    /// The struct name (e.g., `UserInfo`).
    pub name: Ident,
    /// Explicit table name from `#[bean(table = "...")]`.
    pub table_name: Option<String>,
    /// `#[bean(no_cache)]`
    pub no_cache: bool,
    /// Persisted fields, in declaration order. Skipped fields are not listed.
    pub fields: Vec<FieldDef>,
    /// Struct-level composite indexes.
    pub indexes: Vec<IndexDef>,
    /// Generic parameters from the struct.
    pub generics: Generics,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    pub ty: Type,
    /// Explicit column name
    pub column: Option<String>,
    /// Explicit SQL type string from `sql_type = "..."`
    pub sql_type: Option<String>,
    /// String length from `len = N`
    pub len: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub created: bool,
    pub updated: bool,
    pub deleted: bool,
    pub version: bool,
    pub json: bool,
    /// `unique` (empty name) or `unique = "name"`
    pub unique: Option<String>,
    /// `index` (empty name) or `index = "name"`
    pub index: Option<String>,
    pub default: Option<String>,
    /// Whether the Rust type is `Option<T>`
    pub is_option: bool,
}

/// A struct-level `index(...)` or `unique(...)` declaration.
#[derive(Debug)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub span: Span,
}

/// Parse a derive input into a bean definition.
pub fn parse_bean(input: &DeriveInput) -> Result<BeanDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let StructAttrs {
        table_name,
        no_cache,
        indexes,
    } = parse_struct_bean_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Bean can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Bean can only be derived for structs, not unions",
            ));
        }
    };

    Ok(BeanDef {
        name,
        table_name,
        no_cache,
        fields,
        indexes,
        generics,
    })
}

struct StructAttrs {
    table_name: Option<String>,
    no_cache: bool,
    indexes: Vec<IndexDef>,
}

fn parse_struct_bean_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut table_name: Option<String> = None;
    let mut no_cache = false;
    let mut indexes = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("bean") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(meta.path, "duplicate bean attribute: table"));
                }
                table_name = Some(string_value(&meta, "table")?);
            } else if meta.path.is_ident("no_cache") {
                no_cache = true;
            } else if meta.path.is_ident("index") || meta.path.is_ident("unique") {
                let unique = meta.path.is_ident("unique");
                indexes.push(parse_index_decl(&meta, unique)?);
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    &meta.path,
                    format!(
                        "unknown bean attribute `{attr_name}`. \
                         Valid struct attributes are: table, no_cache, index(...), unique(...)"
                    ),
                ));
            }
            Ok(())
        })?;
    }

    Ok(StructAttrs {
        table_name,
        no_cache,
        indexes,
    })
}

/// `index(name = "...", columns = "a, b")`
fn parse_index_decl(meta: &ParseNestedMeta<'_>, unique: bool) -> Result<IndexDef> {
    let span = meta.path.span();
    let mut name: Option<String> = None;
    let mut columns: Option<Vec<String>> = None;

    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("name") {
            name = Some(string_value(&nested, "name")?);
        } else if nested.path.is_ident("columns") {
            let raw = string_value(&nested, "columns")?;
            columns = Some(
                raw.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            );
        } else {
            return Err(Error::new_spanned(
                &nested.path,
                "expected `name = \"...\"` or `columns = \"...\"`",
            ));
        }
        Ok(())
    })?;

    let columns = columns
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::new(span, "index declaration needs `columns = \"a, b\"`"))?;
    let name = name.unwrap_or_else(|| columns.join("_"));
    Ok(IndexDef {
        name,
        columns,
        unique,
        span,
    })
}

/// Parse all fields from a struct.
fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => {
            let mut out = Vec::new();
            for field in &named.named {
                if let Some(def) = parse_field(field)? {
                    out.push(def);
                }
            }
            Ok(out)
        }
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Bean requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Bean requires a struct with fields, not a unit struct",
        )),
    }
}

/// Parse a single field; `None` when the field is skipped.
fn parse_field(field: &Field) -> Result<Option<FieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let ty = field.ty.clone();
    let is_option = is_option_type(&ty);

    let attrs = parse_field_attrs(&field.attrs)?;
    validate_field_attrs(&attrs, &name, is_option)?;
    if attrs.skip {
        return Ok(None);
    }

    // Soft-delete markers must be able to hold NULL.
    let nullable = attrs
        .nullable
        .unwrap_or(is_option || attrs.deleted);

    Ok(Some(FieldDef {
        name,
        ty,
        column: attrs.column,
        sql_type: attrs.sql_type,
        len: attrs.len,
        nullable,
        primary_key: attrs.primary_key,
        auto_increment: attrs.auto_increment,
        created: attrs.created,
        updated: attrs.updated,
        deleted: attrs.deleted,
        version: attrs.version,
        json: attrs.json,
        unique: attrs.unique,
        index: attrs.index,
        default: attrs.default,
        is_option,
    }))
}

/// Intermediate struct for collecting field attributes.
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    sql_type: Option<String>,
    len: Option<u32>,
    nullable: Option<bool>,
    primary_key: bool,
    auto_increment: bool,
    created: bool,
    updated: bool,
    deleted: bool,
    version: bool,
    json: bool,
    unique: Option<String>,
    index: Option<String>,
    default: Option<String>,
    skip: bool,
    saw_null: bool,
    saw_notnull: bool,
}

/// Parse all `#[bean(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("bean") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("pk") {
                result.primary_key = true;
            } else if path.is_ident("autoincr") {
                result.auto_increment = true;
            } else if path.is_ident("created") {
                result.created = true;
            } else if path.is_ident("updated") {
                result.updated = true;
            } else if path.is_ident("deleted") {
                result.deleted = true;
            } else if path.is_ident("version") {
                result.version = true;
            } else if path.is_ident("json") {
                result.json = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("null") {
                result.saw_null = true;
                result.nullable = Some(true);
            } else if path.is_ident("notnull") {
                result.saw_notnull = true;
                result.nullable = Some(false);
            } else if path.is_ident("unique") {
                result.unique = Some(optional_string_value(&meta, "unique")?);
            } else if path.is_ident("index") {
                result.index = Some(optional_string_value(&meta, "index")?);
            } else if path.is_ident("column") {
                result.column = Some(string_value(&meta, "column")?);
            } else if path.is_ident("sql_type") {
                result.sql_type = Some(string_value(&meta, "sql_type")?);
            } else if path.is_ident("default") {
                result.default = Some(string_value(&meta, "default")?);
            } else if path.is_ident("len") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Int(lit_int) = value {
                    let len = lit_int.base10_parse::<u32>().map_err(|_| {
                        Error::new_spanned(&lit_int, "len must be a positive integer")
                    })?;
                    if len == 0 {
                        return Err(Error::new_spanned(&lit_int, "len must be greater than 0"));
                    }
                    result.len = Some(len);
                } else {
                    return Err(Error::new_spanned(value, "expected integer literal for len"));
                }
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown bean attribute `{attr_name}`. \
                         Valid attributes are: pk, autoincr, created, updated, deleted, \
                         version, unique, index, notnull, null, len, column, sql_type, \
                         default, json, skip"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    Ok(result)
}

/// Validate that attribute combinations make sense.
fn validate_field_attrs(attrs: &FieldAttrs, field_name: &Ident, is_option: bool) -> Result<()> {
    if attrs.skip
        && (attrs.primary_key
            || attrs.auto_increment
            || attrs.created
            || attrs.updated
            || attrs.deleted
            || attrs.version)
    {
        return Err(Error::new_spanned(
            field_name,
            "`skip` cannot be combined with column tags",
        ));
    }

    if attrs.saw_null && attrs.saw_notnull {
        return Err(Error::new_spanned(
            field_name,
            "cannot use both `null` and `notnull` on the same field",
        ));
    }

    if attrs.primary_key && attrs.saw_null {
        return Err(Error::new_spanned(
            field_name,
            "primary key columns cannot be `null`",
        ));
    }

    let lifecycle = [attrs.created, attrs.updated, attrs.deleted, attrs.version]
        .iter()
        .filter(|&&b| b)
        .count();
    if lifecycle > 1 {
        return Err(Error::new_spanned(
            field_name,
            "a field can carry only one of `created`, `updated`, `deleted`, `version`",
        ));
    }

    if attrs.version && is_option {
        return Err(Error::new_spanned(
            field_name,
            "`version` fields must be plain integers, not Option",
        ));
    }

    if attrs.json && attrs.sql_type.is_some() {
        return Err(Error::new_spanned(
            field_name,
            "`json` fields are stored as TEXT; drop the `sql_type`",
        ));
    }

    Ok(())
}

fn string_value(meta: &ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {what}"),
        ))
    }
}

/// `flag` or `flag = "name"`; the bare form yields an empty name.
fn optional_string_value(meta: &ParseNestedMeta<'_>, what: &str) -> Result<String> {
    if meta.input.peek(syn::Token![=]) {
        string_value(meta, what)
    } else {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_field_tags() {
        let input: DeriveInput = parse_quote! {
            #[bean(table = "users", no_cache)]
            struct User {
                #[bean(pk, autoincr)]
                id: i64,
                #[bean(unique, len = 64)]
                name: String,
                #[bean(index = "by_team", column = "team")]
                team_id: Option<i64>,
                #[bean(deleted)]
                deleted_at: Timestamp,
                #[bean(skip)]
                scratch: Vec<String>,
            }
        };
        let def = parse_bean(&input).unwrap();
        assert_eq!(def.table_name.as_deref(), Some("users"));
        assert!(def.no_cache);
        assert_eq!(def.fields.len(), 4);

        let id = &def.fields[0];
        assert!(id.primary_key && id.auto_increment && !id.nullable);

        let name = &def.fields[1];
        assert_eq!(name.unique.as_deref(), Some(""));
        assert_eq!(name.len, Some(64));

        let team = &def.fields[2];
        assert_eq!(team.index.as_deref(), Some("by_team"));
        assert_eq!(team.column.as_deref(), Some("team"));
        assert!(team.nullable && team.is_option);

        // deleted markers default to nullable even when not Option
        assert!(def.fields[3].nullable);
    }

    #[test]
    fn test_parse_struct_indexes() {
        let input: DeriveInput = parse_quote! {
            #[bean(index(name = "ab", columns = "a, b"), unique(columns = "c"))]
            struct Probe {
                a: i32,
                b: i32,
                c: i32,
            }
        };
        let def = parse_bean(&input).unwrap();
        assert_eq!(def.indexes.len(), 2);
        assert_eq!(def.indexes[0].name, "ab");
        assert_eq!(def.indexes[0].columns, vec!["a", "b"]);
        assert!(def.indexes[1].unique);
        assert_eq!(def.indexes[1].name, "c");
    }

    #[test]
    fn test_rejects_unknown_attribute() {
        let input: DeriveInput = parse_quote! {
            struct Probe {
                #[bean(primary)]
                id: i64,
            }
        };
        let err = parse_bean(&input).unwrap_err();
        assert!(err.to_string().contains("unknown bean attribute `primary`"));
    }

    #[test]
    fn test_rejects_conflicting_tags() {
        let input: DeriveInput = parse_quote! {
            struct Probe {
                #[bean(created, updated)]
                stamp: Timestamp,
            }
        };
        assert!(parse_bean(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Probe {
                #[bean(null, notnull)]
                name: String,
            }
        };
        assert!(parse_bean(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Probe {
                #[bean(version)]
                ver: Option<i32>,
            }
        };
        assert!(parse_bean(&input).is_err());
    }

    #[test]
    fn test_rejects_enum() {
        let input: DeriveInput = parse_quote! {
            enum Nope { A }
        };
        assert!(parse_bean(&input).is_err());
    }
}
