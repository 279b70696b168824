//! Compile-time validation for the Bean derive macro.
//!
//! Problems that only depend on the struct's own declaration are reported
//! here, all at once. Checks that need the mapped names (duplicate mapped
//! columns, index columns) run in the registry when the bean is first used.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::{Error, GenericArgument, PathArguments, Type};

use crate::parse::{BeanDef, FieldDef};

/// Validate a parsed bean definition.
///
/// Performs all validations and returns combined errors if any issues are found.
pub fn validate_bean(bean: &BeanDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    validate_has_fields(bean, &mut errors);
    if let Some(table) = &bean.table_name {
        validate_table_name(table, bean.name.span(), &mut errors);
    }
    validate_no_duplicate_columns(bean, &mut errors);

    for field in &bean.fields {
        validate_type(&field.ty, field.name.span(), &mut errors);
        validate_json_field(field, &mut errors);
    }

    validate_single_auto_increment(bean, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

fn validate_has_fields(bean: &BeanDef, errors: &mut Vec<Error>) {
    if bean.fields.is_empty() {
        errors.push(Error::new(
            bean.name.span(),
            "Bean struct must have at least one persisted field",
        ));
    }
}

/// Validate that the table name doesn't contain SQL injection characters.
fn validate_table_name(table_name: &str, span: Span, errors: &mut Vec<Error>) {
    const DANGEROUS_CHARS: &[char] = &[';', '\'', '"', '`', '-', '/', '*', '\\', '\0', '\n', '\r'];

    if let Some(ch) = table_name.chars().find(|c| DANGEROUS_CHARS.contains(c)) {
        errors.push(Error::new(
            span,
            format!(
                "table name contains invalid character '{ch}'; \
                 table names should only contain alphanumeric characters and underscores"
            ),
        ));
        return;
    }

    if table_name.trim().is_empty() {
        errors.push(Error::new(span, "table name cannot be empty or whitespace"));
        return;
    }

    if let Some(first) = table_name.chars().next() {
        if !first.is_alphabetic() && first != '_' {
            errors.push(Error::new(
                span,
                format!("table name must start with a letter or underscore, got '{first}'"),
            ));
        }
    }
}

/// Explicit `column = "..."` names must not collide with each other or
/// with another field's name.
fn validate_no_duplicate_columns(bean: &BeanDef, errors: &mut Vec<Error>) {
    let mut seen: HashSet<String> = HashSet::new();
    for field in &bean.fields {
        let column = field
            .column
            .clone()
            .unwrap_or_else(|| field.name.to_string());
        if !seen.insert(column.to_lowercase()) {
            errors.push(Error::new(
                field.name.span(),
                format!("duplicate column name '{column}'; another field already maps to this column"),
            ));
        }
    }
}

fn validate_single_auto_increment(bean: &BeanDef, errors: &mut Vec<Error>) {
    let mut autos = bean.fields.iter().filter(|f| f.auto_increment);
    if autos.next().is_some() {
        for extra in autos {
            errors.push(Error::new(
                extra.name.span(),
                "only one field may be `autoincr`",
            ));
        }
    }
}

fn validate_json_field(field: &FieldDef, errors: &mut Vec<Error>) {
    if field.json && field.primary_key {
        errors.push(Error::new(
            field.name.span(),
            "`json` fields cannot be part of the primary key",
        ));
    }
}

/// Reject Rust types that can never round-trip through a column.
fn validate_type(ty: &Type, span: Span, errors: &mut Vec<Error>) {
    if is_nested_option(ty) {
        errors.push(Error::new(
            span,
            "nested Option<Option<T>> is ambiguous and not supported; \
             use a single Option<T> or a custom type",
        ));
    }

    if matches!(ty, Type::Reference(_)) {
        errors.push(Error::new(
            span,
            "reference types (&T) are not supported; use owned types instead",
        ));
    }

    if matches!(ty, Type::Ptr(_)) {
        errors.push(Error::new(
            span,
            "raw pointer types (*const T, *mut T) are not supported; use owned types instead",
        ));
    }
}

/// Check if a type is Option<Option<T>> (nested Option).
fn is_nested_option(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(Type::Path(inner_path))) = args.args.first() {
                        if let Some(inner_seg) = inner_path.path.segments.last() {
                            return inner_seg.ident == "Option";
                        }
                    }
                }
            }
        }
    }
    false
}
