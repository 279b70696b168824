//! SQL type inference from Rust types.
//!
//! Inference is syntactic: the field type is matched by its written path.
//! Types with no known SQL representation yield `None`; the registry turns
//! that into an `UnsupportedFieldType` error the first time the bean is used.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Infer the SQL type of a field, returning tokens that construct a
/// `sqlbean_core::SqlType`, or `None` when the type is not mappable.
///
/// `len` overrides the length of string types (`VARCHAR(len)`).
pub fn infer_sql_type(ty: &Type, len: Option<u32>) -> Option<TokenStream> {
    let inner_ty = unwrap_option_type(ty);
    let type_str = type_to_string(inner_ty);

    let tokens = match type_str.as_str() {
        "bool" => quote! { sqlbean_core::SqlType::Boolean },

        "i8" => quote! { sqlbean_core::SqlType::TinyInt },
        "i16" => quote! { sqlbean_core::SqlType::SmallInt },
        "i32" => quote! { sqlbean_core::SqlType::Integer },
        "i64" => quote! { sqlbean_core::SqlType::BigInt },

        // Unsigned integers widen to the next signed type
        "u8" => quote! { sqlbean_core::SqlType::SmallInt },
        "u16" => quote! { sqlbean_core::SqlType::Integer },
        "u32" => quote! { sqlbean_core::SqlType::BigInt },

        "f32" => quote! { sqlbean_core::SqlType::Real },
        "f64" => quote! { sqlbean_core::SqlType::Double },

        "String" => {
            let len = len.unwrap_or(255);
            quote! { sqlbean_core::SqlType::VarChar(#len) }
        }
        "Vec<u8>" => quote! { sqlbean_core::SqlType::Blob },

        "Timestamp" | "sqlbean::Timestamp" | "sqlbean_core::Timestamp" => {
            quote! { sqlbean_core::SqlType::DateTime }
        }

        "serde_json::Value" => quote! { sqlbean_core::SqlType::Json },

        _ => return None,
    };
    Some(tokens)
}

/// Parse an explicit `sql_type = "..."` attribute into `SqlType` tokens.
///
/// Common names map onto their variants; anything else is passed through
/// verbatim as `SqlType::Custom`.
pub fn parse_sql_type_attr(sql_type: &str) -> TokenStream {
    let upper = sql_type.to_uppercase();
    let trimmed = upper.trim();

    if let Some(len) = parse_length(trimmed, "VARCHAR(") {
        return quote! { sqlbean_core::SqlType::VarChar(#len) };
    }
    if let Some(len) = parse_length(trimmed, "CHAR(") {
        return quote! { sqlbean_core::SqlType::Char(#len) };
    }
    for prefix in ["DECIMAL(", "NUMERIC("] {
        if let Some((p, s)) = parse_precision(trimmed, prefix) {
            return quote! { sqlbean_core::SqlType::Decimal { precision: #p, scale: #s } };
        }
    }

    match trimmed {
        "TINYINT" => quote! { sqlbean_core::SqlType::TinyInt },
        "SMALLINT" | "INT2" => quote! { sqlbean_core::SqlType::SmallInt },
        "INTEGER" | "INT" | "INT4" => quote! { sqlbean_core::SqlType::Integer },
        "BIGINT" | "INT8" => quote! { sqlbean_core::SqlType::BigInt },

        "REAL" | "FLOAT4" => quote! { sqlbean_core::SqlType::Real },
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => {
            quote! { sqlbean_core::SqlType::Double }
        }
        "DECIMAL" | "NUMERIC" => {
            quote! { sqlbean_core::SqlType::Decimal { precision: 38, scale: 18 } }
        }

        "BOOLEAN" | "BOOL" => quote! { sqlbean_core::SqlType::Boolean },

        "TEXT" => quote! { sqlbean_core::SqlType::Text },
        "VARCHAR" => quote! { sqlbean_core::SqlType::VarChar(255) },
        "CHAR" => quote! { sqlbean_core::SqlType::Char(1) },

        "BLOB" | "BYTEA" => quote! { sqlbean_core::SqlType::Blob },

        "DATE" => quote! { sqlbean_core::SqlType::Date },
        "TIME" => quote! { sqlbean_core::SqlType::Time },
        "DATETIME" => quote! { sqlbean_core::SqlType::DateTime },
        "TIMESTAMP" => quote! { sqlbean_core::SqlType::Timestamp },

        "JSON" => quote! { sqlbean_core::SqlType::Json },

        _ => {
            let custom = sql_type.trim();
            quote! { sqlbean_core::SqlType::Custom(#custom) }
        }
    }
}

fn parse_length(s: &str, prefix: &str) -> Option<u32> {
    s.strip_prefix(prefix)?
        .strip_suffix(')')?
        .trim()
        .parse::<u32>()
        .ok()
}

fn parse_precision(s: &str, prefix: &str) -> Option<(u8, u8)> {
    let (p, sc) = s.strip_prefix(prefix)?.strip_suffix(')')?.split_once(',')?;
    Some((p.trim().parse().ok()?, sc.trim().parse().ok()?))
}

/// Check whether a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    !std::ptr::eq(unwrap_option_type(ty), ty)
}

/// Unwrap Option<T> to get the inner type, or return the original type.
pub fn unwrap_option_type(ty: &Type) -> &Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return inner;
                    }
                }
            }
        }
    }
    ty
}

/// Convert a Type to a simplified string representation for matching.
pub fn type_to_string(ty: &Type) -> String {
    use quote::ToTokens;
    ty.to_token_stream().to_string().replace(' ', "")
}
