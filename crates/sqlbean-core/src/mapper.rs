//! Naming conventions from Rust identifiers to table and column names.

use std::fmt;
use std::sync::Arc;

/// Maps Rust struct and field names to SQL names.
pub trait NameMapper: Send + Sync + fmt::Debug {
    /// Struct name → table name.
    fn table_name(&self, struct_name: &str) -> String;

    /// Field name → column name.
    fn column_name(&self, field_name: &str) -> String;
}

/// `UserInfo` → `user_info`, `user_id` stays `user_id`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnakeMapper;

impl NameMapper for SnakeMapper {
    fn table_name(&self, struct_name: &str) -> String {
        to_snake_case(struct_name)
    }

    fn column_name(&self, field_name: &str) -> String {
        to_snake_case(field_name)
    }
}

/// Names are used as written.
#[derive(Debug, Default, Clone, Copy)]
pub struct SameMapper;

impl NameMapper for SameMapper {
    fn table_name(&self, struct_name: &str) -> String {
        struct_name.to_string()
    }

    fn column_name(&self, field_name: &str) -> String {
        field_name.to_string()
    }
}

/// Wraps another mapper, prefixing table names. Column names are untouched.
#[derive(Debug, Clone)]
pub struct PrefixMapper {
    inner: Arc<dyn NameMapper>,
    prefix: String,
}

impl PrefixMapper {
    pub fn new(inner: Arc<dyn NameMapper>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl NameMapper for PrefixMapper {
    fn table_name(&self, struct_name: &str) -> String {
        format!("{}{}", self.prefix, self.inner.table_name(struct_name))
    }

    fn column_name(&self, field_name: &str) -> String {
        self.inner.column_name(field_name)
    }
}

/// Wraps another mapper, suffixing table names. Column names are untouched.
#[derive(Debug, Clone)]
pub struct SuffixMapper {
    inner: Arc<dyn NameMapper>,
    suffix: String,
}

impl SuffixMapper {
    pub fn new(inner: Arc<dyn NameMapper>, suffix: impl Into<String>) -> Self {
        Self {
            inner,
            suffix: suffix.into(),
        }
    }
}

impl NameMapper for SuffixMapper {
    fn table_name(&self, struct_name: &str) -> String {
        format!("{}{}", self.inner.table_name(struct_name), self.suffix)
    }

    fn column_name(&self, field_name: &str) -> String {
        self.inner.column_name(field_name)
    }
}

/// Convert `CamelCase` (or already snake) identifiers to `snake_case`.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
                // "FooBar" -> "foo_bar", "HTTPStatus" -> "http_status"
                if (prev.is_lowercase() || prev.is_ascii_digit())
                    || (next_lower && prev.is_uppercase())
                {
                    result.push('_');
                }
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
