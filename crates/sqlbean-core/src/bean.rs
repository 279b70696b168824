//! Bean trait for struct ↔ table mapping.
//!
//! A bean is a plain struct whose persisted fields are described by a static
//! [`FieldInfo`] table and read/written positionally through [`Value`]s.
//! It is normally derived with `#[derive(Bean)]` from `sqlbean-macros`.

use crate::Result;
use crate::error::{ConversionError, Error, MetadataErrorKind};
use crate::field::{FieldInfo, IndexInfo};
use crate::value::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use sqlbean::Bean;
///
/// #[derive(Bean, Default)]
/// struct User {
///     #[bean(pk, autoincr)]
///     id: i64,
///     #[bean(unique, len = 64)]
///     name: String,
///     #[bean(version)]
///     version: i32,
///     #[bean(deleted)]
///     deleted_at: Option<sqlbean::Timestamp>,
/// }
/// ```
pub trait Bean: Default + Send + Sync + 'static {
    /// The Rust struct name, for messages and default table naming.
    const STRUCT_NAME: &'static str;

    /// Explicit table name; `None` lets the name mapper derive one.
    const TABLE_NAME: Option<&'static str> = None;

    /// Whether results for this type may be cached.
    const CACHEABLE: bool = true;

    /// Persisted fields in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Struct-level composite indexes.
    fn indexes() -> &'static [IndexInfo] {
        &[]
    }

    /// Read the field at `index` (position in [`Bean::fields`]).
    fn field_value(&self, index: usize) -> Result<Value>;

    /// Write the field at `index` from a database value.
    fn set_field_value(&mut self, index: usize, value: &Value) -> Result<()>;
}

/// Out-of-range field index, raised by derived accessors.
pub fn field_index_error(bean: &'static str, index: usize) -> Error {
    Error::invalid_metadata(bean, format!("no persisted field at position {}", index))
}

/// Access to a field whose Rust type has no SQL representation.
pub fn unsupported_field(bean: &'static str, field: &str, rust_type: &str) -> Error {
    Error::metadata(
        MetadataErrorKind::UnsupportedFieldType,
        bean,
        format!("field '{}' of type `{}` has no SQL representation", field, rust_type),
    )
}

/// Encode a `json`-tagged field as JSON text.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

/// Decode a `json`-tagged field. NULL decodes to the type's default.
pub fn decode_json<T: DeserializeOwned + Default>(value: &Value) -> Result<T> {
    let decoded = match value {
        Value::Null => return Ok(T::default()),
        Value::Text(s) => serde_json::from_str(s),
        Value::Bytes(b) => serde_json::from_slice(b),
        Value::Json(v) => serde_json::from_value(v.clone()),
        other => {
            return Err(Error::Conversion(ConversionError {
                expected: "json",
                actual: other.type_name().to_string(),
                column: None,
                rust_type: None,
            }));
        }
    };
    decoded.map_err(|e| {
        Error::Conversion(ConversionError {
            expected: "json",
            actual: e.to_string(),
            column: None,
            rust_type: None,
        })
    })
}
