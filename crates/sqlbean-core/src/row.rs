//! Database row representation.

use crate::Result;
use crate::error::{ConversionError, Error};
use crate::value::Timestamp;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information, saving memory for large result sets.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Get the index of a column by name, ignoring ASCII case.
    pub fn index_of_ignore_case(&self, name: &str) -> Option<usize> {
        self.index_of(name)
            .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
/// Column metadata is shared via `Arc` for memory efficiency.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values in order
    values: Vec<Value>,
    /// Shared column metadata
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    ///
    /// This is more efficient for creating multiple rows from the same query.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the shared column metadata.
    ///
    /// Use this to create additional rows that share the same column info.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index. O(1) operation.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name. O(1) operation via HashMap lookup.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a value by column name, ignoring ASCII case.
    pub fn get_ignore_case(&self, name: &str) -> Option<&Value> {
        self.columns
            .index_of_ignore_case(name)
            .and_then(|i| self.values.get(i))
    }

    /// Consume the row, yielding its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get a typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::Conversion(ConversionError {
                expected: std::any::type_name::<T>(),
                actual: format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
                column: None,
                rust_type: None,
            })
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Conversion(ConversionError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
                rust_type: None,
            })
        })?;
        T::from_value(value).map_err(|e| with_column(e, name))
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Attach a column name to a conversion error that lacks one.
pub fn with_column(err: Error, column: &str) -> Error {
    match err {
        Error::Conversion(mut ce) if ce.column.is_none() => {
            ce.column = Some(column.to_string());
            Error::Conversion(ce)
        }
        e => e,
    }
}

fn conversion_error(expected: &'static str, actual: impl Into<String>) -> Error {
    Error::Conversion(ConversionError {
        expected,
        actual: actual.into(),
        column: None,
        rust_type: Some(expected),
    })
}

/// Trait for converting from a `Value` to a typed value.
///
/// Conversions widen but never truncate: an out-of-range integer or a
/// non-numeric string read into a numeric field is an error.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    fn from_value(value: &Value) -> Result<Self>;
}

/// Integer view of a value, accepting numeric text and integral floats.
fn integer_of(value: &Value, expected: &'static str) -> Result<i64> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    match value {
        Value::Text(s) | Value::Decimal(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().or_else(|_| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(integral)
                    .ok_or_else(|| conversion_error(expected, format!("non-numeric text '{}'", s)))
            })
        }
        Value::Double(d) => {
            integral(*d).ok_or_else(|| conversion_error(expected, format!("fractional value {}", d)))
        }
        Value::Float(f) => integral(f64::from(*f))
            .ok_or_else(|| conversion_error(expected, format!("fractional value {}", f))),
        other => Err(conversion_error(expected, other.type_name())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integral(d: f64) -> Option<i64> {
    if d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 {
        Some(d as i64)
    } else {
        None
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let v = integer_of(value, $name)?;
                    <$ty>::try_from(v).map_err(|_| {
                        conversion_error($name, format!("value {} out of range", v))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    isize => "isize",
);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        if let Some(b) = value.as_bool() {
            return Ok(b);
        }
        match value.as_str().map(str::trim) {
            Some("true" | "TRUE" | "1") => Ok(true),
            Some("false" | "FALSE" | "0") => Ok(false),
            _ => Err(conversion_error("bool", value.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        if let Some(v) = value.as_f64() {
            return Ok(v);
        }
        match value {
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| conversion_error("f64", format!("non-numeric text '{}'", s))),
            other => Err(conversion_error("f64", other.type_name())),
        }
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self> {
        if let Value::Float(v) = value {
            return Ok(*v);
        }
        let v = f64::from_value(value).map_err(|e| match e {
            Error::Conversion(mut ce) => {
                ce.expected = "f32";
                ce.rust_type = Some("f32");
                Error::Conversion(ce)
            }
            e => e,
        })?;
        if v.is_finite() && v.abs() > f64::from(f32::MAX) {
            return Err(conversion_error("f32", format!("value {} out of range", v)));
        }
        Ok(v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| conversion_error("String", "non-UTF-8 bytes")),
            Value::Null | Value::Json(_) => Err(conversion_error("String", value.type_name())),
            other => Ok(other.to_plain_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(conversion_error("Vec<u8>", other.type_name())),
        }
    }
}

impl FromValue for Timestamp {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(t) => Ok(Timestamp(*t)),
            // Integer time columns hold Unix seconds.
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                let secs = integer_of(value, "Timestamp")?;
                secs.checked_mul(Timestamp::MICROS_PER_SECOND)
                    .map(Timestamp)
                    .ok_or_else(|| conversion_error("Timestamp", format!("value {} out of range", secs)))
            }
            Value::Text(s) => Timestamp::parse(s)
                .ok_or_else(|| conversion_error("Timestamp", format!("unparseable time '{}'", s))),
            other => Err(conversion_error("Timestamp", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| Error::Serde(e.to_string())),
            Value::Bytes(b) => serde_json::from_slice(b).map_err(|e| Error::Serde(e.to_string())),
            other => Err(conversion_error("serde_json::Value", other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_basic_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
            vec![
                Value::Int(1),
                Value::Text("Alice".to_string()),
                Value::Int(30),
            ],
        );

        assert_eq!(row.len(), 3);
        assert!(!row.is_empty());

        // Index access
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row.get(1), Some(&Value::Text("Alice".to_string())));
        assert_eq!(row.get(3), None);

        // Name access
        assert_eq!(row.get_by_name("id"), Some(&Value::Int(1)));
        assert_eq!(
            row.get_by_name("name"),
            Some(&Value::Text("Alice".to_string()))
        );
        assert_eq!(row.get_by_name("missing"), None);
    }

    #[test]
    fn test_row_typed_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(42), Value::Text("Bob".to_string())],
        );

        // Typed index access
        assert_eq!(row.get_as::<i32>(0).unwrap(), 42);
        assert_eq!(row.get_as::<i64>(0).unwrap(), 42);
        assert_eq!(row.get_as::<String>(1).unwrap(), "Bob");

        // Typed name access
        assert_eq!(row.get_named::<i32>("id").unwrap(), 42);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Bob");
    }

    #[test]
    fn test_row_type_errors() {
        let row = Row::new(
            vec!["id".to_string()],
            vec![Value::Text("not a number".to_string())],
        );

        // Type mismatch
        assert!(row.get_named::<i32>("id").is_err());

        // Column not found
        assert!(row.get_named::<i32>("missing").is_err());

        // Index out of bounds
        assert!(row.get_as::<i32>(99).is_err());
    }

    #[test]
    fn test_row_null_handling() {
        let row = Row::new(vec!["nullable".to_string()], vec![Value::Null]);

        // Option handles NULL gracefully
        assert_eq!(row.get_named::<Option<i32>>("nullable").unwrap(), None);

        // Non-optional type fails for NULL
        assert!(row.get_named::<i32>("nullable").is_err());
    }

    #[test]
    fn test_row_iterators() {
        let row = Row::new(
            vec!["a".to_string(), "b".to_string()],
            vec![Value::Int(1), Value::Int(2)],
        );

        // Column names iterator
        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["a", "b"]);

        // Values iterator
        let values: Vec<_> = row.values().collect();
        assert_eq!(values, vec![&Value::Int(1), &Value::Int(2)]);

        // Pairs iterator
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("a", &Value::Int(1)), ("b", &Value::Int(2))]);
    }

    #[test]
    fn test_row_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["id".to_string(), "name".to_string()]));

        let row1 = Row::with_columns(
            Arc::clone(&columns),
            vec![Value::Int(1), Value::Text("Alice".to_string())],
        );
        let row2 = Row::with_columns(
            Arc::clone(&columns),
            vec![Value::Int(2), Value::Text("Bob".to_string())],
        );

        // Both rows share the same column info
        assert!(Arc::ptr_eq(&row1.column_info(), &row2.column_info()));

        // Both work correctly
        assert_eq!(row1.get_named::<i32>("id").unwrap(), 1);
        assert_eq!(row2.get_named::<i32>("id").unwrap(), 2);
    }

    #[test]
    fn test_row_contains_column() {
        let row = Row::new(vec!["exists".to_string()], vec![Value::Int(1)]);

        assert!(row.contains_column("exists"));
        assert!(!row.contains_column("missing"));
    }

    #[test]
    fn test_column_info() {
        let info = ColumnInfo::new(vec![
            "id".to_string(),
            "name".to_string(),
            "age".to_string(),
        ]);

        assert_eq!(info.len(), 3);
        assert!(!info.is_empty());

        assert_eq!(info.index_of("id"), Some(0));
        assert_eq!(info.index_of("name"), Some(1));
        assert_eq!(info.index_of("missing"), None);

        assert_eq!(info.name_at(0), Some("id"));
        assert_eq!(info.name_at(1), Some("name"));
        assert_eq!(info.name_at(99), None);

        assert!(info.contains("id"));
        assert!(!info.contains("missing"));
    }

    #[test]
    fn test_from_value_all_types() {
        // bool
        assert!(bool::from_value(&Value::Bool(true)).unwrap());
        assert!(bool::from_value(&Value::Int(1)).unwrap());
        assert!(!bool::from_value(&Value::Int(0)).unwrap());

        // i8
        assert_eq!(i8::from_value(&Value::TinyInt(42)).unwrap(), 42);

        // i16
        assert_eq!(i16::from_value(&Value::SmallInt(100)).unwrap(), 100);
        assert_eq!(i16::from_value(&Value::TinyInt(10)).unwrap(), 10);

        // i32
        assert_eq!(i32::from_value(&Value::Int(1000)).unwrap(), 1000);

        // i64
        assert_eq!(i64::from_value(&Value::BigInt(10000)).unwrap(), 10000);

        // f32
        let pi_f32 = std::f32::consts::PI;
        let from_float = f32::from_value(&Value::Float(pi_f32)).unwrap();
        assert!((from_float - pi_f32).abs() < 1e-6);

        // f64
        let pi_f64 = std::f64::consts::PI;
        let from_double = f64::from_value(&Value::Double(pi_f64)).unwrap();
        assert!((from_double - pi_f64).abs() < 1e-12);

        // String
        assert_eq!(
            String::from_value(&Value::Text("hello".to_string())).unwrap(),
            "hello"
        );

        // Vec<u8>
        assert_eq!(
            Vec::<u8>::from_value(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_widening_coercion() {
        assert_eq!(i64::from_value(&Value::Int(7)).unwrap(), 7);
        assert_eq!(i32::from_value(&Value::BigInt(7)).unwrap(), 7);
        assert_eq!(i32::from_value(&Value::Text(" 12 ".into())).unwrap(), 12);
        assert_eq!(i64::from_value(&Value::Double(3.0)).unwrap(), 3);
        assert_eq!(String::from_value(&Value::Int(5)).unwrap(), "5");
        assert!((f64::from_value(&Value::Text("2.5".into())).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_lossy_coercion_fails() {
        let err = i8::from_value(&Value::BigInt(300)).unwrap_err();
        assert!(err.is_conversion());
        assert!(err.to_string().contains("out of range"));

        assert!(i32::from_value(&Value::Text("abc".into())).is_err());
        assert!(i64::from_value(&Value::Double(1.5)).is_err());
        assert!(u32::from_value(&Value::Int(-1)).is_err());
        assert!(f64::from_value(&Value::Text("x1".into())).is_err());
    }

    #[test]
    fn test_named_error_carries_column() {
        let row = Row::new(vec!["age".to_string()], vec![Value::Text("old".into())]);
        match row.get_named::<i32>("age").unwrap_err() {
            Error::Conversion(ce) => assert_eq!(ce.column.as_deref(), Some("age")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let row = Row::new(vec!["UserName".to_string()], vec![Value::Text("a".into())]);
        assert_eq!(row.get_by_name("username"), None);
        assert_eq!(row.get_ignore_case("username"), Some(&Value::Text("a".into())));
    }

    #[test]
    fn test_timestamp_from_text() {
        let ts = Timestamp::from_value(&Value::Text("2023-05-01 10:00:00".into())).unwrap();
        assert_eq!(ts.to_string(), "2023-05-01 10:00:00");
        assert_eq!(
            Timestamp::from_value(&Value::BigInt(60)).unwrap(),
            Timestamp(60 * Timestamp::MICROS_PER_SECOND)
        );
        assert!(Timestamp::from_value(&Value::Text("yesterday".into())).is_err());
    }

    #[test]
    fn test_empty_row() {
        let row = Row::new(vec![], vec![]);
        assert!(row.is_empty());
        assert_eq!(row.len(), 0);
        assert_eq!(row.get(0), None);
        assert!(row.get_as::<i32>(0).is_err());
    }

    #[test]
    fn test_large_row() {
        // Test with many columns
        let n = 100;
        let names: Vec<_> = (0..n).map(|i| format!("col_{}", i)).collect();
        let values: Vec<_> = (0..n).map(Value::Int).collect();
        let row = Row::new(names, values);

        assert_eq!(row.len(), n as usize);
        assert_eq!(row.get_named::<i32>("col_0").unwrap(), 0);
        assert_eq!(row.get_named::<i32>("col_50").unwrap(), 50);
        assert_eq!(row.get_named::<i32>("col_99").unwrap(), 99);
    }
}
