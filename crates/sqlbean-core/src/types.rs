//! SQL type definitions and mapping.

/// SQL data types a bean field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Decimal { precision: u8, scale: u8 },

    // Boolean
    Boolean,

    // String types
    Char(u32),
    VarChar(u32),
    Text,

    // Binary types
    Blob,

    // Date/time types
    Date,
    Time,
    DateTime,
    Timestamp,

    // JSON
    Json,

    // Custom type name, passed through to DDL verbatim
    Custom(&'static str),
}

impl SqlType {
    /// Default bounded string type for `String` fields without an explicit length.
    pub const DEFAULT_VARCHAR: SqlType = SqlType::VarChar(255);

    /// Generic SQL type name; dialects refine it.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => (*name).to_string(),
        }
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, SqlType::Real | SqlType::Double | SqlType::Decimal { .. })
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp
        )
    }

    /// Declared length for bounded string types.
    pub const fn length(&self) -> Option<u32> {
        match self {
            SqlType::Char(n) | SqlType::VarChar(n) => Some(*n),
            _ => None,
        }
    }

    /// Replace the length of a bounded string type, leaving others untouched.
    #[must_use]
    pub const fn with_length(self, len: u32) -> Self {
        match self {
            SqlType::Char(_) => SqlType::Char(len),
            SqlType::VarChar(_) => SqlType::VarChar(len),
            other => other,
        }
    }
}
