//! Error types for sqlbean operations.

use std::fmt;

/// The primary error type for all sqlbean operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close, busy)
    Connection(ConnectionError),
    /// Query execution errors reported by the backend
    Query(QueryError),
    /// A database value could not be converted into a field value
    Conversion(ConversionError),
    /// Bean reflection produced an unusable table description
    Metadata(MetadataError),
    /// The destination shape does not match the requested operation
    TypeMismatch(TypeMismatchError),
    /// A versioned update or delete matched no row
    ConcurrencyConflict(ConflictError),
    /// A delete or update was issued without any condition
    MissingCondition(String),
    /// Schema/migration errors
    Schema(SchemaError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Connection lost or closed during operation
    Disconnected,
    /// Database is locked by another connection
    Busy,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Lock contention
    Deadlock,
    /// Cancelled
    Cancelled,
    /// Other database error
    Database,
}

/// A lossy or incompatible value conversion.
#[derive(Debug)]
pub struct ConversionError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    pub bean: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// A field's Rust type has no SQL representation
    UnsupportedFieldType,
    /// Contradictory or malformed tags
    InvalidMetadata,
    /// The operation needs a primary key the table does not declare
    MissingPrimaryKey,
}

#[derive(Debug)]
pub struct TypeMismatchError {
    pub operation: &'static str,
    pub expected: &'static str,
    pub actual: &'static str,
}

#[derive(Debug)]
pub struct ConflictError {
    pub table: String,
    pub version: Option<i64>,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table not found
    TableNotFound,
    /// Invalid schema definition
    Invalid,
    /// Migration error
    Migration,
}

/// A difference between declared and live schema that sync could not reconcile.
///
/// Reported alongside the sync result, never returned as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDriftWarning {
    pub table: String,
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for SchemaDriftWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(f, "{}.{}: {}", self.table, col, self.message),
            None => write!(f, "{}: {}", self.table, self.message),
        }
    }
}

impl Error {
    pub fn metadata(
        kind: MetadataErrorKind,
        bean: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::Metadata(MetadataError {
            kind,
            bean,
            message: message.into(),
        })
    }

    pub fn invalid_metadata(bean: &'static str, message: impl Into<String>) -> Self {
        Self::metadata(MetadataErrorKind::InvalidMetadata, bean, message)
    }

    pub fn missing_primary_key(bean: &'static str) -> Self {
        Self::metadata(
            MetadataErrorKind::MissingPrimaryKey,
            bean,
            "table declares no primary key",
        )
    }

    pub fn type_mismatch(
        operation: &'static str,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Error::TypeMismatch(TypeMismatchError {
            operation,
            expected,
            actual,
        })
    }

    pub fn concurrency_conflict(table: impl Into<String>, version: Option<i64>) -> Self {
        Error::ConcurrencyConflict(ConflictError {
            table: table.into(),
            version,
        })
    }

    /// Turn a zero affected-row count from a versioned write into a conflict.
    pub fn ensure_affected(
        affected: u64,
        table: impl Into<String>,
        version: Option<i64>,
    ) -> Result<u64> {
        if affected == 0 {
            Err(Self::concurrency_conflict(table, version))
        } else {
            Ok(affected)
        }
    }

    /// Which metadata failure this is, if any.
    pub fn metadata_kind(&self) -> Option<MetadataErrorKind> {
        match self {
            Error::Metadata(m) => Some(m.kind),
            _ => None,
        }
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch(_))
    }

    /// Is this a connection error that likely requires reopening?
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect | ConnectionErrorKind::Disconnected,
                ..
            })
        )
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Conversion(e) => write!(f, "Conversion error: {}", e),
            Error::Metadata(e) => write!(f, "{}", e),
            Error::TypeMismatch(e) => write!(f, "{}", e),
            Error::ConcurrencyConflict(e) => write!(f, "{}", e),
            Error::MissingCondition(table) => {
                write!(f, "Refusing to modify every row of '{}' without a condition", table)
            }
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = match self {
            Error::Connection(e) => e.source.as_deref(),
            Error::Query(e) => e.source.as_deref(),
            Error::Schema(e) => e.source.as_deref(),
            _ => None,
        };
        source.map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.column, self.rust_type) {
            (Some(col), Some(ty)) => write!(
                f,
                "expected {} for column '{}' ({}), found {}",
                self.expected, col, ty, self.actual
            ),
            (Some(col), None) => write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            ),
            _ => write!(f, "expected {}, found {}", self.expected, self.actual),
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            MetadataErrorKind::UnsupportedFieldType => "Unsupported field type",
            MetadataErrorKind::InvalidMetadata => "Invalid metadata",
            MetadataErrorKind::MissingPrimaryKey => "Missing primary key",
        };
        write!(f, "{} on {}: {}", label, self.bean, self.message)
    }
}

impl fmt::Display for TypeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expects a {} destination, got {}",
            self.operation, self.expected, self.actual
        )
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(
                f,
                "Concurrency conflict on '{}': no row at version {}",
                self.table, v
            ),
            None => write!(f, "Concurrency conflict on '{}': no row affected", self.table),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for sqlbean operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let query = QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("SELECT 1".to_string()),
            sqlstate: Some("23505".to_string()),
            message: "unique violation".to_string(),
            detail: None,
            source: None,
        };

        assert!(query.is_unique_violation());

        let err = Error::Query(query);
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(err.sql(), Some("SELECT 1"));
    }

    #[test]
    fn zero_affected_becomes_conflict() {
        assert_eq!(Error::ensure_affected(1, "user", Some(1)).unwrap(), 1);
        let err = Error::ensure_affected(0, "user", Some(3)).unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict(ref c) if c.version == Some(3)));
        assert!(err.to_string().contains("version 3"));
    }

    #[test]
    fn metadata_kind_is_exposed() {
        let err = Error::missing_primary_key("Log");
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::MissingPrimaryKey));
        assert_eq!(Error::Custom("x".to_string()).metadata_kind(), None);
        assert!(err.to_string().starts_with("Missing primary key on Log"));
    }

    #[test]
    fn connection_flags() {
        let conn_error = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "lost connection".to_string(),
            source: None,
        });
        assert!(conn_error.is_connection_error());

        let busy = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Busy,
            message: "database is locked".to_string(),
            source: None,
        });
        assert!(!busy.is_connection_error());
    }

    #[test]
    fn drift_warning_display() {
        let w = SchemaDriftWarning {
            table: "user".into(),
            column: Some("name".into()),
            message: "type TEXT differs from VARCHAR(255)".into(),
        };
        assert_eq!(w.to_string(), "user.name: type TEXT differs from VARCHAR(255)");
    }
}
