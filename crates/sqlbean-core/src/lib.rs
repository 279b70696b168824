//! Core types and traits for sqlbean.
//!
//! This crate provides the foundations the rest of the workspace builds on:
//!
//! - `Bean` trait and `FieldInfo` declarations for struct ↔ table mapping
//! - `TableMetadata` and the process-wide metadata registry
//! - `Value`, `Row` and `FromValue` for moving data across the driver seam
//! - `Executor` trait for database connections
//! - `Dialect` for placeholders, quoting, type names and DDL
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod bean;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod field;
pub mod mapper;
pub mod metadata;
pub mod row;
pub mod types;
pub mod value;

pub use bean::Bean;
pub use dialect::Dialect;
pub use error::{
    ConflictError, ConnectionError, ConnectionErrorKind, ConversionError, Error,
    MetadataError, MetadataErrorKind, QueryError, QueryErrorKind, Result, SchemaDriftWarning,
    SchemaError, SchemaErrorKind, TypeMismatchError,
};
pub use executor::{ExecResult, Executor, outcome};
pub use field::{FieldInfo, IndexInfo};
pub use mapper::{NameMapper, PrefixMapper, SameMapper, SnakeMapper, SuffixMapper};
pub use metadata::{Column, Index, Registry, TableMetadata, forget, registry, resolve};
pub use row::{ColumnInfo, FromValue, Row};
pub use types::SqlType;
pub use value::{PrimaryKey, Timestamp, Value};
