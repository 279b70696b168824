//! Field and index declarations produced by `#[derive(Bean)]`.

use crate::types::SqlType;

/// Static description of one bean field.
///
/// The derive macro emits one of these per persisted field, in declaration
/// order. The registry turns them into [`crate::Column`]s once per type.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Explicit column name; `None` lets the name mapper decide
    pub column: Option<&'static str>,
    /// SQL type; `None` when the Rust type has no SQL representation
    pub sql_type: Option<SqlType>,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Default value expression (SQL)
    pub default: Option<&'static str>,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Stamped with now on insert
    pub created: bool,
    /// Stamped with now on insert and update
    pub updated: bool,
    /// Soft-delete marker
    pub deleted: bool,
    /// Optimistic-lock counter
    pub version: bool,
    /// Stored as JSON text
    pub json: bool,
    /// Unique index name; empty string means "derive one"
    pub unique: Option<&'static str>,
    /// Plain index name; empty string means "derive one"
    pub index: Option<&'static str>,
    /// Rust type as written, for error messages
    pub rust_type: &'static str,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, sql_type: Option<SqlType>) -> Self {
        Self {
            name,
            column: None,
            sql_type,
            nullable: false,
            default: None,
            primary_key: false,
            auto_increment: false,
            created: false,
            updated: false,
            deleted: false,
            version: false,
            json: false,
            unique: None,
            index: None,
            rust_type: "",
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    pub const fn default_value(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    pub const fn created(mut self, value: bool) -> Self {
        self.created = value;
        self
    }

    pub const fn updated(mut self, value: bool) -> Self {
        self.updated = value;
        self
    }

    pub const fn deleted(mut self, value: bool) -> Self {
        self.deleted = value;
        self
    }

    pub const fn version(mut self, value: bool) -> Self {
        self.version = value;
        self
    }

    pub const fn json(mut self, value: bool) -> Self {
        self.json = value;
        self
    }

    /// Join (or create) a unique index. An empty name derives `UQE_<table>_<column>`.
    pub const fn unique(mut self, name: &'static str) -> Self {
        self.unique = Some(name);
        self
    }

    /// Join (or create) a plain index. An empty name derives `IDX_<table>_<column>`.
    pub const fn index(mut self, name: &'static str) -> Self {
        self.index = Some(name);
        self
    }

    pub const fn rust_type(mut self, ty: &'static str) -> Self {
        self.rust_type = ty;
        self
    }
}

/// A struct-level composite index declaration.
#[derive(Debug, Clone, Copy)]
pub struct IndexInfo {
    pub name: &'static str,
    /// Rust field names or column names, in index order
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl IndexInfo {
    pub const fn new(name: &'static str, columns: &'static [&'static str], unique: bool) -> Self {
        Self {
            name,
            columns,
            unique,
        }
    }
}
