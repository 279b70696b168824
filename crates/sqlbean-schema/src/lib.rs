//! Schema support for sqlbean.
//!
//! - Live catalog introspection for SQLite, PostgreSQL and MySQL
//! - Synchronization of reflected bean metadata with a live database
//! - Ordered migrations with a tracking table
//! - Bulk create/drop helpers

pub mod introspect;
pub mod migrate;
pub mod sync;

pub use introspect::{ColumnInfo, DatabaseSchema, IndexInfo, Introspector, ParsedSqlType, TableInfo};
pub use migrate::{
    DEFAULT_MIGRATIONS_TABLE, Migration, MigrationRunner, MigrationStatus, split_statements,
};
pub use sync::{SyncReport, plan, sync};

use sqlbean_core::{Cx, Dialect, Error, Executor, Outcome, TableMetadata, try_outcome};

/// DDL creating a table and its declared indexes.
pub fn create_table_statements(dialect: Dialect, table: &TableMetadata) -> Vec<String> {
    std::iter::once(dialect.create_table_sql(table))
        .chain(
            table
                .indexes
                .iter()
                .map(|index| dialect.create_index_sql(&table.name, index)),
        )
        .collect()
}

/// Create every table with its indexes. Existing tables are left alone.
pub async fn create_tables<E: Executor>(
    cx: &Cx,
    conn: &E,
    tables: &[&TableMetadata],
) -> Outcome<(), Error> {
    let dialect = conn.dialect();
    for table in tables {
        for sql in create_table_statements(dialect, table) {
            tracing::debug!(target: "sqlbean::sql", sql = %sql, "Executing DDL");
            try_outcome!(conn.execute(cx, &sql, &[]).await);
        }
    }
    Outcome::Ok(())
}

/// Drop tables if they exist.
pub async fn drop_tables<E: Executor>(cx: &Cx, conn: &E, names: &[&str]) -> Outcome<(), Error> {
    let dialect = conn.dialect();
    for name in names {
        let sql = dialect.drop_table_sql(name);
        tracing::debug!(target: "sqlbean::sql", sql = %sql, "Executing DDL");
        try_outcome!(conn.execute(cx, &sql, &[]).await);
    }
    Outcome::Ok(())
}
