//! Reconcile reflected bean metadata with a live database.
//!
//! [`plan`] is a pure diff of metadata against an introspected
//! [`DatabaseSchema`]; [`sync`] introspects, plans and runs the DDL. Drift
//! that cannot be fixed safely is reported as a [`SchemaDriftWarning`] and
//! never stops the run.

use crate::introspect::{ColumnInfo, DatabaseSchema, Introspector, ParsedSqlType, TableInfo};
use sqlbean_core::metadata::Column;
use sqlbean_core::{
    Cx, Dialect, Error, Executor, Outcome, SchemaDriftWarning, TableMetadata, try_outcome,
};
use std::collections::HashSet;
use std::sync::Arc;

/// What a sync did, or would do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// DDL in execution order
    pub statements: Vec<String>,
    pub warnings: Vec<SchemaDriftWarning>,
}

impl SyncReport {
    /// Nothing to execute.
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }

    fn warn(&mut self, table: &str, column: Option<&str>, message: String) {
        self.warnings.push(SchemaDriftWarning {
            table: table.to_string(),
            column: column.map(str::to_string),
            message,
        });
    }
}

/// Diff `tables` against `live` and produce the DDL to reconcile them.
pub fn plan(dialect: Dialect, tables: &[Arc<TableMetadata>], live: &DatabaseSchema) -> SyncReport {
    let mut report = SyncReport::default();

    for meta in tables {
        match live.table(&meta.name) {
            None => {
                report.statements.push(dialect.create_table_sql(meta));
                for index in &meta.indexes {
                    report.statements.push(dialect.create_index_sql(&meta.name, index));
                }
            }
            Some(existing) => {
                plan_columns(dialect, meta, existing, &mut report);
                plan_indexes(dialect, meta, existing, &mut report);
            }
        }
    }

    for meta in tables {
        let Some(existing) = live.table(&meta.name) else {
            continue;
        };
        for column in &existing.columns {
            if meta.column(&column.name).is_none() {
                report.warn(
                    &meta.name,
                    Some(&column.name),
                    format!("column exists in database but not in {}", meta.struct_name),
                );
            }
        }
    }

    report
}

fn plan_columns(dialect: Dialect, meta: &TableMetadata, live: &TableInfo, report: &mut SyncReport) {
    for column in &meta.columns {
        let Some(existing) = live.column(&column.name) else {
            report.statements.push(dialect.add_column_sql(&meta.name, column));
            continue;
        };

        let declared = ParsedSqlType::parse(&dialect.column_type(column));
        if !declared.same_as(&existing.parsed_type) {
            plan_type_change(dialect, meta, column, existing, &declared, report);
        }

        if column.primary_key || column.auto_increment {
            continue;
        }
        if column.nullable != existing.nullable {
            report.warn(
                &meta.name,
                Some(&column.name),
                format!(
                    "nullable is {} in database but {} in bean",
                    existing.nullable, column.nullable
                ),
            );
        }
        let want = column.default.map(normalize_default);
        let have = existing.default.as_deref().map(normalize_default);
        if want != have {
            report.warn(
                &meta.name,
                Some(&column.name),
                format!(
                    "default is {} in database but {} in bean",
                    have.as_deref().unwrap_or("none"),
                    want.as_deref().unwrap_or("none")
                ),
            );
        }
    }
}

fn plan_type_change(
    dialect: Dialect,
    meta: &TableMetadata,
    column: &Column,
    existing: &ColumnInfo,
    declared: &ParsedSqlType,
    report: &mut SyncReport,
) {
    let widening = existing.parsed_type.widens_to(declared);
    let supported = if declared.base_type == "TEXT" {
        dialect.supports_text_promotion()
    } else {
        dialect.supports_modify_column()
    };
    if widening && supported {
        if let Some(sql) = dialect.modify_column_sql(&meta.name, column) {
            report.statements.push(sql);
            return;
        }
    }
    let suffix = if widening {
        format!(", and {} cannot alter it", dialect)
    } else {
        String::new()
    };
    report.warn(
        &meta.name,
        Some(&column.name),
        format!(
            "type is {} in database but {} in bean{}",
            existing.sql_type,
            dialect.column_type(column),
            suffix
        ),
    );
}

fn plan_indexes(dialect: Dialect, meta: &TableMetadata, live: &TableInfo, report: &mut SyncReport) {
    let mut matched = HashSet::new();
    let mut drops = Vec::new();
    let mut creates = Vec::new();

    for index in &meta.indexes {
        let found = live
            .indexes
            .iter()
            .enumerate()
            .find(|(i, l)| !matched.contains(i) && index.same_columns(&l.columns));
        match found {
            Some((i, existing)) => {
                matched.insert(i);
                if existing.unique != index.unique {
                    drops.push(dialect.drop_index_sql(&meta.name, &existing.name));
                    creates.push(dialect.create_index_sql(&meta.name, index));
                }
            }
            None => creates.push(dialect.create_index_sql(&meta.name, index)),
        }
    }
    for (i, existing) in live.indexes.iter().enumerate() {
        if !matched.contains(&i) {
            drops.push(dialect.drop_index_sql(&meta.name, &existing.name));
        }
    }

    report.statements.extend(drops);
    report.statements.extend(creates);
}

/// Strip quoting, parentheses and casts so catalogs and tags compare equal.
fn normalize_default(raw: &str) -> String {
    let mut text = raw.trim();
    loop {
        let before = text;
        if text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
            text = text[1..text.len() - 1].trim();
        }
        if let Some(pos) = text.find("::") {
            text = text[..pos].trim();
        }
        if text == before {
            break;
        }
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        text = &text[1..text.len() - 1];
    }
    text.to_lowercase()
}

/// Introspect, plan and execute a sync of `tables`.
///
/// Running it twice against an unchanged set executes no DDL the second time.
pub async fn sync<E: Executor>(
    cx: &Cx,
    conn: &E,
    tables: &[Arc<TableMetadata>],
) -> Outcome<SyncReport, Error> {
    let dialect = conn.dialect();
    let live = try_outcome!(Introspector::new(dialect).introspect_all(cx, conn).await);
    let report = plan(dialect, tables, &live);

    for warning in &report.warnings {
        tracing::warn!(target: "sqlbean::sync", "{}", warning);
    }
    for sql in &report.statements {
        tracing::debug!(target: "sqlbean::sync", sql = %sql, "Executing DDL");
        try_outcome!(conn.execute(cx, sql, &[]).await);
    }
    tracing::info!(
        target: "sqlbean::sync",
        tables = tables.len(),
        statements = report.statements.len(),
        warnings = report.warnings.len(),
        "Schema sync finished"
    );
    Outcome::Ok(report)
}
