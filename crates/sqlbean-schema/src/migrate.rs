//! Ordered, ID-keyed migrations with a tracking table.

use sqlbean_core::error::{SchemaError, SchemaErrorKind};
use sqlbean_core::{Cx, Error, Executor, Outcome, Timestamp, Value, try_outcome};
use std::collections::{HashMap, HashSet};

/// Default name of the tracking table.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "sqlbean_migrations";

/// A database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique ID; migrations apply in ascending ID order
    pub id: String,
    pub description: String,
    /// SQL to apply the migration, `;`-separated
    pub up: String,
    /// SQL to revert the migration, `;`-separated
    pub down: String,
}

impl Migration {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    /// Applied at the given Unix time in seconds
    Applied { at: i64 },
}

/// Applies and reverts a fixed set of migrations.
///
/// Each migration runs in its own transaction together with its tracking
/// row, so a failed migration leaves no record behind.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    migrations: Vec<Migration>,
    table_name: String,
}

impl MigrationRunner {
    /// Create a runner; migrations are ordered by ID.
    pub fn new(mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            migrations,
            table_name: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }

    /// Use a custom tracking table.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn check_ids(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for m in &self.migrations {
            if m.id.is_empty() {
                return Err(migration_error("migration ID must not be empty".to_string()));
            }
            if !seen.insert(m.id.as_str()) {
                return Err(migration_error(format!("duplicate migration ID '{}'", m.id)));
            }
        }
        Ok(())
    }

    /// Ensure the tracking table exists.
    pub async fn init<E: Executor>(&self, cx: &Cx, conn: &E) -> Outcome<(), Error> {
        let dialect = conn.dialect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(255) PRIMARY KEY, description TEXT NOT NULL, applied_at BIGINT NOT NULL)",
            dialect.quote_identifier(&self.table_name)
        );
        try_outcome!(conn.execute(cx, &sql, &[]).await);
        Outcome::Ok(())
    }

    /// Status of every known migration, in ID order.
    pub async fn status<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
    ) -> Outcome<Vec<(String, MigrationStatus)>, Error> {
        if let Err(e) = self.check_ids() {
            return Outcome::Err(e);
        }
        try_outcome!(self.init(cx, conn).await);

        let sql = format!(
            "SELECT id, applied_at FROM {}",
            conn.dialect().quote_identifier(&self.table_name)
        );
        let rows = try_outcome!(conn.query(cx, &sql, &[]).await);
        let mut applied: HashMap<String, i64> = HashMap::new();
        for row in rows {
            if let (Ok(id), Ok(at)) = (row.get_as::<String>(0), row.get_as::<i64>(1)) {
                applied.insert(id, at);
            }
        }

        let status = self
            .migrations
            .iter()
            .map(|m| {
                let status = match applied.get(&m.id) {
                    Some(&at) => MigrationStatus::Applied { at },
                    None => MigrationStatus::Pending,
                };
                (m.id.clone(), status)
            })
            .collect();
        Outcome::Ok(status)
    }

    /// Apply all pending migrations in ID order; returns the applied IDs.
    pub async fn migrate<E: Executor>(&self, cx: &Cx, conn: &E) -> Outcome<Vec<String>, Error> {
        let status = try_outcome!(self.status(cx, conn).await);
        let dialect = conn.dialect();
        let record_sql = format!(
            "INSERT INTO {} (id, description, applied_at) VALUES ({}, {}, {})",
            dialect.quote_identifier(&self.table_name),
            dialect.placeholder(1),
            dialect.placeholder(2),
            dialect.placeholder(3)
        );

        let mut applied = Vec::new();
        for (migration, (_, state)) in self.migrations.iter().zip(status) {
            if state != MigrationStatus::Pending {
                continue;
            }
            let record = vec![
                Value::Text(migration.id.clone()),
                Value::Text(migration.description.clone()),
                Value::BigInt(Timestamp::now().as_micros() / 1_000_000),
            ];
            try_outcome!(
                run_in_transaction(cx, conn, &migration.up, &record_sql, &record).await
            );
            tracing::info!(id = %migration.id, description = %migration.description, "Applied migration");
            applied.push(migration.id.clone());
        }
        Outcome::Ok(applied)
    }

    /// Revert the most recently applied migration.
    ///
    /// Returns its ID, or `None` when nothing is applied.
    pub async fn rollback_last<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
    ) -> Outcome<Option<String>, Error> {
        let status = try_outcome!(self.status(cx, conn).await);
        let last = status
            .iter()
            .filter_map(|(id, s)| match s {
                MigrationStatus::Applied { at } => Some((*at, id)),
                MigrationStatus::Pending => None,
            })
            .max();
        let Some((_, id)) = last else {
            return Outcome::Ok(None);
        };
        let Some(migration) = self.migrations.iter().find(|m| &m.id == id) else {
            return Outcome::Ok(None);
        };

        let dialect = conn.dialect();
        let delete_sql = format!(
            "DELETE FROM {} WHERE id = {}",
            dialect.quote_identifier(&self.table_name),
            dialect.placeholder(1)
        );
        try_outcome!(
            run_in_transaction(
                cx,
                conn,
                &migration.down,
                &delete_sql,
                &[Value::Text(migration.id.clone())]
            )
            .await
        );
        tracing::info!(id = %migration.id, "Rolled back migration");
        Outcome::Ok(Some(migration.id.clone()))
    }
}

/// Run a script plus one bookkeeping statement atomically.
async fn run_in_transaction<E: Executor>(
    cx: &Cx,
    conn: &E,
    script: &str,
    bookkeeping: &str,
    args: &[Value],
) -> Outcome<(), Error> {
    try_outcome!(conn.begin(cx).await);
    let result = async {
        for statement in split_statements(script) {
            tracing::debug!(target: "sqlbean::sql", sql = %statement, "Migration statement");
            try_outcome!(conn.execute(cx, &statement, &[]).await);
        }
        try_outcome!(conn.execute(cx, bookkeeping, args).await);
        Outcome::Ok(())
    }
    .await;

    match result {
        Outcome::Ok(()) => conn.commit(cx).await,
        other => {
            if let Outcome::Err(e) = conn.rollback(cx).await {
                tracing::warn!(error = %e, "Rollback after failed migration failed");
            }
            other
        }
    }
}

/// Split a script on `;` outside quoted strings and identifiers.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in script.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if matches!(ch, '\'' | '"' | '`') => quote = Some(ch),
            None if ch == ';' => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                continue;
            }
            None => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

fn migration_error(message: String) -> Error {
    Error::Schema(SchemaError {
        kind: SchemaErrorKind::Migration,
        message,
        source: None,
    })
}
