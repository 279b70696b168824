//! The engine: one executor plus configuration, caches and schema helpers.

use crate::cache::CachePolicy;
use crate::options::EngineOptions;
use crate::session::Session;
use sqlbean_core::{
    Cx, Dialect, Error, ExecResult, Executor, NameMapper, Outcome, Row, TableMetadata, Value,
    registry, try_outcome,
};
use sqlbean_query::Cacher;
use sqlbean_schema::{DatabaseSchema, Introspector, Migration, MigrationRunner, SyncReport};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry point of the ORM.
///
/// An engine owns one executor. Sessions borrow it for a unit of work;
/// the engine's own helpers cover schema management and one-shot calls.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::with_options(SqliteConnection::open_memory()?, EngineOptions::new().cache(1000));
/// engine.sync(&cx, &[sqlbean::resolve::<User>()?]).await;
///
/// let mut users = Vec::new();
/// engine.new_session().where_(Cond::gt("age", 18)).find(&cx, &mut users).await;
/// ```
#[derive(Debug)]
pub struct Engine<E: Executor> {
    conn: E,
    options: EngineOptions,
    caches: CachePolicy,
}

impl<E: Executor> Engine<E> {
    /// Create an engine with default options.
    pub fn new(conn: E) -> Self {
        Self::with_options(conn, EngineOptions::default())
    }

    /// Create an engine from options.
    ///
    /// A non-default naming convention replaces the process-wide mapper.
    pub fn with_options(conn: E, options: EngineOptions) -> Self {
        if options.customizes_mapper() {
            registry().set_mapper(options.name_mapper());
        }
        let caches = CachePolicy::default();
        if let Some(cacher) = options.default_cacher() {
            caches.set_default(Some(Arc::new(cacher)));
        }
        tracing::debug!(
            dialect = %conn.dialect(),
            show_sql = options.show_sql,
            cache = ?options.cache_capacity,
            "Created engine"
        );
        Self {
            conn,
            options,
            caches,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    pub fn connection(&self) -> &E {
        &self.conn
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Start a unit of work.
    pub fn new_session(&self) -> Session<'_, E> {
        Session::new(self)
    }

    pub(crate) fn caches(&self) -> &CachePolicy {
        &self.caches
    }

    // ==================== Statement execution ====================

    pub(crate) async fn query_rows(
        &self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        let started = Instant::now();
        let result = self.conn.query(cx, sql, args).await;
        self.log_sql(sql, args, started.elapsed());
        result
    }

    pub(crate) async fn exec_sql(
        &self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<ExecResult, Error> {
        let started = Instant::now();
        let result = self.conn.execute(cx, sql, args).await;
        self.log_sql(sql, args, started.elapsed());
        result
    }

    fn log_sql(&self, sql: &str, args: &[Value], elapsed: Duration) {
        if self.options.show_sql {
            if self.options.show_exec_time {
                tracing::info!(target: "sqlbean::sql", "[SQL] {} {:?} - took: {:?}", sql, args, elapsed);
            } else {
                tracing::info!(target: "sqlbean::sql", "[SQL] {} {:?}", sql, args);
            }
        } else {
            tracing::debug!(target: "sqlbean::sql", sql, args = ?args, elapsed = ?elapsed, "Executed statement");
        }
    }

    // ==================== Connection ====================

    pub async fn ping(&self, cx: &Cx) -> Outcome<(), Error> {
        self.conn.ping(cx).await
    }

    /// Run raw SQL, clearing every cache.
    pub async fn exec(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<ExecResult, Error> {
        self.new_session().exec(cx, sql, args).await
    }

    /// Run `f` inside a transaction on a fresh session.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    ///
    /// ```ignore
    /// engine
    ///     .transaction(&cx, async |s| {
    ///         try_outcome!(s.insert(&cx, &mut order).await);
    ///         s.id(PrimaryKey::single(order.user_id))
    ///             .incr("orders", 1)
    ///             .update(&cx, &mut User::default())
    ///             .await
    ///     })
    ///     .await;
    /// ```
    pub async fn transaction<R, F>(&self, cx: &Cx, f: F) -> Outcome<R, Error>
    where
        F: AsyncFnOnce(&mut Session<'_, E>) -> Outcome<R, Error>,
    {
        let mut session = self.new_session();
        try_outcome!(session.begin(cx).await);
        match f(&mut session).await {
            Outcome::Ok(value) => {
                try_outcome!(session.commit(cx).await);
                Outcome::Ok(value)
            }
            other => {
                if let Outcome::Err(e) = session.rollback(cx).await {
                    tracing::warn!(error = %e, "Rollback after failed transaction failed");
                }
                other
            }
        }
    }

    // ==================== Schema ====================

    pub async fn is_table_exist(&self, cx: &Cx, table: &str) -> Outcome<bool, Error> {
        let (sql, args) = self.dialect().table_exists_sql(table);
        let rows = try_outcome!(self.query_rows(cx, &sql, &args).await);
        Outcome::Ok(!rows.is_empty())
    }

    /// Whether a table has no rows at all, soft-deleted ones included.
    pub async fn is_table_empty(&self, cx: &Cx, table: &str) -> Outcome<bool, Error> {
        let sql = format!(
            "SELECT 1 FROM {}{}",
            self.dialect().quote_identifier(table),
            self.dialect().limit_sql(Some(1), None)
        );
        let rows = try_outcome!(self.query_rows(cx, &sql, &[]).await);
        Outcome::Ok(rows.is_empty())
    }

    /// Create tables and their indexes; existing tables are left alone.
    pub async fn create_tables(&self, cx: &Cx, tables: &[Arc<TableMetadata>]) -> Outcome<(), Error> {
        let dialect = self.dialect();
        for table in tables {
            for sql in sqlbean_schema::create_table_statements(dialect, table) {
                try_outcome!(self.exec_sql(cx, &sql, &[]).await);
            }
            self.caches.invalidate(&table.name, None);
        }
        Outcome::Ok(())
    }

    /// Create the plain (non-unique) indexes of a table.
    pub async fn create_indexes(&self, cx: &Cx, table: &TableMetadata) -> Outcome<(), Error> {
        self.create_index_set(cx, table, false).await
    }

    /// Create the unique indexes of a table.
    pub async fn create_uniques(&self, cx: &Cx, table: &TableMetadata) -> Outcome<(), Error> {
        self.create_index_set(cx, table, true).await
    }

    async fn create_index_set(
        &self,
        cx: &Cx,
        table: &TableMetadata,
        unique: bool,
    ) -> Outcome<(), Error> {
        let dialect = self.dialect();
        for index in table.indexes.iter().filter(|i| i.unique == unique) {
            let sql = dialect.create_index_sql(&table.name, index);
            try_outcome!(self.exec_sql(cx, &sql, &[]).await);
        }
        Outcome::Ok(())
    }

    /// Drop every declared index of a table, unique ones included.
    pub async fn drop_indexes(&self, cx: &Cx, table: &TableMetadata) -> Outcome<(), Error> {
        let dialect = self.dialect();
        for index in &table.indexes {
            let sql = dialect.drop_index_sql(&table.name, &index.name);
            try_outcome!(self.exec_sql(cx, &sql, &[]).await);
        }
        Outcome::Ok(())
    }

    pub async fn drop_tables(&self, cx: &Cx, tables: &[&str]) -> Outcome<(), Error> {
        let dialect = self.dialect();
        for table in tables {
            try_outcome!(self.exec_sql(cx, &dialect.drop_table_sql(table), &[]).await);
            self.caches.invalidate(table, None);
        }
        Outcome::Ok(())
    }

    /// Introspect every table of the live database.
    pub async fn db_metas(&self, cx: &Cx) -> Outcome<DatabaseSchema, Error> {
        Introspector::new(self.dialect())
            .introspect_all(cx, &self.conn)
            .await
    }

    /// Reconcile the live schema with `tables`.
    ///
    /// Drift that cannot be fixed safely is reported, not raised.
    pub async fn sync(&self, cx: &Cx, tables: &[Arc<TableMetadata>]) -> Outcome<SyncReport, Error> {
        let report = try_outcome!(sqlbean_schema::sync(cx, &self.conn, tables).await);
        if !report.is_noop() {
            for table in tables {
                self.caches.invalidate(&table.name, None);
            }
        }
        Outcome::Ok(report)
    }

    /// A migration runner using the configured tracking table.
    pub fn migrations(&self, migrations: Vec<Migration>) -> MigrationRunner {
        MigrationRunner::new(migrations).table_name(self.options.migrations_table.clone())
    }

    /// Apply pending migrations; returns the applied IDs.
    pub async fn migrate(&self, cx: &Cx, migrations: Vec<Migration>) -> Outcome<Vec<String>, Error> {
        let applied = try_outcome!(self.migrations(migrations).migrate(cx, &self.conn).await);
        if !applied.is_empty() {
            self.caches.clear_all();
        }
        Outcome::Ok(applied)
    }

    // ==================== Configuration ====================

    /// Replace the process-wide naming convention.
    pub fn set_mapper(&self, mapper: Arc<dyn NameMapper>) {
        registry().set_mapper(mapper);
        self.caches.clear_all();
    }

    /// Cacher used by every cacheable table without an explicit mapping.
    pub fn set_default_cacher(&self, cacher: Option<Arc<dyn Cacher>>) {
        self.caches.set_default(cacher);
    }

    /// Cacher for one table; `None` disables caching for it.
    pub fn map_cacher(&self, table: &str, cacher: Option<Arc<dyn Cacher>>) {
        self.caches.map(table, cacher);
    }

    /// Drop everything cached for a table.
    pub fn clear_cache(&self, table: &str) {
        self.caches.invalidate(table, None);
    }

    pub fn clear_all_caches(&self) {
        self.caches.clear_all();
    }
}
