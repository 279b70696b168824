//! Sessions: the fluent statement builder and its terminal operations.
//!
//! Builder calls accumulate intent into a single-use [`Statement`]; a
//! terminal call (`get`, `find`, `insert`, `update`, `delete`, `count`, ...)
//! consumes it. The statement is reset by every terminal call, whether it
//! succeeds or not.
//!
//! ```ignore
//! let mut session = engine.new_session();
//! let mut adults = Vec::new();
//! session
//!     .where_(Cond::gte("age", 18))
//!     .desc(&["created"])
//!     .limit(10, None)
//!     .find(&cx, &mut adults)
//!     .await;
//! ```

use crate::destination::{Destination, RawRow, bean_from_row, raw_row};
use crate::engine::Engine;
use sqlbean_core::{
    Bean, Cx, Error, ExecResult, Executor, Outcome, PrimaryKey, Result, Row, TableMetadata, Value,
    outcome, resolve, try_outcome, try_result,
};
use sqlbean_query::{
    Cacher, Compiled, Compiler, Cond, JoinType, Statement, fingerprint, prepare_insert,
    prepare_update,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// An insert adds a key no cached bean can hold yet.
const NO_KEYS: &[PrimaryKey] = &[];

/// A unit of work on an [`Engine`].
///
/// Methods take `&mut self`; a session is used by one task at a time.
#[derive(Debug)]
pub struct Session<'e, E: Executor> {
    engine: &'e Engine<E>,
    statement: Statement,
    in_transaction: bool,
    /// Tables written inside the open transaction
    written: HashSet<String>,
}

impl<'e, E: Executor> Session<'e, E> {
    pub(crate) fn new(engine: &'e Engine<E>) -> Self {
        Self {
            engine,
            statement: Statement::new(),
            in_transaction: false,
            written: HashSet::new(),
        }
    }

    pub fn engine(&self) -> &'e Engine<E> {
        self.engine
    }

    /// The statement built so far.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ==================== Builder ====================

    /// AND a condition onto the statement.
    pub fn where_(&mut self, cond: Cond) -> &mut Self {
        self.statement.and(cond);
        self
    }

    pub fn and(&mut self, cond: Cond) -> &mut Self {
        self.statement.and(cond);
        self
    }

    /// OR the running condition with `cond`.
    pub fn or(&mut self, cond: Cond) -> &mut Self {
        self.statement.or(cond);
        self
    }

    pub fn in_<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_(Cond::in_(column, values))
    }

    pub fn not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_(Cond::not_in(column, values))
    }

    pub fn between(
        &mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.where_(Cond::between(column, low, high))
    }

    pub fn like(&mut self, column: &str, pattern: impl Into<String>) -> &mut Self {
        self.where_(Cond::like(column, pattern))
    }

    /// Address rows by primary key; composite keys list values in key order.
    pub fn id(&mut self, key: PrimaryKey) -> &mut Self {
        self.statement.id(key);
        self
    }

    /// Target a table other than the bean's own.
    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.statement.table(name);
        self
    }

    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.statement.alias(alias);
        self
    }

    /// Restrict the projection, or the SET list of an update.
    pub fn cols(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.cols(columns);
        self
    }

    pub fn omit(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.omit(columns);
        self
    }

    /// Update these columns even when zero.
    pub fn must_cols(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.must_cols(columns);
        self
    }

    /// Update every column, zero or not.
    pub fn all_cols(&mut self) -> &mut Self {
        self.statement.all_cols();
        self
    }

    pub fn distinct(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.distinct(columns);
        self
    }

    /// Join another table; `on` may hold `?` placeholders bound to `args`.
    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Value>,
    ) -> &mut Self {
        self.statement.join(join_type, table, on, args);
        self
    }

    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.group_by(columns);
        self
    }

    pub fn having(&mut self, cond: Cond) -> &mut Self {
        self.statement.having(cond);
        self
    }

    pub fn asc(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.asc(columns);
        self
    }

    pub fn desc(&mut self, columns: &[&str]) -> &mut Self {
        self.statement.desc(columns);
        self
    }

    pub fn order_by(&mut self, order: impl Into<String>) -> &mut Self {
        self.statement.order_by(order);
        self
    }

    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.statement.limit(limit, offset);
        self
    }

    pub fn incr(&mut self, column: impl Into<String>, by: impl Into<Value>) -> &mut Self {
        self.statement.incr(column, by);
        self
    }

    pub fn decr(&mut self, column: impl Into<String>, by: impl Into<Value>) -> &mut Self {
        self.statement.decr(column, by);
        self
    }

    /// `SET column = <expr>` with a raw SQL expression.
    pub fn set_expr(&mut self, column: impl Into<String>, expr: impl Into<String>) -> &mut Self {
        self.statement.set_expr(column, expr);
        self
    }

    /// Use raw SQL as the SELECT; `?` placeholders bind `args`.
    pub fn sql(&mut self, sql: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.statement.sql(sql, args);
        self
    }

    /// Include soft-deleted rows, and delete physically.
    pub fn unscoped(&mut self) -> &mut Self {
        self.statement.unscoped();
        self
    }

    /// Do not turn non-zero bean fields into conditions.
    pub fn no_auto_condition(&mut self) -> &mut Self {
        self.statement.no_auto_condition();
        self
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.statement.no_cache();
        self
    }

    // ==================== Transactions ====================

    pub async fn begin(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.in_transaction {
            return Outcome::Err(Error::Custom("transaction already in progress".to_string()));
        }
        try_outcome!(self.engine.connection().begin(cx).await);
        self.in_transaction = true;
        tracing::debug!("Transaction started");
        Outcome::Ok(())
    }

    pub async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if !self.in_transaction {
            return Outcome::Err(Error::Custom("no transaction in progress".to_string()));
        }
        try_outcome!(self.engine.connection().commit(cx).await);
        self.in_transaction = false;
        self.written.clear();
        tracing::debug!("Transaction committed");
        Outcome::Ok(())
    }

    /// Roll back; caches of tables written in the transaction are dropped.
    pub async fn rollback(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if !self.in_transaction {
            return Outcome::Err(Error::Custom("no transaction in progress".to_string()));
        }
        let result = self.engine.connection().rollback(cx).await;
        self.in_transaction = false;
        for table in self.written.drain() {
            self.engine.caches().invalidate(&table, None);
        }
        tracing::debug!("Transaction rolled back");
        result
    }

    // ==================== Reads ====================

    /// Load one row into `bean`; its non-zero fields are conditions.
    ///
    /// Returns `false` and leaves `bean` alone when nothing matches.
    pub async fn get<T: Bean>(&mut self, cx: &Cx, bean: &mut T) -> Outcome<bool, Error> {
        let (meta, mut stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(bean));
        stmt.limit(1, stmt.offset);
        let rows = try_outcome!(self.select(cx, &meta, &stmt, Some(&conditions)).await);
        outcome(Destination::One(bean).bind_one(&meta, rows.first()))
    }

    /// Load one row into any single-row destination.
    ///
    /// `cond` contributes its non-zero fields as conditions. A sequence
    /// destination is a `TypeMismatch` and no SQL runs.
    pub async fn get_into<T: Bean>(
        &mut self,
        cx: &Cx,
        dest: Destination<'_, T>,
        cond: &T,
    ) -> Outcome<bool, Error> {
        let (meta, mut stmt) = try_result!(self.take::<T>());
        try_result!(dest.expect_single("get"));
        let conditions = try_result!(meta.values_of(cond));
        stmt.limit(1, stmt.offset);
        let rows = if dest.is_bean() {
            try_outcome!(self.select(cx, &meta, &stmt, Some(&conditions)).await)
        } else {
            try_outcome!(self.select_uncached(cx, &meta, &stmt, Some(&conditions)).await)
        };
        outcome(dest.bind_one(&meta, rows.first()))
    }

    /// Append every matching bean to `beans`.
    pub async fn find<T: Bean>(&mut self, cx: &Cx, beans: &mut Vec<T>) -> Outcome<(), Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let rows = try_outcome!(self.select(cx, &meta, &stmt, None).await);
        outcome(Destination::Many(beans).bind_many(&meta, &rows))
    }

    /// Append matching rows to any sequence destination.
    ///
    /// `cond` contributes its non-zero fields as conditions. A single-row
    /// destination is a `TypeMismatch` and no SQL runs.
    pub async fn find_into<T: Bean>(
        &mut self,
        cx: &Cx,
        dest: Destination<'_, T>,
        cond: &T,
    ) -> Outcome<(), Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        try_result!(dest.expect_many("find"));
        let conditions = try_result!(meta.values_of(cond));
        let rows = if dest.is_bean() {
            try_outcome!(self.select(cx, &meta, &stmt, Some(&conditions)).await)
        } else {
            try_outcome!(self.select_uncached(cx, &meta, &stmt, Some(&conditions)).await)
        };
        outcome(dest.bind_many(&meta, &rows))
    }

    /// Values of one column over the matching rows.
    pub async fn find_scalars<T: Bean>(
        &mut self,
        cx: &Cx,
        column: &str,
        cond: &T,
    ) -> Outcome<Vec<Value>, Error> {
        self.statement.cols(&[column]);
        let mut values = Vec::new();
        try_outcome!(self.find_into(cx, Destination::Scalars(&mut values), cond).await);
        Outcome::Ok(values)
    }

    /// Call `f` with each matching bean and its position.
    ///
    /// An error from `f` stops the iteration and is returned.
    pub async fn iterate<T, F>(&mut self, cx: &Cx, cond: &T, mut f: F) -> Outcome<usize, Error>
    where
        T: Bean,
        F: FnMut(usize, T) -> Result<()>,
    {
        let (meta, stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(cond));
        let rows = try_outcome!(self.select(cx, &meta, &stmt, Some(&conditions)).await);
        for (i, row) in rows.iter().enumerate() {
            let bean = try_result!(bean_from_row::<T>(&meta, row));
            try_result!(f(i, bean));
        }
        Outcome::Ok(rows.len())
    }

    pub async fn count<T: Bean>(&mut self, cx: &Cx, cond: &T) -> Outcome<u64, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(cond));
        let compiled = try_result!(self.compiler(&meta, &stmt).count(Some(&conditions)));
        let rows = try_outcome!(self.engine.query_rows(cx, &compiled.sql, &compiled.args).await);
        let count = rows.first().and_then(|r| r.get(0)).and_then(Value::as_i64).unwrap_or(0);
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }

    pub async fn exist<T: Bean>(&mut self, cx: &Cx, cond: &T) -> Outcome<bool, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(cond));
        let compiled = try_result!(self.compiler(&meta, &stmt).exist(Some(&conditions)));
        let rows = try_outcome!(self.engine.query_rows(cx, &compiled.sql, &compiled.args).await);
        Outcome::Ok(!rows.is_empty())
    }

    /// Sum of one column; no matching rows sum to 0.
    pub async fn sum<T: Bean>(&mut self, cx: &Cx, cond: &T, column: &str) -> Outcome<f64, Error> {
        let sums = try_outcome!(self.sums(cx, cond, &[column]).await);
        Outcome::Ok(sums.first().copied().unwrap_or(0.0))
    }

    /// Sums of several columns, in the order given.
    pub async fn sums<T: Bean>(
        &mut self,
        cx: &Cx,
        cond: &T,
        columns: &[&str],
    ) -> Outcome<Vec<f64>, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(cond));
        let compiled = try_result!(self.compiler(&meta, &stmt).sums(columns, Some(&conditions)));
        let rows = try_outcome!(self.engine.query_rows(cx, &compiled.sql, &compiled.args).await);
        let sums = match rows.first() {
            Some(row) => row.values().map(|v| v.as_f64().unwrap_or(0.0)).collect(),
            None => vec![0.0; columns.len()],
        };
        Outcome::Ok(sums)
    }

    // ==================== Writes ====================

    /// Insert one bean.
    ///
    /// Created/updated columns are stamped, a version column starts at 1,
    /// and a generated key is written back into the bean.
    pub async fn insert<T: Bean>(&mut self, cx: &Cx, bean: &mut T) -> Outcome<u64, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let values = try_result!(prepare_insert(&meta, bean));
        let compiler = self.compiler(&meta, &stmt);
        let compiled = try_result!(compiler.insert(&values));
        let result = try_outcome!(self.engine.exec_sql(cx, &compiled.sql, &compiled.args).await);
        self.invalidate(compiler.table_name(), Some(NO_KEYS));

        if let (Some(pos), Some(id)) = (meta.auto_increment, result.last_insert_id) {
            if values[pos].is_zero() {
                try_result!(bean.set_field_value(meta.columns[pos].field_index, &Value::BigInt(id)));
            }
        }
        tracing::debug!(table = compiler.table_name(), id = ?result.last_insert_id, "Inserted bean");
        Outcome::Ok(result.rows_affected)
    }

    /// Insert several beans with one statement.
    ///
    /// Generated keys are written back when every bean left its key zero.
    pub async fn insert_multi<T: Bean>(&mut self, cx: &Cx, beans: &mut [T]) -> Outcome<u64, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let mut rows = Vec::with_capacity(beans.len());
        for bean in beans.iter_mut() {
            rows.push(try_result!(prepare_insert(&meta, bean)));
        }
        let compiler = self.compiler(&meta, &stmt);
        let compiled = try_result!(compiler.insert_multi(&rows));
        let result = try_outcome!(self.engine.exec_sql(cx, &compiled.sql, &compiled.args).await);
        self.invalidate(compiler.table_name(), Some(NO_KEYS));

        if let (Some(pos), Some(last)) = (meta.auto_increment, result.last_insert_id) {
            let col = &meta.columns[pos];
            if rows.iter().all(|r| r[pos].is_zero()) {
                // SQLite hands out consecutive rowids within one INSERT.
                let first = last - beans.len() as i64 + 1;
                for (offset, bean) in beans.iter_mut().enumerate() {
                    let id = Value::BigInt(first + offset as i64);
                    try_result!(bean.set_field_value(col.field_index, &id));
                }
            }
        }
        Outcome::Ok(result.rows_affected)
    }

    /// Update rows from a bean's non-zero fields.
    ///
    /// Without any condition the bean's own primary key addresses the row.
    /// With a version column the row must still hold the bean's version;
    /// zero affected rows means another writer got there first (see
    /// [`Error::ensure_affected`]). On success the bean's version advances.
    pub async fn update<T: Bean>(&mut self, cx: &Cx, bean: &mut T) -> Outcome<u64, Error> {
        let (meta, mut stmt) = try_result!(self.take::<T>());
        if stmt.cond.is_none() && stmt.id.is_none() {
            if let Ok(key) = meta.pk_of(bean) {
                if !key.is_zero() {
                    stmt.id(key);
                }
            }
        }
        let values = try_result!(prepare_update(&meta, bean));
        let compiler = self.compiler(&meta, &stmt);
        let compiled = try_result!(compiler.update(&values));
        let result = try_outcome!(self.engine.exec_sql(cx, &compiled.sql, &compiled.args).await);
        self.invalidate(compiler.table_name(), addressed_keys(&stmt).as_deref());

        if let Some(pos) = meta.version.filter(|_| result.rows_affected > 0) {
            let next = values[pos].as_i64().unwrap_or(0) + 1;
            try_result!(bean.set_field_value(meta.columns[pos].field_index, &Value::BigInt(next)));
        } else if meta.version.is_some() {
            tracing::debug!(table = compiler.table_name(), "Versioned update matched no rows");
        }
        Outcome::Ok(result.rows_affected)
    }

    /// Delete matching rows; soft-deletes when the bean has a deleted column.
    ///
    /// `cond` contributes its non-zero fields as conditions. A delete with
    /// no condition at all is refused.
    pub async fn delete<T: Bean>(&mut self, cx: &Cx, cond: &T) -> Outcome<u64, Error> {
        let (meta, stmt) = try_result!(self.take::<T>());
        let conditions = try_result!(meta.values_of(cond));
        let compiler = self.compiler(&meta, &stmt);
        let compiled = try_result!(compiler.delete(Some(&conditions)));
        let result = try_outcome!(self.engine.exec_sql(cx, &compiled.sql, &compiled.args).await);
        self.invalidate(compiler.table_name(), addressed_keys(&stmt).as_deref());
        Outcome::Ok(result.rows_affected)
    }

    // ==================== Raw SQL ====================

    /// Run a raw query; `?` placeholders are positional.
    pub async fn query(&mut self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<Vec<RawRow>, Error> {
        self.statement.reset();
        let rows = try_outcome!(self.engine.query_rows(cx, sql, args).await);
        Outcome::Ok(rows.iter().map(raw_row).collect())
    }

    /// Run a raw query, rendering every value as text (NULL as "").
    pub async fn query_string(
        &mut self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<Vec<BTreeMap<String, String>>, Error> {
        self.statement.reset();
        let rows = try_outcome!(self.engine.query_rows(cx, sql, args).await);
        let rendered = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(name, value)| {
                        let text = if value.is_null() {
                            String::new()
                        } else {
                            value.to_plain_string()
                        };
                        (name.to_string(), text)
                    })
                    .collect()
            })
            .collect();
        Outcome::Ok(rendered)
    }

    /// Run a raw statement. Every cache is cleared, since the tables it
    /// touches are unknown.
    pub async fn exec(&mut self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<ExecResult, Error> {
        self.statement.reset();
        let result = try_outcome!(self.engine.exec_sql(cx, sql, args).await);
        self.engine.caches().clear_all();
        Outcome::Ok(result)
    }

    // ==================== Internals ====================

    /// Consume the statement and resolve `T`.
    fn take<T: Bean>(&mut self) -> Result<(Arc<TableMetadata>, Statement)> {
        let stmt = self.statement.take();
        let meta = resolve::<T>()?;
        Ok((meta, stmt))
    }

    fn compiler<'a>(&self, meta: &'a TableMetadata, stmt: &'a Statement) -> Compiler<'a> {
        Compiler::new(self.engine.dialect(), meta, stmt)
    }

    fn invalidate(&mut self, table: &str, keys: Option<&[PrimaryKey]>) {
        self.engine.caches().invalidate(table, keys);
        if self.in_transaction {
            self.written.insert(table.to_string());
        }
    }

    async fn select_uncached(
        &self,
        cx: &Cx,
        meta: &TableMetadata,
        stmt: &Statement,
        conditions: Option<&[Value]>,
    ) -> Outcome<Vec<Row>, Error> {
        let compiled = try_result!(self.compiler(meta, stmt).select(conditions));
        self.engine.query_rows(cx, &compiled.sql, &compiled.args).await
    }

    /// SELECT through the cache when the statement allows it.
    async fn select(
        &self,
        cx: &Cx,
        meta: &TableMetadata,
        stmt: &Statement,
        conditions: Option<&[Value]>,
    ) -> Outcome<Vec<Row>, Error> {
        // A cache hit never reaches the executor, so check here as well.
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let compiler = self.compiler(meta, stmt);
        let compiled = try_result!(compiler.select(conditions));
        let table = compiler.table_name();
        let cacher = if self.in_transaction || !stmt.is_cacheable() {
            None
        } else {
            self.engine.caches().for_bean(meta, table)
        };
        let Some(cacher) = cacher else {
            return self.engine.query_rows(cx, &compiled.sql, &compiled.args).await;
        };

        let key = match fingerprint(&compiled.sql, &compiled.args) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cannot fingerprint query");
                return self.engine.query_rows(cx, &compiled.sql, &compiled.args).await;
            }
        };

        match cacher.get_ids(table, &key) {
            Ok(Some(ids)) => {
                if let Some(rows) = try_outcome!(self.load_cached(cx, &*cacher, &compiler, &ids).await) {
                    tracing::trace!(target: "sqlbean::cache", table, rows = rows.len(), "Cache hit");
                    return Outcome::Ok(rows);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache read failed");
                return self.engine.query_rows(cx, &compiled.sql, &compiled.args).await;
            }
        }

        let rows = try_outcome!(self.engine.query_rows(cx, &compiled.sql, &compiled.args).await);
        store_rows(&*cacher, meta, table, &key, &rows);
        Outcome::Ok(rows)
    }

    /// Resolve a cached id set through the bean tier, reloading misses by
    /// key. `None` when the set is stale and the query must run again.
    async fn load_cached(
        &self,
        cx: &Cx,
        cacher: &dyn Cacher,
        compiler: &Compiler<'_>,
        ids: &[PrimaryKey],
    ) -> Outcome<Option<Vec<Row>>, Error> {
        let table = compiler.table_name();
        let mut rows = Vec::with_capacity(ids.len());
        for key in ids {
            match cacher.get_bean(table, key) {
                Ok(Some(row)) => {
                    rows.push(row);
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache read failed");
                    return Outcome::Ok(None);
                }
            }
            let Compiled { sql, args } = try_result!(compiler.get_by_pk(key));
            let mut found = try_outcome!(self.engine.query_rows(cx, &sql, &args).await);
            let Some(row) = found.pop() else {
                if let Err(e) = cacher.clear_ids(table) {
                    tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache clear failed");
                }
                return Outcome::Ok(None);
            };
            if let Err(e) = cacher.put_bean(table, key.clone(), row.clone()) {
                tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache write failed");
            }
            rows.push(row);
        }
        Outcome::Ok(Some(rows))
    }
}

impl<E: Executor> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if self.in_transaction {
            tracing::warn!("Session dropped with an open transaction");
        }
    }
}

/// Fill both cache tiers from a complete-bean result.
fn store_rows(cacher: &dyn Cacher, meta: &TableMetadata, table: &str, key: &str, rows: &[Row]) {
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        let values: Vec<Value> = row.values().cloned().collect();
        let Some(id) = meta.pk_from_values(&values) else {
            return;
        };
        ids.push(id);
    }
    let result = ids
        .iter()
        .zip(rows)
        .try_for_each(|(id, row)| cacher.put_bean(table, id.clone(), row.clone()))
        .and_then(|()| cacher.put_ids(table, key, ids.clone()));
    if let Err(e) = result {
        tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache write failed");
    }
}

/// Keys an `id(...)`-only statement touches; `None` when unknown.
fn addressed_keys(stmt: &Statement) -> Option<Vec<PrimaryKey>> {
    match (&stmt.id, &stmt.cond) {
        (Some(key), None) => Some(vec![key.clone()]),
        _ => None,
    }
}
