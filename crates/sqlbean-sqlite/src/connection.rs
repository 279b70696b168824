//! SQLite connection and its [`Executor`] implementation.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::result_large_err)]

use crate::ffi;
use crate::types;
use serde::Deserialize;
use sqlbean_core::error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind};
use sqlbean_core::{ColumnInfo, Cx, Dialect, Error, ExecResult, Executor, Outcome, Row, Value, outcome};
use std::ffi::{CStr, CString, c_int};
use std::future::Future;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// How to open a SQLite database.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the database file, or `:memory:`.
    pub path: String,
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds; zero disables it.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    pub read_only: bool,
    pub read_write: bool,
    /// Create the database file if it doesn't exist.
    pub create: bool,
    /// Interpret the path as a `file:` URI.
    pub uri: bool,
    pub no_mutex: bool,
    pub full_mutex: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write, database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        for (set, bit) in [
            (self.read_only, ffi::SQLITE_OPEN_READONLY),
            (self.read_write, ffi::SQLITE_OPEN_READWRITE),
            (self.create, ffi::SQLITE_OPEN_CREATE),
            (self.uri, ffi::SQLITE_OPEN_URI),
            (self.no_mutex, ffi::SQLITE_OPEN_NOMUTEX),
            (self.full_mutex, ffi::SQLITE_OPEN_FULLMUTEX),
        ] {
            if set {
                flags |= bit;
            }
        }
        // Default to read-write/create if no access mode was chosen
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the handle is only touched while holding the connection mutex.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// All access to the handle is serialized through an internal mutex, so a
/// connection can be shared by reference. Transactions are connection-wide.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteConnection {
    /// Open a connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connect_error("Invalid path: contains null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: valid pointers; the return code is checked
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is non-null; the handle is closed right after reading the message
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(connect_error(format!("Failed to open database: {}", msg)));
        }

        // Double-quoted tokens are identifiers only; a misspelled column
        // must not silently become a string literal.
        let off: c_int = 0;
        for op in [ffi::SQLITE_DBCONFIG_DQS_DML, ffi::SQLITE_DBCONFIG_DQS_DDL] {
            // SAFETY: db is valid; these ops take (int, int*) and a null out-pointer is allowed
            let rc = unsafe { ffi::sqlite3_db_config(db, op, off, ptr::null_mut::<c_int>()) };
            if rc != ffi::SQLITE_OK {
                tracing::warn!(op, rc, "Could not disable double-quoted string literals");
            }
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(
                    db,
                    c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX),
                );
            }
        }

        tracing::debug!(path = %config.path, flags, "Opened SQLite database");
        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                in_transaction: false,
            }),
            path: config.path.clone(),
        })
    }

    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>, Error> {
        self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "SQLite connection mutex poisoned".to_string(),
                source: None,
            })
        })
    }

    /// Run one or more `;`-separated statements without parameters.
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock()?;
        exec_batch(inner.db, sql)
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.lock().map(|i| i.in_transaction).unwrap_or(false)
    }

    /// Prepare, bind and step a statement, collecting every row.
    pub fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid and i < col_count
            let name = unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt.raw) } {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: the last step returned SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.raw, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }
        Ok(rows)
    }

    /// Prepare, bind and run a statement for its side effects.
    pub fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<ExecResult, Error> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        drop(stmt);
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let (changes, rowid) = unsafe {
                    (
                        ffi::sqlite3_changes(inner.db),
                        ffi::sqlite3_last_insert_rowid(inner.db),
                    )
                };
                let rows_affected = u64::try_from(changes).unwrap_or(0);
                let is_insert = sql.trim_start().get(..6).is_some_and(|p| p.eq_ignore_ascii_case("INSERT"));
                let last_insert_id = (is_insert && rows_affected > 0).then_some(rowid);
                Ok(ExecResult::new(rows_affected, last_insert_id))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn begin_sync(&self) -> Result<(), Error> {
        let mut inner = self.lock()?;
        if inner.in_transaction {
            return Err(transaction_error("Already in a transaction"));
        }
        exec_batch(inner.db, "BEGIN")?;
        inner.in_transaction = true;
        tracing::trace!(path = %self.path, "BEGIN");
        Ok(())
    }

    fn finish_sync(&self, verb: &'static str) -> Result<(), Error> {
        let mut inner = self.lock()?;
        if !inner.in_transaction {
            return Err(transaction_error("Not in a transaction"));
        }
        let result = exec_batch(inner.db, verb);
        // A failed COMMIT may leave the transaction open; SQLite reports it
        // through autocommit, and ROLLBACK always ends it.
        if result.is_ok() || verb == "ROLLBACK" {
            inner.in_transaction = false;
        }
        tracing::trace!(path = %self.path, "{}", verb);
        result
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.lock() {
            if !inner.db.is_null() {
                // SAFETY: db is valid and no statement outlives the lock
                unsafe {
                    ffi::sqlite3_close(inner.db);
                }
            }
        }
    }
}

/// Check cancellation, then run the synchronous operation.
fn run<T>(cx: &Cx, op: impl FnOnce() -> Result<T, Error>) -> Outcome<T, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    outcome(op())
}

impl Executor for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = run(cx, || self.query_sync(sql, params));
        async move { result }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send {
        let result = run(cx, || self.execute_sync(sql, params));
        async move { result }
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run(cx, || self.begin_sync());
        async move { result }
    }

    fn commit(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run(cx, || self.finish_sync("COMMIT"));
        async move { result }
    }

    fn rollback(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = run(cx, || self.finish_sync("ROLLBACK"));
        async move { result }
    }
}

/// A prepared statement finalized on drop.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
    db: *mut ffi::sqlite3,
    sql: String,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self, Error> {
        let c_sql = CString::new(sql).map_err(|_| {
            query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
        })?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: all pointers are valid for the call
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_int::try_from(c_sql.as_bytes().len()).unwrap_or(c_int::MAX),
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(step_error(db, sql));
        }
        if raw.is_null() {
            // Whitespace or comments only
            return Err(query_error(
                QueryErrorKind::Syntax,
                sql,
                "statement is empty".to_string(),
            ));
        }
        Ok(Self {
            raw,
            db,
            sql: sql.to_string(),
        })
    }

    fn bind_all(&self, params: &[Value]) -> Result<(), Error> {
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: raw is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.raw, index, param) };
            if rc != ffi::SQLITE_OK {
                // SAFETY: db is valid
                let msg = unsafe { errmsg(self.db) };
                return Err(query_error(
                    QueryErrorKind::Database,
                    &self.sql,
                    format!("Failed to bind parameter {}: {}", i + 1, msg),
                ));
            }
        }
        Ok(())
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from sqlite3_prepare_v2 and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

fn exec_batch(db: *mut ffi::sqlite3, sql: &str) -> Result<(), Error> {
    let c_sql = CString::new(sql).map_err(|_| {
        query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
    })?;
    let mut err: *mut std::ffi::c_char = ptr::null_mut();
    // SAFETY: all pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut err) };
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }
    let msg = if err.is_null() {
        ffi::error_string(rc).to_string()
    } else {
        // SAFETY: err was allocated by SQLite and is freed once
        unsafe {
            let msg = CStr::from_ptr(err).to_string_lossy().into_owned();
            ffi::sqlite3_free(err.cast());
            msg
        }
    };
    let mut error = query_error(error_code_to_kind(rc), sql, msg);
    if let Error::Query(q) = &mut error {
        // SAFETY: db is valid
        q.sqlstate = sqlstate_of(unsafe { ffi::sqlite3_extended_errcode(db) });
    }
    Err(error)
}

/// # Safety
/// `db` must be a valid connection handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: forwarded caller guarantee; errmsg never returns null for a valid handle
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid for every caller
    let (msg, code, extended) = unsafe {
        (
            errmsg(db),
            ffi::sqlite3_errcode(db),
            ffi::sqlite3_extended_errcode(db),
        )
    };
    let mut error = QueryError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        sqlstate: sqlstate_of(extended),
        message: msg,
        detail: None,
        source: None,
    };
    if error.kind == QueryErrorKind::Constraint {
        error.detail = Some(format!("extended code {}", extended));
    }
    Error::Query(error)
}

/// SQLSTATE for the extended codes callers branch on.
fn sqlstate_of(extended: c_int) -> Option<String> {
    match extended {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some("23505".to_string()),
        _ => None,
    }
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Deadlock,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        ffi::SQLITE_ERROR => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        sqlstate: None,
        message,
        detail: None,
        source: None,
    })
}

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

fn transaction_error(message: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Database,
        sql: None,
        sqlstate: None,
        message: message.to_string(),
        detail: None,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use asupersync::types::CancelKind;

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    fn people() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE people (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE, seen DATETIME)",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_insert_reports_rowid() {
        let conn = people();
        let res = conn
            .execute_sync("INSERT INTO people (name) VALUES (?1)", &[Value::Text("amy".into())])
            .unwrap();
        assert_eq!(res, ExecResult::new(1, Some(1)));

        let res = conn
            .execute_sync("UPDATE people SET name = ?1", &[Value::Text("bo".into())])
            .unwrap();
        assert_eq!(res.rows_affected, 1);
        assert_eq!(res.last_insert_id, None);
    }

    #[test]
    fn test_query_rows_and_types() {
        let conn = people();
        let seen = Value::Timestamp(86_400 * 1_000_000);
        conn.execute_sync(
            "INSERT INTO people (name, seen) VALUES (?1, ?2)",
            &[Value::Text("amy".into()), seen],
        )
        .unwrap();

        let rows = conn
            .query_sync("SELECT id, name, seen FROM people WHERE id = ?1", &[Value::BigInt(1)])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&Value::Int(1)));
        assert_eq!(rows[0].get_by_name("seen"), Some(&Value::Text("1970-01-02 00:00:00".into())));
    }

    #[test]
    fn test_unique_violation_has_sqlstate() {
        let conn = people();
        let args = [Value::Text("amy".into())];
        conn.execute_sync("INSERT INTO people (name) VALUES (?1)", &args).unwrap();
        let err = conn
            .execute_sync("INSERT INTO people (name) VALUES (?1)", &args)
            .unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert!(q.is_unique_violation());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_syntax_error_keeps_sql() {
        let conn = SqliteConnection::open_memory().unwrap();
        let err = conn.query_sync("SELEC 1", &[]).unwrap_err();
        assert_eq!(err.sql(), Some("SELEC 1"));
    }

    #[test]
    fn test_double_quotes_are_identifiers_only() {
        let conn = people();
        conn.execute_sync("INSERT INTO people (name) VALUES (?1)", &[Value::Text("amy".into())])
            .unwrap();
        let err = conn
            .execute_sync("DELETE FROM people WHERE \"nmae\" <> ?1", &[Value::Text("x".into())])
            .unwrap_err();
        assert!(err.to_string().contains("nmae"), "{err}");
        assert!(conn.execute_raw("CREATE INDEX idx_typo ON people (\"nosuch\")").is_err());

        let rows = conn.query_sync("SELECT \"name\" FROM people", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_cancelled_context_runs_nothing() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let conn = people();
            cx.cancel_with(CancelKind::User, Some("shutting down"));
            let res = conn
                .execute(&cx, "INSERT INTO people (name) VALUES (?1)", &[Value::Text("z".into())])
                .await;
            assert!(matches!(res, Outcome::Cancelled(_)));
            assert!(matches!(conn.begin(&cx).await, Outcome::Cancelled(_)));

            let rows = conn.query_sync("SELECT count(*) FROM people", &[]).unwrap();
            assert_eq!(rows[0].get(0), Some(&Value::Int(0)));
        });
    }

    #[test]
    fn test_executor_transactions() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let conn = people();
            unwrap_outcome(conn.ping(&cx).await);

            unwrap_outcome(conn.begin(&cx).await);
            assert!(conn.in_transaction());
            unwrap_outcome(
                conn.execute(&cx, "INSERT INTO people (name) VALUES (?1)", &[Value::Text("x".into())])
                    .await,
            );
            unwrap_outcome(conn.rollback(&cx).await);
            assert!(!conn.in_transaction());

            let rows = unwrap_outcome(conn.query(&cx, "SELECT count(*) FROM people", &[]).await);
            assert_eq!(rows[0].get(0), Some(&Value::Int(0)));

            unwrap_outcome(conn.begin(&cx).await);
            assert!(matches!(conn.begin(&cx).await, Outcome::Err(_)));
            unwrap_outcome(
                conn.execute(&cx, "INSERT INTO people (name) VALUES (?1)", &[Value::Text("y".into())])
                    .await,
            );
            unwrap_outcome(conn.commit(&cx).await);
            let rows = unwrap_outcome(conn.query(&cx, "SELECT name FROM people", &[]).await);
            assert_eq!(rows.len(), 1);
            assert!(matches!(conn.commit(&cx).await, Outcome::Err(_)));
        });
    }
}
