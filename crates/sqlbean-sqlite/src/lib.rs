//! SQLite driver for sqlbean.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! [`SqliteConnection`] implements the `Executor` trait from sqlbean-core on
//! top of libsqlite3. Parameters use `?N` placeholders.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlbean_sqlite::SqliteConnection;
//! use sqlbean_core::{Cx, Executor, Outcome, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let cx = Cx::for_testing();
//! match conn.execute(&cx, "INSERT INTO users (name) VALUES (?1)", &[Value::Text("Alice".into())]).await {
//!     Outcome::Ok(res) => println!("inserted id {:?}", res.last_insert_id),
//!     Outcome::Err(e) => eprintln!("Error: {}", e),
//!     _ => {}
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Bool` | INTEGER (0/1) |
//! | `TinyInt` .. `BigInt` | INTEGER |
//! | `Float`, `Double` | REAL |
//! | `Text`, `Decimal`, `Json` | TEXT |
//! | `Bytes` | BLOB |
//! | `Timestamp` | TEXT (`YYYY-MM-DD HH:MM:SS[.ffffff]`) |
//! | `Null` | NULL |
//!
//! Integers read back as `Int` when they fit 32 bits and `BigInt` otherwise.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
