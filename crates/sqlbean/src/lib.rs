//! sqlbean - a bean-oriented ORM engine.
//!
//! Plain structs ("beans") derive [`Bean`]; an [`Engine`] turns fluent
//! [`Session`] calls into dialect SQL, maps rows back into beans and can
//! cache results per table.
//!
//! - Lifecycle columns: generated keys, created/updated stamps, soft delete
//!   and optimistic versioning
//! - Two-tier LRU result cache with write-path invalidation
//! - Schema sync against the live catalog, plus ordered migrations
//! - Cancel-correct execution on asupersync (`Cx` + `Outcome`)
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbean::prelude::*;
//!
//! #[derive(Bean, Debug, Default)]
//! struct User {
//!     #[bean(pk, autoincr)]
//!     id: i64,
//!     #[bean(unique, len = 64)]
//!     name: String,
//!     age: i32,
//!     #[bean(version)]
//!     version: i32,
//!     #[bean(deleted)]
//!     deleted_at: Option<Timestamp>,
//! }
//!
//! async fn example(cx: &Cx) -> Outcome<(), Error> {
//!     let engine = Engine::with_options(
//!         try_result!(SqliteConnection::open_memory()),
//!         EngineOptions::new().cache(1000),
//!     );
//!     try_outcome!(engine.sync(cx, &[try_result!(resolve::<User>())]).await);
//!
//!     let mut session = engine.new_session();
//!     let mut user = User { name: "ada".into(), age: 36, ..User::default() };
//!     try_outcome!(session.insert(cx, &mut user).await);
//!
//!     let mut adults = Vec::new();
//!     try_outcome!(session.where_(Cond::gte("age", 18)).find(cx, &mut adults).await);
//!
//!     user.age = 37;
//!     try_outcome!(session.update(cx, &mut user).await);
//!     try_outcome!(session.id(PrimaryKey::single(user.id)).delete(cx, &User::default()).await);
//!     Outcome::Ok(())
//! }
//! ```

mod cache;
pub mod destination;
pub mod engine;
pub mod options;
pub mod session;

pub use destination::{Destination, RawRow};
pub use engine::Engine;
pub use options::{EngineOptions, MapperKind};
pub use session::Session;

pub use sqlbean_core::{
    Bean, Column, Cx, Dialect, Error, ExecResult, Executor, FieldInfo, IndexInfo, NameMapper,
    Outcome, PrefixMapper, PrimaryKey, Result, Row, SameMapper, SchemaDriftWarning, SnakeMapper,
    SqlType, SuffixMapper, TableMetadata, Timestamp, Value, forget, resolve, try_outcome,
    try_result,
};
pub use sqlbean_macros::Bean;
pub use sqlbean_query::{Cacher, Cond, JoinType, LruCacher, Statement};
pub use sqlbean_schema::{
    DatabaseSchema, Migration, MigrationRunner, MigrationStatus, SyncReport, TableInfo,
};
pub use sqlbean_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{
        Bean, Cond, Cx, Destination, Engine, EngineOptions, Error, Migration, Outcome,
        PrimaryKey, Session, SqliteConnection, Timestamp, Value, resolve, try_outcome,
        try_result,
    };
}
