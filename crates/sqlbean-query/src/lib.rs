//! Statement building, SQL compilation and result caching for sqlbean.
//!
//! `sqlbean-query` sits between the bean metadata in `sqlbean-core` and the
//! session API in the `sqlbean` facade.
//!
//! # Role In The Architecture
//!
//! - **Conditions**: [`Cond`] trees render WHERE/HAVING/ON predicates.
//! - **Statement**: [`Statement`] accumulates one call's query intent.
//! - **Compiler**: [`Compiler`] turns a statement plus table metadata into
//!   dialect SQL and arguments, including lifecycle-column semantics.
//! - **Cache**: [`Cacher`] / [`LruCacher`] hold query id-sets and beans.

pub mod cache;
pub mod clause;
pub mod compiler;
pub mod cond;
pub mod join;
pub mod statement;

pub use cache::{Cacher, LruCacher, fingerprint};
pub use clause::{OrderBy, OrderDirection};
pub use compiler::{Compiled, Compiler, prepare_insert, prepare_update};
pub use cond::Cond;
pub use join::{Join, JoinType};
pub use statement::{SetExpr, Statement};
