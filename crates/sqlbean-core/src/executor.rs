//! The executor seam between the engine and a database driver.
//!
//! An [`Executor`] runs SQL text with positional arguments under a `Cx`
//! cancellation context. The engine never talks to a driver any other way.

use crate::dialect::Dialect;
use crate::error::Error;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// Result of a data-modifying statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows matched/changed, as reported by the driver
    pub rows_affected: u64,
    /// Last generated row id, when the driver reports one
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub const fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}

/// A database connection capable of executing statements.
///
/// Drivers should check `cx.cancel_reason()` before touching the database
/// and return [`Outcome::Cancelled`] if set. A cancelled write has an
/// unknown outcome.
///
/// Transactions are connection-scoped: `begin` opens one, and every
/// statement until `commit`/`rollback` runs inside it.
pub trait Executor: Send + Sync {
    /// SQL flavour this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Run a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Run a data-modifying or DDL statement.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send;

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    fn commit(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    fn rollback(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Check the connection is alive.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let probe = self.query(cx, "SELECT 1", &[]);
        async move {
            match probe.await {
                Outcome::Ok(_) => Outcome::Ok(()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

/// Unwrap an `Outcome`, returning early from the enclosing function on
/// anything but `Ok`.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(v) => v,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return $crate::Outcome::Err(::core::convert::From::from(e)),
        }
    };
}

/// Collapse a `Result` into an `Outcome`.
pub fn outcome<T>(result: crate::Result<T>) -> Outcome<T, Error> {
    result.map_or_else(Outcome::Err, Outcome::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubled(input: Outcome<i32, Error>) -> Outcome<i32, Error> {
        let v = try_outcome!(input);
        Outcome::Ok(v * 2)
    }

    fn parsed(text: &str) -> Outcome<i64, Error> {
        let v: i64 = try_result!(text.parse::<i64>().map_err(|e| Error::Custom(e.to_string())));
        Outcome::Ok(v)
    }

    #[test]
    fn try_outcome_propagates() {
        assert!(matches!(doubled(Outcome::Ok(2)), Outcome::Ok(4)));
        assert!(matches!(
            doubled(Outcome::Err(Error::Custom("x".into()))),
            Outcome::Err(Error::Custom(_))
        ));
    }

    #[test]
    fn try_result_converts() {
        assert!(matches!(parsed("7"), Outcome::Ok(7)));
        assert!(matches!(parsed("seven"), Outcome::Err(Error::Custom(_))));
    }

    #[test]
    fn exec_result_default() {
        let r = ExecResult::default();
        assert_eq!(r.rows_affected, 0);
        assert_eq!(r.last_insert_id, None);
    }
}
