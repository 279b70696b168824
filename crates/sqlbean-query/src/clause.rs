//! ORDER BY and GROUP BY clause types.

use crate::cond::quote_column;
use sqlbean_core::Dialect;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// A column with a direction; the column is quoted when plain.
    Column {
        column: String,
        direction: OrderDirection,
    },
    /// A raw ordering fragment, emitted verbatim.
    Raw(String),
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy::Column {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy::Column {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        OrderBy::Raw(sql.into())
    }

    /// Generate SQL for this ORDER BY term.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            OrderBy::Column { column, direction } => {
                let mut sql = quote_column(dialect, column);
                sql.push_str(match direction {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
                sql
            }
            OrderBy::Raw(sql) => sql.clone(),
        }
    }
}

/// Render a GROUP BY column list.
pub fn group_by_sql(dialect: Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_column(dialect, c))
        .collect::<Vec<_>>()
        .join(", ")
}
