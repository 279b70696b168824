//! Per-call query intent.
//!
//! A [`Statement`] collects everything fluent session calls ask for: target
//! table, conditions, projection, joins, ordering, paging and update
//! expressions. It is consumed by exactly one terminal operation and then
//! reset to empty, whether that operation succeeded or not.

use crate::clause::OrderBy;
use crate::cond::Cond;
use crate::join::{Join, JoinType};
use sqlbean_core::{PrimaryKey, Value};

/// An UPDATE SET expression that does not come from bean fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// `col = col + ?`
    Incr(String, Value),
    /// `col = col - ?`
    Decr(String, Value),
    /// `col = <raw expression>`
    Expr(String, String),
}

impl SetExpr {
    pub fn column(&self) -> &str {
        match self {
            SetExpr::Incr(c, _) | SetExpr::Decr(c, _) | SetExpr::Expr(c, _) => c,
        }
    }
}

/// Accumulated query intent for one terminal call.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// Explicit table name; otherwise the bean's table
    pub table: Option<String>,
    pub alias: Option<String>,
    pub cond: Option<Cond>,
    pub id: Option<PrimaryKey>,
    /// Explicit projection / update column selection
    pub columns: Vec<String>,
    pub omit: Vec<String>,
    /// Columns updated even when zero
    pub must_cols: Vec<String>,
    /// Update every column, zero or not
    pub all_cols: bool,
    pub distinct: bool,
    pub joins: Vec<Join>,
    pub group_by: Vec<String>,
    pub having: Option<Cond>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Ignore the soft-delete scope
    pub unscoped: bool,
    /// Do not derive conditions from bean fields
    pub no_auto_condition: bool,
    pub set_exprs: Vec<SetExpr>,
    /// Raw SELECT with its arguments
    pub raw: Option<(String, Vec<Value>)>,
    pub no_cache: bool,
}

/// Split a comma-separated column list, trimming blanks.
fn split_columns<'a>(columns: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    columns
        .iter()
        .flat_map(|c| c.split(','))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.table = Some(name.into());
        self
    }

    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.alias = Some(alias.into());
        self
    }

    /// AND a condition onto the running tree.
    pub fn and(&mut self, cond: Cond) -> &mut Self {
        self.cond = Some(Cond::and_opt(self.cond.take(), cond));
        self
    }

    /// OR a condition with the whole running tree.
    pub fn or(&mut self, cond: Cond) -> &mut Self {
        self.cond = Some(match self.cond.take() {
            Some(existing) => existing.or(cond),
            None => cond,
        });
        self
    }

    pub fn id(&mut self, key: PrimaryKey) -> &mut Self {
        self.id = Some(key);
        self
    }

    /// Restrict the projection (or the update SET list). Entries may be
    /// comma-separated lists.
    pub fn cols(&mut self, columns: &[&str]) -> &mut Self {
        self.columns.extend(split_columns(columns));
        self
    }

    pub fn omit(&mut self, columns: &[&str]) -> &mut Self {
        self.omit.extend(split_columns(columns));
        self
    }

    pub fn must_cols(&mut self, columns: &[&str]) -> &mut Self {
        self.must_cols.extend(split_columns(columns));
        self
    }

    pub fn all_cols(&mut self) -> &mut Self {
        self.all_cols = true;
        self
    }

    /// SELECT DISTINCT over the given columns.
    pub fn distinct(&mut self, columns: &[&str]) -> &mut Self {
        self.distinct = true;
        self.cols(columns)
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Value>,
    ) -> &mut Self {
        self.joins.push(Join::new(join_type, table, on).args(args));
        self
    }

    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.group_by.extend(split_columns(columns));
        self
    }

    pub fn having(&mut self, cond: Cond) -> &mut Self {
        self.having = Some(Cond::and_opt(self.having.take(), cond));
        self
    }

    pub fn asc(&mut self, columns: &[&str]) -> &mut Self {
        self.order_by
            .extend(split_columns(columns).map(OrderBy::asc));
        self
    }

    pub fn desc(&mut self, columns: &[&str]) -> &mut Self {
        self.order_by
            .extend(split_columns(columns).map(OrderBy::desc));
        self
    }

    /// Raw ORDER BY fragment.
    pub fn order_by(&mut self, order: impl Into<String>) -> &mut Self {
        self.order_by.push(OrderBy::raw(order));
        self
    }

    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn incr(&mut self, column: impl Into<String>, by: impl Into<Value>) -> &mut Self {
        self.set_exprs.push(SetExpr::Incr(column.into(), by.into()));
        self
    }

    pub fn decr(&mut self, column: impl Into<String>, by: impl Into<Value>) -> &mut Self {
        self.set_exprs.push(SetExpr::Decr(column.into(), by.into()));
        self
    }

    pub fn set_expr(&mut self, column: impl Into<String>, expr: impl Into<String>) -> &mut Self {
        self.set_exprs.push(SetExpr::Expr(column.into(), expr.into()));
        self
    }

    /// Replace the generated SELECT with raw SQL.
    pub fn sql(&mut self, sql: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.raw = Some((sql.into(), args));
        self
    }

    pub fn unscoped(&mut self) -> &mut Self {
        self.unscoped = true;
        self
    }

    pub fn no_auto_condition(&mut self) -> &mut Self {
        self.no_auto_condition = true;
        self
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.no_cache = true;
        self
    }

    /// Take the accumulated intent, leaving an empty statement behind.
    pub fn take(&mut self) -> Statement {
        std::mem::take(self)
    }

    pub fn reset(&mut self) {
        *self = Statement::default();
    }

    pub fn is_empty(&self) -> bool {
        self.cond.is_none() && self.id.is_none() && self.raw.is_none() && self.table.is_none()
    }

    /// Whether results of this statement may go through the cache: the
    /// query must load complete beans from a single table.
    pub fn is_cacheable(&self) -> bool {
        !self.no_cache
            && self.raw.is_none()
            && self.joins.is_empty()
            && self.columns.is_empty()
            && self.omit.is_empty()
            && !self.distinct
            && self.group_by.is_empty()
            && self.having.is_none()
    }

    /// Whether `column` was omitted, ignoring ASCII case.
    pub fn is_omitted(&self, column: &str) -> bool {
        self.omit.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    /// Whether `column` was explicitly selected, ignoring ASCII case.
    pub fn is_selected(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn is_must(&self, column: &str) -> bool {
        self.must_cols.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}
