//! Condition trees for WHERE and ON clauses.
//!
//! A [`Cond`] is an immutable tree: leaves are column predicates or raw
//! fragments, branches combine two subtrees with AND/OR (or negate one).
//! Chaining shares subtrees by `Arc` instead of copying them.

use sqlbean_core::{Dialect, Value};
use std::sync::Arc;

/// A boolean SQL condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(String, Value),
    Neq(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    /// `col LIKE pattern`
    Like(String, String),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Between(String, Value, Value),
    IsNull(String),
    NotNull(String),
    /// Raw fragment; each `?` outside quotes binds the next argument.
    Expr(String, Vec<Value>),
    And(Arc<Cond>, Arc<Cond>),
    Or(Arc<Cond>, Arc<Cond>),
    Not(Arc<Cond>),
}

impl Cond {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Neq(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Lt(column.into(), value.into())
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Lte(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Gt(column.into(), value.into())
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Gte(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Cond::Like(column.into(), pattern.into())
    }

    pub fn in_<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Cond::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Cond::NotIn(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Cond::Between(column.into(), low.into(), high.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Cond::IsNull(column.into())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Cond::NotNull(column.into())
    }

    /// A raw SQL fragment with `?` placeholders.
    pub fn expr(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Cond::Expr(sql.into(), args)
    }

    /// Combine with AND.
    #[must_use]
    pub fn and(self, other: Cond) -> Self {
        Cond::And(Arc::new(self), Arc::new(other))
    }

    /// Combine with OR.
    #[must_use]
    pub fn or(self, other: Cond) -> Self {
        Cond::Or(Arc::new(self), Arc::new(other))
    }

    /// Negate.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(self) -> Self {
        Cond::Not(Arc::new(self))
    }

    /// AND together an optional running tree and a new term.
    pub fn and_opt(acc: Option<Cond>, next: Cond) -> Cond {
        match acc {
            Some(c) => c.and(next),
            None => next,
        }
    }

    /// Render into SQL, appending bound values to `params`.
    ///
    /// Placeholders are numbered from `params.len() + 1`, so several
    /// fragments can share one argument list.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let mut out = String::new();
        self.write(dialect, params, &mut out);
        out
    }

    fn write(&self, dialect: Dialect, params: &mut Vec<Value>, out: &mut String) {
        match self {
            Cond::Eq(c, v) => write_binary(dialect, c, "=", v, params, out),
            Cond::Neq(c, v) => write_binary(dialect, c, "<>", v, params, out),
            Cond::Lt(c, v) => write_binary(dialect, c, "<", v, params, out),
            Cond::Lte(c, v) => write_binary(dialect, c, "<=", v, params, out),
            Cond::Gt(c, v) => write_binary(dialect, c, ">", v, params, out),
            Cond::Gte(c, v) => write_binary(dialect, c, ">=", v, params, out),
            Cond::Like(c, pattern) => {
                write_binary(dialect, c, "LIKE", &Value::Text(pattern.clone()), params, out);
            }
            Cond::In(c, values) | Cond::NotIn(c, values) => {
                let negated = matches!(self, Cond::NotIn(..));
                if values.is_empty() {
                    // Empty IN matches nothing; empty NOT IN matches everything
                    out.push_str(if negated { "0=0" } else { "0=1" });
                    return;
                }
                out.push_str(&quote_column(dialect, c));
                out.push_str(if negated { " NOT IN (" } else { " IN (" });
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    params.push(v.clone());
                    out.push_str(&dialect.placeholder(params.len()));
                }
                out.push(')');
            }
            Cond::Between(c, low, high) => {
                out.push_str(&quote_column(dialect, c));
                params.push(low.clone());
                out.push_str(" BETWEEN ");
                out.push_str(&dialect.placeholder(params.len()));
                params.push(high.clone());
                out.push_str(" AND ");
                out.push_str(&dialect.placeholder(params.len()));
            }
            Cond::IsNull(c) => {
                out.push_str(&quote_column(dialect, c));
                out.push_str(" IS NULL");
            }
            Cond::NotNull(c) => {
                out.push_str(&quote_column(dialect, c));
                out.push_str(" IS NOT NULL");
            }
            Cond::Expr(sql, args) => out.push_str(&bind_raw(dialect, sql, args, params)),
            Cond::And(l, r) => {
                write_operand(l, dialect, params, out, |c| matches!(c, Cond::Or(..) | Cond::Expr(..)));
                out.push_str(" AND ");
                write_operand(r, dialect, params, out, |c| matches!(c, Cond::Or(..) | Cond::Expr(..)));
            }
            Cond::Or(l, r) => {
                write_operand(l, dialect, params, out, |c| matches!(c, Cond::And(..) | Cond::Expr(..)));
                out.push_str(" OR ");
                write_operand(r, dialect, params, out, |c| matches!(c, Cond::And(..) | Cond::Expr(..)));
            }
            Cond::Not(inner) => {
                out.push_str("NOT (");
                inner.write(dialect, params, out);
                out.push(')');
            }
        }
    }
}

fn write_binary(
    dialect: Dialect,
    column: &str,
    op: &str,
    value: &Value,
    params: &mut Vec<Value>,
    out: &mut String,
) {
    if value.is_null() && matches!(op, "=" | "<>") {
        out.push_str(&quote_column(dialect, column));
        out.push_str(if op == "=" { " IS NULL" } else { " IS NOT NULL" });
        return;
    }
    params.push(value.clone());
    out.push_str(&quote_column(dialect, column));
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    out.push_str(&dialect.placeholder(params.len()));
}

fn write_operand(
    cond: &Cond,
    dialect: Dialect,
    params: &mut Vec<Value>,
    out: &mut String,
    needs_parens: impl Fn(&Cond) -> bool,
) {
    if needs_parens(cond) {
        out.push('(');
        cond.write(dialect, params, out);
        out.push(')');
    } else {
        cond.write(dialect, params, out);
    }
}

/// Quote a column reference when it is a plain (optionally qualified)
/// identifier; expressions such as `count(*)` pass through untouched.
pub fn quote_column(dialect: Dialect, column: &str) -> String {
    let plain = !column.is_empty()
        && column
            .split('.')
            .all(|part| part == "*" || is_identifier(part));
    if plain {
        dialect.quote_qualified(column)
    } else {
        column.to_string()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Rewrite `?` in a raw fragment to dialect placeholders, binding `args`
/// in order. Question marks inside single-quoted literals are left alone.
/// Surplus `?` with no argument left are kept verbatim.
pub fn bind_raw(dialect: Dialect, sql: &str, args: &[Value], params: &mut Vec<Value>) -> String {
    let mut out = String::with_capacity(sql.len() + args.len() * 2);
    let mut remaining = args.iter();
    let mut in_quote = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                out.push(ch);
            }
            '?' if !in_quote => match remaining.next() {
                Some(v) => {
                    params.push(v.clone());
                    out.push_str(&dialect.placeholder(params.len()));
                }
                None => out.push('?'),
            },
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(cond: &Cond, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = cond.build(dialect, &mut params);
        (sql, params)
    }

    #[test]
    fn test_leaf_predicates() {
        let (sql, params) = render(&Cond::eq("name", "bob"), Dialect::Sqlite);
        assert_eq!(sql, "\"name\" = ?1");
        assert_eq!(params, vec![Value::Text("bob".into())]);

        let (sql, _) = render(&Cond::between("age", 1, 9), Dialect::Postgres);
        assert_eq!(sql, "\"age\" BETWEEN $1 AND $2");

        let (sql, params) = render(&Cond::eq("deleted", Value::Null), Dialect::Sqlite);
        assert_eq!(sql, "\"deleted\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_lists() {
        let (sql, params) = render(&Cond::in_("id", [1_i64, 2, 3]), Dialect::Mysql);
        assert_eq!(sql, "`id` IN (?, ?, ?)");
        assert_eq!(params.len(), 3);

        let empty: Vec<i64> = Vec::new();
        assert_eq!(render(&Cond::in_("id", empty.clone()), Dialect::Sqlite).0, "0=1");
        assert_eq!(render(&Cond::not_in("id", empty), Dialect::Sqlite).0, "0=0");
    }

    #[test]
    fn test_combinators_parenthesize() {
        let cond = Cond::eq("a", 1).or(Cond::eq("b", 2)).and(Cond::eq("c", 3));
        let (sql, params) = render(&cond, Dialect::Sqlite);
        assert_eq!(sql, "(\"a\" = ?1 OR \"b\" = ?2) AND \"c\" = ?3");
        assert_eq!(params.len(), 3);

        let cond = Cond::eq("a", 1).and(Cond::eq("b", 2)).or(Cond::eq("c", 3)).not();
        let (sql, _) = render(&cond, Dialect::Sqlite);
        assert_eq!(sql, "NOT ((\"a\" = ?1 AND \"b\" = ?2) OR \"c\" = ?3)");
    }

    #[test]
    fn test_raw_fragments_renumber() {
        let mut params = vec![Value::Int(0)];
        let sql = Cond::expr("age > ? AND note <> '?'", vec![Value::Int(18)])
            .build(Dialect::Sqlite, &mut params);
        assert_eq!(sql, "age > ?2 AND note <> '?'");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_quote_column() {
        assert_eq!(quote_column(Dialect::Sqlite, "u.name"), "\"u\".\"name\"");
        assert_eq!(quote_column(Dialect::Sqlite, "count(*)"), "count(*)");
    }

    #[test]
    fn test_shared_subtrees() {
        let base = Cond::eq("a", 1);
        let left = base.clone().and(Cond::eq("b", 2));
        let right = base.or(Cond::eq("c", 3));
        assert_ne!(left, right);
    }
}
