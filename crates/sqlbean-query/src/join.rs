//! JOIN clause types.

use crate::cond::bind_raw;
use sqlbean_core::{Dialect, Value};

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }

    /// Parse an operator as written by callers (`"INNER"`, `"left"`, ...).
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_uppercase().as_str() {
            "INNER" | "INNER JOIN" | "JOIN" => Some(JoinType::Inner),
            "LEFT" | "LEFT JOIN" | "LEFT OUTER" => Some(JoinType::Left),
            "RIGHT" | "RIGHT JOIN" | "RIGHT OUTER" => Some(JoinType::Right),
            "CROSS" | "CROSS JOIN" => Some(JoinType::Cross),
            _ => None,
        }
    }
}

/// A JOIN clause: operator, target table and raw ON predicate with args.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub alias: Option<String>,
    /// ON predicate with `?` placeholders; ignored for CROSS joins
    pub on: String,
    pub args: Vec<Value>,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            alias: None,
            on: on.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Generate SQL for this join, appending ON arguments to `params`.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let mut sql = format!(
            " {} {}",
            self.join_type.as_str(),
            dialect.quote_identifier(&self.table)
        );
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        if self.join_type != JoinType::Cross {
            sql.push_str(" ON ");
            sql.push_str(&bind_raw(dialect, &self.on, &self.args, params));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_build() {
        let join = Join::new(JoinType::Left, "team", "team.id = user.team_id AND team.active = ?")
            .alias("t")
            .args(vec![Value::Bool(true)]);
        let mut params = vec![Value::Int(1)];
        let sql = join.build(Dialect::Sqlite, &mut params);
        assert_eq!(
            sql,
            " LEFT JOIN \"team\" AS \"t\" ON team.id = user.team_id AND team.active = ?2"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_cross_join_has_no_on() {
        let join = Join::new(JoinType::Cross, "dates", "ignored");
        let sql = join.build(Dialect::Mysql, &mut Vec::new());
        assert_eq!(sql, " CROSS JOIN `dates`");
    }

    #[test]
    fn test_parse_operator() {
        assert_eq!(JoinType::parse("inner"), Some(JoinType::Inner));
        assert_eq!(JoinType::parse("LEFT"), Some(JoinType::Left));
        assert_eq!(JoinType::parse("outer apply"), None);
    }
}
