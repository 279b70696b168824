//! Statement compilation.
//!
//! [`Compiler`] is a pure function of a [`Statement`], the bean's
//! [`TableMetadata`] and a [`Dialect`]: it produces SQL text plus the
//! positional arguments to bind. Quoting, placeholders and LIMIT syntax all
//! come from the dialect.
//!
//! WHERE clauses are assembled in a fixed order: explicit conditions, then
//! ID values, then conditions implied by non-zero bean fields, then the
//! soft-delete scope.

use crate::clause::group_by_sql;
use crate::cond::{Cond, bind_raw, quote_column};
use crate::statement::{SetExpr, Statement};
use sqlbean_core::{Bean, Column, Dialect, Error, PrimaryKey, Result, TableMetadata, Timestamp, Value};

/// Compiled SQL with its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Compiled {
    fn new(sql: String, args: Vec<Value>) -> Self {
        Self { sql, args }
    }
}

/// Compiles one statement against one table.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    dialect: Dialect,
    meta: &'a TableMetadata,
    stmt: &'a Statement,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: Dialect, meta: &'a TableMetadata, stmt: &'a Statement) -> Self {
        Self {
            dialect,
            meta,
            stmt,
        }
    }

    /// Table the statement targets.
    pub fn table_name(&self) -> &'a str {
        self.stmt.table.as_deref().unwrap_or(&self.meta.name)
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Prefix used for implicit column references in SELECTs that join or
    /// alias the table.
    fn qualifier(&self) -> Option<&'a str> {
        match &self.stmt.alias {
            Some(alias) => Some(alias.as_str()),
            None if !self.stmt.joins.is_empty() => Some(self.table_name()),
            None => None,
        }
    }

    fn column_ref(&self, name: &str, qualify: bool) -> String {
        match self.qualifier().filter(|_| qualify) {
            Some(q) => format!("{}.{}", q, name),
            None => name.to_string(),
        }
    }

    /// The "row is not soft-deleted" predicate, unless unscoped.
    fn soft_delete_cond(&self, qualify: bool) -> Option<Cond> {
        if self.stmt.unscoped {
            return None;
        }
        let col = self.meta.deleted_column()?;
        Some(not_deleted(col, self.column_ref(&col.name, qualify)))
    }

    /// Explicit, ID and bean-derived conditions (no soft-delete scope).
    fn base_cond(&self, bean: Option<&[Value]>, qualify: bool) -> Result<Option<Cond>> {
        let mut acc = self.stmt.cond.clone();

        if let Some(key) = &self.stmt.id {
            for (col, value) in self.meta.id_conditions(key)? {
                acc = Some(Cond::and_opt(acc, Cond::eq(self.column_ref(&col.name, qualify), value)));
            }
        }

        if let Some(values) = bean.filter(|_| !self.stmt.no_auto_condition) {
            for (col, value) in self.meta.columns.iter().zip(values) {
                if col.deleted || col.json || value.is_zero() {
                    continue;
                }
                acc = Some(Cond::and_opt(
                    acc,
                    Cond::eq(self.column_ref(&col.name, qualify), value.clone()),
                ));
            }
        }
        Ok(acc)
    }

    fn where_clause(
        &self,
        bean: Option<&[Value]>,
        qualify: bool,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let mut cond = self.base_cond(bean, qualify)?;
        if let Some(scope) = self.soft_delete_cond(qualify) {
            cond = Some(Cond::and_opt(cond, scope));
        }
        Ok(match cond {
            Some(c) => format!(" WHERE {}", c.build(self.dialect, params)),
            None => String::new(),
        })
    }

    fn from_clause(&self, params: &mut Vec<Value>) -> String {
        let mut sql = format!(" FROM {}", self.quote(self.table_name()));
        if let Some(alias) = &self.stmt.alias {
            sql.push_str(" AS ");
            sql.push_str(&self.quote(alias));
        }
        for join in &self.stmt.joins {
            sql.push_str(&join.build(self.dialect, params));
        }
        sql
    }

    fn grouping(&self, params: &mut Vec<Value>) -> String {
        let mut sql = String::new();
        if !self.stmt.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_by_sql(self.dialect, &self.stmt.group_by));
        }
        if let Some(having) = &self.stmt.having {
            sql.push_str(" HAVING ");
            sql.push_str(&having.build(self.dialect, params));
        }
        sql
    }

    fn ordering(&self) -> String {
        let mut sql = String::new();
        if !self.stmt.order_by.is_empty() {
            let terms: Vec<String> = self
                .stmt
                .order_by
                .iter()
                .map(|o| o.to_sql(self.dialect))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        sql.push_str(&self.dialect.limit_sql(self.stmt.limit, self.stmt.offset));
        sql
    }

    /// Projection for a bean SELECT.
    fn projection(&self) -> String {
        let cols: Vec<String> = if self.stmt.columns.is_empty() {
            self.meta
                .columns
                .iter()
                .filter(|c| !self.stmt.is_omitted(&c.name))
                .map(|c| quote_column(self.dialect, &self.column_ref(&c.name, true)))
                .collect()
        } else {
            self.stmt
                .columns
                .iter()
                .map(|c| quote_column(self.dialect, c))
                .collect()
        };
        if cols.is_empty() {
            "*".to_string()
        } else {
            cols.join(", ")
        }
    }

    fn select_with(
        &self,
        projection: &str,
        bean: Option<&[Value]>,
        with_ordering: bool,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if self.stmt.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(projection);
        sql.push_str(&self.from_clause(params));
        sql.push_str(&self.where_clause(bean, true, params)?);
        sql.push_str(&self.grouping(params));
        if with_ordering {
            sql.push_str(&self.ordering());
        }
        Ok(sql)
    }

    /// Wrap the raw SELECT as a derived table.
    fn wrap_raw(&self, projection: &str, suffix: &str) -> Option<Compiled> {
        let (raw, raw_args) = self.stmt.raw.as_ref()?;
        let mut params = Vec::new();
        let inner = bind_raw(self.dialect, raw, raw_args, &mut params);
        let sql = format!(
            "SELECT {} FROM ({}) {}{}",
            projection,
            inner,
            self.quote("sub"),
            suffix
        );
        Some(Compiled::new(sql, params))
    }

    /// SELECT for Find/Get. `bean` supplies implicit conditions.
    pub fn select(&self, bean: Option<&[Value]>) -> Result<Compiled> {
        if let Some((raw, raw_args)) = &self.stmt.raw {
            let mut params = Vec::new();
            let sql = bind_raw(self.dialect, raw, raw_args, &mut params);
            return Ok(Compiled::new(sql, params));
        }
        let mut params = Vec::new();
        let sql = self.select_with(&self.projection(), bean, true, &mut params)?;
        Ok(Compiled::new(sql, params))
    }

    /// `SELECT count(*)` over the same rows Find would return.
    pub fn count(&self, bean: Option<&[Value]>) -> Result<Compiled> {
        if let Some(c) = self.wrap_raw("count(*)", "") {
            return Ok(c);
        }
        let mut params = Vec::new();
        let grouped = self.stmt.distinct || !self.stmt.group_by.is_empty();
        let sql = if grouped {
            let projection = if self.stmt.columns.is_empty() && !self.stmt.group_by.is_empty() {
                group_by_sql(self.dialect, &self.stmt.group_by)
            } else {
                self.projection()
            };
            let inner = self.select_with(&projection, bean, false, &mut params)?;
            format!("SELECT count(*) FROM ({}) {}", inner, self.quote("sub"))
        } else {
            let mut sql = String::from("SELECT count(*)");
            sql.push_str(&self.from_clause(&mut params));
            sql.push_str(&self.where_clause(bean, true, &mut params)?);
            sql
        };
        Ok(Compiled::new(sql, params))
    }

    /// A `LIMIT 1` probe for Exist.
    pub fn exist(&self, bean: Option<&[Value]>) -> Result<Compiled> {
        let limit = self.dialect.limit_sql(Some(1), None);
        if let Some(c) = self.wrap_raw("1", &limit) {
            return Ok(c);
        }
        let mut params = Vec::new();
        let mut sql = self.select_with("1", bean, false, &mut params)?;
        sql.push_str(&limit);
        Ok(Compiled::new(sql, params))
    }

    /// `SUM` of each column, NULL sums reported as 0.
    pub fn sums(&self, columns: &[&str], bean: Option<&[Value]>) -> Result<Compiled> {
        if columns.is_empty() {
            return Err(Error::Custom("sum needs at least one column".to_string()));
        }
        let projection = columns
            .iter()
            .map(|c| format!("COALESCE(SUM({}), 0)", quote_column(self.dialect, c)))
            .collect::<Vec<_>>()
            .join(", ");
        if let Some(c) = self.wrap_raw(&projection, "") {
            return Ok(c);
        }
        let mut params = Vec::new();
        let mut sql = format!("SELECT {}", projection);
        sql.push_str(&self.from_clause(&mut params));
        sql.push_str(&self.where_clause(bean, true, &mut params)?);
        Ok(Compiled::new(sql, params))
    }

    /// Load one bean by primary key, used to refill the bean cache.
    pub fn get_by_pk(&self, key: &PrimaryKey) -> Result<Compiled> {
        let mut params = Vec::new();
        let mut cond = None;
        for (col, value) in self.meta.id_conditions(key)? {
            cond = Some(Cond::and_opt(cond, Cond::eq(col.name.clone(), value)));
        }
        let projection = self
            .meta
            .columns
            .iter()
            .map(|c| self.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {} FROM {}",
            projection,
            self.quote(self.table_name())
        );
        if let Some(c) = cond {
            sql.push_str(" WHERE ");
            sql.push_str(&c.build(self.dialect, &mut params));
        }
        Ok(Compiled::new(sql, params))
    }

    fn check_width(&self, values: &[Value]) -> Result<()> {
        if values.len() == self.meta.columns.len() {
            Ok(())
        } else {
            Err(Error::invalid_metadata(
                self.meta.struct_name,
                format!(
                    "expected {} column values, got {}",
                    self.meta.columns.len(),
                    values.len()
                ),
            ))
        }
    }

    fn insertable(&self, col: &Column, all_zero: bool) -> bool {
        if self.stmt.is_omitted(&col.name) {
            return false;
        }
        if !self.stmt.columns.is_empty() && !self.stmt.is_selected(&col.name) && !col.primary_key {
            return false;
        }
        // Zero generated keys and zero defaulted columns are left to the database.
        !(all_zero && (col.auto_increment || col.default.is_some()))
    }

    /// INSERT for one bean's column values (already stamped).
    pub fn insert(&self, values: &[Value]) -> Result<Compiled> {
        self.check_width(values)?;
        let mut names = Vec::new();
        let mut params = Vec::new();
        for (col, value) in self.meta.columns.iter().zip(values) {
            if !self.insertable(col, value.is_zero()) {
                continue;
            }
            names.push(self.quote(&col.name));
            params.push(insert_value(col, value));
        }

        let table = self.quote(self.table_name());
        let sql = if names.is_empty() {
            match self.dialect {
                Dialect::Mysql => format!("INSERT INTO {} () VALUES ()", table),
                Dialect::Sqlite | Dialect::Postgres => {
                    format!("INSERT INTO {} DEFAULT VALUES", table)
                }
            }
        } else {
            let marks: Vec<String> = (1..=params.len()).map(|i| self.dialect.placeholder(i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                names.join(", "),
                marks.join(", ")
            )
        };
        Ok(Compiled::new(sql, params))
    }

    /// One multi-row INSERT. A column is left out only when it would be
    /// left out for every row.
    pub fn insert_multi(&self, rows: &[Vec<Value>]) -> Result<Compiled> {
        if rows.is_empty() {
            return Err(Error::Custom("insert_multi needs at least one bean".to_string()));
        }
        for row in rows {
            self.check_width(row)?;
        }
        let included: Vec<usize> = self
            .meta
            .columns
            .iter()
            .enumerate()
            .filter(|(i, col)| {
                let all_zero = rows.iter().all(|r| r[*i].is_zero());
                self.insertable(col, all_zero)
            })
            .map(|(i, _)| i)
            .collect();
        if included.is_empty() {
            return Err(Error::Custom(format!(
                "no insertable columns for multi-row insert into '{}'",
                self.table_name()
            )));
        }

        let names: Vec<String> = included
            .iter()
            .map(|&i| self.quote(&self.meta.columns[i].name))
            .collect();
        let mut params = Vec::with_capacity(rows.len() * included.len());
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mut marks = Vec::with_capacity(included.len());
            for &i in &included {
                params.push(insert_value(&self.meta.columns[i], &row[i]));
                marks.push(self.dialect.placeholder(params.len()));
            }
            tuples.push(format!("({})", marks.join(", ")));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote(self.table_name()),
            names.join(", "),
            tuples.join(", ")
        );
        Ok(Compiled::new(sql, params))
    }

    /// UPDATE from a bean's column values (already stamped).
    ///
    /// The SET list takes non-zero fields, or the `cols`/`all_cols`/
    /// `must_cols` selection, plus update expressions. Keys, the created and
    /// deleted columns are never written. A version column turns into
    /// `version = version + 1` guarded by the in-memory version; update
    /// expressions may not target it.
    pub fn update(&self, values: &[Value]) -> Result<Compiled> {
        self.check_width(values)?;
        let mut params = Vec::new();
        let mut sets = Vec::new();

        for (col, value) in self.meta.columns.iter().zip(values) {
            if col.primary_key || col.created || col.deleted || col.version {
                continue;
            }
            if self.stmt.is_omitted(&col.name)
                || self
                    .stmt
                    .set_exprs
                    .iter()
                    .any(|e| e.column().eq_ignore_ascii_case(&col.name))
            {
                continue;
            }
            let wanted = if col.updated {
                true
            } else if !self.stmt.columns.is_empty() {
                self.stmt.is_selected(&col.name)
            } else {
                self.stmt.all_cols || self.stmt.is_must(&col.name) || !value.is_zero()
            };
            if !wanted {
                continue;
            }
            params.push(value.clone());
            sets.push(format!(
                "{} = {}",
                self.quote(&col.name),
                self.dialect.placeholder(params.len())
            ));
        }

        for expr in &self.stmt.set_exprs {
            let col = quote_column(self.dialect, expr.column());
            match expr {
                SetExpr::Incr(_, by) | SetExpr::Decr(_, by) => {
                    let op = if matches!(expr, SetExpr::Incr(..)) { '+' } else { '-' };
                    params.push(by.clone());
                    sets.push(format!(
                        "{} = {} {} {}",
                        col,
                        col,
                        op,
                        self.dialect.placeholder(params.len())
                    ));
                }
                SetExpr::Expr(_, raw) => sets.push(format!("{} = {}", col, raw)),
            }
        }

        let version = self.meta.version.map(|i| (&self.meta.columns[i], &values[i]));
        if let Some((col, _)) = version {
            if self
                .stmt
                .set_exprs
                .iter()
                .any(|e| e.column().eq_ignore_ascii_case(&col.name))
            {
                return Err(Error::Custom(format!(
                    "version column '{}' is advanced automatically and cannot be set",
                    col.name
                )));
            }
        }
        if sets.is_empty() {
            return Err(Error::Custom(format!(
                "no columns to update in '{}'",
                self.table_name()
            )));
        }
        if let Some((col, _)) = version {
            let quoted = self.quote(&col.name);
            sets.push(format!("{} = {} + 1", quoted, quoted));
        }

        let mut cond = self.base_cond(None, false)?;
        if let Some(scope) = self.soft_delete_cond(false) {
            cond = Some(Cond::and_opt(cond, scope));
        }
        if let Some((col, current)) = version {
            cond = Some(Cond::and_opt(cond, Cond::eq(col.name.clone(), current.clone())));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quote(self.table_name()),
            sets.join(", ")
        );
        if let Some(c) = cond {
            sql.push_str(" WHERE ");
            sql.push_str(&c.build(self.dialect, &mut params));
        }
        Ok(Compiled::new(sql, params))
    }

    /// DELETE, or a soft-delete UPDATE when the table has a deleted column
    /// and the statement is scoped. Refuses to run without any condition.
    pub fn delete(&self, bean: Option<&[Value]>) -> Result<Compiled> {
        let Some(cond) = self.base_cond(bean, false)? else {
            return Err(Error::MissingCondition(self.table_name().to_string()));
        };
        let table = self.quote(self.table_name());
        let mut params = Vec::new();

        let sql = match self.meta.deleted_column().filter(|_| !self.stmt.unscoped) {
            Some(col) => {
                params.push(col.now_value());
                let set = format!(
                    "UPDATE {} SET {} = {}",
                    table,
                    self.quote(&col.name),
                    self.dialect.placeholder(1)
                );
                let scoped = cond.and(not_deleted(col, col.name.clone()));
                format!("{} WHERE {}", set, scoped.build(self.dialect, &mut params))
            }
            None => format!("DELETE FROM {} WHERE {}", table, cond.build(self.dialect, &mut params)),
        };
        Ok(Compiled::new(sql, params))
    }
}

/// `col IS NULL`, or `(col IS NULL OR col = 0)` for integer markers.
fn not_deleted(col: &Column, reference: String) -> Cond {
    if col.sql_type.is_integer() {
        Cond::is_null(reference.clone()).or(Cond::eq(reference, 0_i64))
    } else {
        Cond::is_null(reference)
    }
}

/// Zero soft-delete markers are stored as NULL.
fn insert_value(col: &Column, value: &Value) -> Value {
    if col.deleted && value.is_zero() {
        Value::Null
    } else {
        value.clone()
    }
}

/// Stamp created/updated with now and the version with 1, then read the
/// bean's column values for an INSERT.
pub fn prepare_insert<T: Bean>(meta: &TableMetadata, bean: &mut T) -> Result<Vec<Value>> {
    let now = Timestamp::now();
    for col in [meta.created_column(), meta.updated_column()].into_iter().flatten() {
        bean.set_field_value(col.field_index, &col.time_value(now))?;
    }
    if let Some(col) = meta.version_column() {
        bean.set_field_value(col.field_index, &Value::BigInt(1))?;
    }
    meta.values_of(bean)
}

/// Stamp the updated column with now, then read the bean's column values
/// for an UPDATE.
pub fn prepare_update<T: Bean>(meta: &TableMetadata, bean: &mut T) -> Result<Vec<Value>> {
    if let Some(col) = meta.updated_column() {
        bean.set_field_value(col.field_index, &col.now_value())?;
    }
    meta.values_of(bean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinType;
    use sqlbean_core::{FieldInfo, SnakeMapper, SqlType};

    static USER_FIELDS: [FieldInfo; 6] = [
        FieldInfo::new("id", Some(SqlType::BigInt))
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("name", Some(SqlType::VarChar(64))),
        FieldInfo::new("age", Some(SqlType::Integer)),
        FieldInfo::new("status", Some(SqlType::Integer)).default_value("1"),
        FieldInfo::new("ver", Some(SqlType::Integer)).version(true),
        FieldInfo::new("deleted_at", Some(SqlType::DateTime))
            .nullable(true)
            .deleted(true),
    ];

    static PLAIN_FIELDS: [FieldInfo; 2] = [
        FieldInfo::new("id", Some(SqlType::BigInt)).primary_key(true),
        FieldInfo::new("note", Some(SqlType::Text)),
    ];

    fn users() -> TableMetadata {
        TableMetadata::build("User", None, &USER_FIELDS, &[], true, &SnakeMapper).unwrap()
    }

    fn plain() -> TableMetadata {
        TableMetadata::build("Note", None, &PLAIN_FIELDS, &[], true, &SnakeMapper).unwrap()
    }

    fn row(id: i64, name: &str, age: i32, ver: i32) -> Vec<Value> {
        vec![
            Value::BigInt(id),
            Value::Text(name.to_string()),
            Value::Int(age),
            Value::Int(0),
            Value::Int(ver),
            Value::Null,
        ]
    }

    #[test]
    fn test_select_with_soft_delete_scope() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.and(Cond::gt("age", 18)).desc(&["id"]).limit(10, Some(20));
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).select(None).unwrap();
        assert_eq!(
            c.sql,
            "SELECT \"id\", \"name\", \"age\", \"status\", \"ver\", \"deleted_at\" FROM \"user\" \
             WHERE \"age\" > ?1 AND \"deleted_at\" IS NULL ORDER BY \"id\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(c.args, vec![Value::Int(18)]);
    }

    #[test]
    fn test_unscoped_select_has_no_scope() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.unscoped();
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).count(None).unwrap();
        assert_eq!(c.sql, "SELECT count(*) FROM \"user\"");
    }

    #[test]
    fn test_where_order_explicit_id_bean() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.and(Cond::eq("name", "x")).id(PrimaryKey::single(7_i64));
        let bean = row(0, "", 30, 0);
        let c = Compiler::new(Dialect::Postgres, &meta, &stmt)
            .select(Some(&bean))
            .unwrap();
        assert!(c.sql.ends_with(
            "WHERE \"name\" = $1 AND \"id\" = $2 AND \"age\" = $3 AND \"deleted_at\" IS NULL"
        ));
        assert_eq!(c.args, vec![Value::Text("x".into()), Value::BigInt(7), Value::Int(30)]);
    }

    #[test]
    fn test_no_auto_condition_ignores_bean() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.and(Cond::eq("name", "x")).no_auto_condition();
        let bean = row(0, "y", 0, 0);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt)
            .select(Some(&bean))
            .unwrap();
        assert_eq!(c.args, vec![Value::Text("x".into())]);
    }

    #[test]
    fn test_top_level_or_is_grouped_before_scope() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.and(Cond::eq("age", 1)).or(Cond::eq("age", 2));
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).select(None).unwrap();
        assert!(c.sql.contains("WHERE (\"age\" = ?1 OR \"age\" = ?2) AND \"deleted_at\" IS NULL"));
    }

    #[test]
    fn test_joined_select_qualifies_columns() {
        let meta = plain();
        let mut stmt = Statement::new();
        stmt.alias("n")
            .join(JoinType::Left, "tag", "tag.note_id = n.id AND tag.kind = ?", vec![Value::Int(3)])
            .and(Cond::eq("tag.name", "x"));
        let c = Compiler::new(Dialect::Mysql, &meta, &stmt).select(None).unwrap();
        assert_eq!(
            c.sql,
            "SELECT `n`.`id`, `n`.`note` FROM `note` AS `n` LEFT JOIN `tag` \
             ON tag.note_id = n.id AND tag.kind = ? WHERE `tag`.`name` = ?"
        );
        assert_eq!(c.args, vec![Value::Int(3), Value::Text("x".into())]);
    }

    #[test]
    fn test_count_distinct_wraps() {
        let meta = plain();
        let mut stmt = Statement::new();
        stmt.distinct(&["note"]);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).count(None).unwrap();
        assert_eq!(
            c.sql,
            "SELECT count(*) FROM (SELECT DISTINCT \"note\" FROM \"note\") \"sub\""
        );
    }

    #[test]
    fn test_exist_and_sums() {
        let meta = plain();
        let stmt = Statement::new();
        let compiler = Compiler::new(Dialect::Sqlite, &meta, &stmt);
        assert_eq!(compiler.exist(None).unwrap().sql, "SELECT 1 FROM \"note\" LIMIT 1");
        assert_eq!(
            compiler.sums(&["id"], None).unwrap().sql,
            "SELECT COALESCE(SUM(\"id\"), 0) FROM \"note\""
        );
        assert!(compiler.sums(&[], None).is_err());
    }

    #[test]
    fn test_raw_sql_wrapping() {
        let meta = plain();
        let mut stmt = Statement::new();
        stmt.sql("select * from note where id > ?", vec![Value::Int(1)]);
        let compiler = Compiler::new(Dialect::Postgres, &meta, &stmt);
        assert_eq!(compiler.select(None).unwrap().sql, "select * from note where id > $1");
        assert_eq!(
            compiler.exist(None).unwrap().sql,
            "SELECT 1 FROM (select * from note where id > $1) \"sub\" LIMIT 1"
        );
    }

    #[test]
    fn test_insert_skips_zero_autoincr_and_defaults() {
        let meta = users();
        let stmt = Statement::new();
        let values = row(0, "amy", 0, 1);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).insert(&values).unwrap();
        assert_eq!(
            c.sql,
            "INSERT INTO \"user\" (\"name\", \"age\", \"ver\", \"deleted_at\") VALUES (?1, ?2, ?3, ?4)"
        );
        assert_eq!(c.args[3], Value::Null);
    }

    #[test]
    fn test_insert_multi_keeps_shared_column_set() {
        let meta = users();
        let stmt = Statement::new();
        let mut second = row(0, "bo", 2, 1);
        second[3] = Value::Int(5);
        let rows = vec![row(0, "amy", 1, 1), second];
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt)
            .insert_multi(&rows)
            .unwrap();
        assert!(c.sql.contains("(\"name\", \"age\", \"status\", \"ver\", \"deleted_at\")"));
        assert!(c.sql.ends_with("VALUES (?1, ?2, ?3, ?4, ?5), (?6, ?7, ?8, ?9, ?10)"));
        assert_eq!(c.args.len(), 10);
    }

    #[test]
    fn test_update_with_version_guard() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.id(PrimaryKey::single(3_i64));
        let values = row(3, "zed", 0, 4);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).update(&values).unwrap();
        assert_eq!(
            c.sql,
            "UPDATE \"user\" SET \"name\" = ?1, \"ver\" = \"ver\" + 1 \
             WHERE \"id\" = ?2 AND \"deleted_at\" IS NULL AND \"ver\" = ?3"
        );
        assert_eq!(c.args, vec![Value::Text("zed".into()), Value::BigInt(3), Value::Int(4)]);
    }

    #[test]
    fn test_update_column_selection_and_exprs() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.must_cols(&["age"]).incr("status", 2).unscoped();
        let values = row(1, "", 0, 1);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).update(&values).unwrap();
        assert_eq!(
            c.sql,
            "UPDATE \"user\" SET \"age\" = ?1, \"status\" = \"status\" + ?2, \"ver\" = \"ver\" + 1 \
             WHERE \"ver\" = ?3"
        );

        let mut stmt = Statement::new();
        stmt.id(PrimaryKey::single(1_i64)).incr("age", 1);
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt)
            .update(&row(0, "", 0, 0))
            .unwrap();
        assert!(
            c.sql.ends_with("WHERE \"id\" = ?2 AND \"deleted_at\" IS NULL AND \"ver\" = ?3"),
            "{}",
            c.sql
        );
        assert_eq!(c.args[2], Value::Int(0));

        let mut stmt = Statement::new();
        stmt.id(PrimaryKey::single(1_i64)).incr("VER", 4);
        let err = Compiler::new(Dialect::Sqlite, &meta, &stmt)
            .update(&values)
            .unwrap_err();
        assert!(err.to_string().contains("ver"), "{err}");

        let mut stmt = Statement::new();
        stmt.cols(&["name"]).set_expr("age", "age * 2");
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).update(&values).unwrap();
        assert!(c.sql.starts_with("UPDATE \"user\" SET \"name\" = ?1, \"age\" = age * 2"));
    }

    #[test]
    fn test_update_with_nothing_to_set_fails() {
        let meta = plain();
        let stmt = Statement::new();
        let values = vec![Value::BigInt(1), Value::Text(String::new())];
        assert!(Compiler::new(Dialect::Sqlite, &meta, &stmt).update(&values).is_err());
    }

    #[test]
    fn test_delete_soft_and_physical() {
        let meta = users();
        let mut stmt = Statement::new();
        stmt.id(PrimaryKey::single(1_i64));
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).delete(None).unwrap();
        assert_eq!(
            c.sql,
            "UPDATE \"user\" SET \"deleted_at\" = ?1 WHERE \"id\" = ?2 AND \"deleted_at\" IS NULL"
        );
        assert!(matches!(c.args[0], Value::Timestamp(_)));

        stmt.unscoped();
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).delete(None).unwrap();
        assert_eq!(c.sql, "DELETE FROM \"user\" WHERE \"id\" = ?1");
    }

    #[test]
    fn test_delete_without_condition_refused() {
        let meta = plain();
        let stmt = Statement::new();
        let err = Compiler::new(Dialect::Sqlite, &meta, &stmt).delete(None).unwrap_err();
        assert!(matches!(err, Error::MissingCondition(_)));

        let zero_bean = vec![Value::BigInt(0), Value::Text(String::new())];
        assert!(Compiler::new(Dialect::Sqlite, &meta, &stmt).delete(Some(&zero_bean)).is_err());
    }

    #[test]
    fn test_integer_soft_delete_marker() {
        static FIELDS: [FieldInfo; 2] = [
            FieldInfo::new("id", Some(SqlType::BigInt)).primary_key(true),
            FieldInfo::new("removed", Some(SqlType::BigInt)).deleted(true),
        ];
        let meta = TableMetadata::build("Item", None, &FIELDS, &[], true, &SnakeMapper).unwrap();
        let stmt = Statement::new();
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt).select(None).unwrap();
        assert!(c.sql.ends_with("WHERE \"removed\" IS NULL OR \"removed\" = ?1"));
    }

    #[test]
    fn test_get_by_pk() {
        let meta = plain();
        let stmt = Statement::new();
        let c = Compiler::new(Dialect::Sqlite, &meta, &stmt)
            .get_by_pk(&PrimaryKey::single(9_i64))
            .unwrap();
        assert_eq!(c.sql, "SELECT \"id\", \"note\" FROM \"note\" WHERE \"id\" = ?1");
    }

    #[test]
    fn test_composite_id_width_mismatch() {
        let meta = plain();
        let mut stmt = Statement::new();
        stmt.id(PrimaryKey::new(vec![Value::Int(1), Value::Int(2)]));
        assert!(Compiler::new(Dialect::Sqlite, &meta, &stmt).select(None).is_err());
    }
}
