//! Live catalog introspection.
//!
//! Reads tables, columns and indexes back from SQLite, PostgreSQL or MySQL
//! so the synchronizer can diff them against reflected bean metadata.

use regex::Regex;
use sqlbean_core::{Cx, Dialect, Error, Executor, Outcome, Row, Value, try_outcome};
use std::sync::LazyLock;

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*(UNSIGNED)?\s*(\[\])?$")
        .expect("type pattern is a valid regex")
});

/// Parsed SQL type with extracted metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSqlType {
    /// Canonical base type name (e.g., VARCHAR, INTEGER, DECIMAL)
    pub base_type: String,
    /// Length for character types (e.g., VARCHAR(255) -> 255)
    pub length: Option<u32>,
    /// Precision for numeric types (e.g., DECIMAL(10,2) -> 10)
    pub precision: Option<u32>,
    /// Scale for numeric types (e.g., DECIMAL(10,2) -> 2)
    pub scale: Option<u32>,
    /// MySQL `UNSIGNED`
    pub unsigned: bool,
    /// PostgreSQL `[]`
    pub array: bool,
}

impl ParsedSqlType {
    /// Parse a SQL type string into structured metadata.
    ///
    /// Aliases collapse to one spelling so types reported by different
    /// catalogs compare equal: `INT`/`INT4` -> `INTEGER`,
    /// `CHARACTER VARYING` -> `VARCHAR`, `TIMESTAMP WITHOUT TIME ZONE` ->
    /// `TIMESTAMP`, and so on. Unparseable input keeps the raw text as its
    /// base type.
    pub fn parse(type_str: &str) -> Self {
        let upper = type_str.trim().to_uppercase();
        let Some(caps) = TYPE_RE.captures(&upper) else {
            return Self {
                base_type: upper,
                ..Self::default()
            };
        };

        let base_type = canonical_base(caps.get(1).map_or("", |m| m.as_str().trim()));
        let first = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let second = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let (length, precision, scale) = if second.is_some() {
            (None, first, second)
        } else if matches!(base_type.as_str(), "DECIMAL" | "NUMERIC") {
            (None, first, None)
        } else {
            (first, None, None)
        };

        Self {
            base_type,
            length,
            precision,
            scale,
            unsigned: caps.get(4).is_some(),
            array: caps.get(5).is_some(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self.base_type.as_str(),
            "VARCHAR" | "CHAR" | "TEXT" | "CLOB" | "NVARCHAR" | "NCHAR" | "NTEXT"
        )
    }

    /// `CHAR(n)`/`VARCHAR(n)`: a string type with a length bound.
    pub fn is_bounded_text(&self) -> bool {
        matches!(self.base_type.as_str(), "VARCHAR" | "CHAR" | "NVARCHAR" | "NCHAR")
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.base_type.as_str(),
            "INTEGER"
                | "BIGINT"
                | "SMALLINT"
                | "TINYINT"
                | "MEDIUMINT"
                | "DECIMAL"
                | "NUMERIC"
                | "REAL"
                | "DOUBLE"
        )
    }

    pub fn is_datetime(&self) -> bool {
        matches!(
            self.base_type.as_str(),
            "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" | "TIMETZ"
        )
    }

    /// Same type for sync purposes.
    ///
    /// Lengths only matter for bounded strings and precision/scale only for
    /// decimals; display widths like MySQL's `INT(11)` are ignored.
    pub fn same_as(&self, other: &ParsedSqlType) -> bool {
        if self.base_type != other.base_type || self.array != other.array {
            return false;
        }
        if self.is_bounded_text() && self.length.is_some() && other.length.is_some() {
            return self.length == other.length;
        }
        if matches!(self.base_type.as_str(), "DECIMAL" | "NUMERIC")
            && self.precision.is_some()
            && other.precision.is_some()
        {
            return self.precision == other.precision && self.scale == other.scale;
        }
        true
    }

    /// Whether moving from `self` (live) to `target` only widens a string.
    pub fn widens_to(&self, target: &ParsedSqlType) -> bool {
        if !self.is_bounded_text() {
            return false;
        }
        if target.base_type == "TEXT" {
            return true;
        }
        target.base_type == self.base_type
            && matches!((self.length, target.length), (Some(live), Some(want)) if want > live)
    }
}

fn canonical_base(base: &str) -> String {
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
    let canonical = match base.as_str() {
        "INT" | "INT4" | "SERIAL" | "SERIAL4" => "INTEGER",
        "INT8" | "BIGSERIAL" | "SERIAL8" => "BIGINT",
        "INT2" => "SMALLINT",
        "BOOL" => "BOOLEAN",
        "CHARACTER VARYING" => "VARCHAR",
        "CHARACTER" => "CHAR",
        "DOUBLE PRECISION" | "FLOAT8" => "DOUBLE",
        "FLOAT4" | "FLOAT" => "REAL",
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
        "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ",
        "TIME WITHOUT TIME ZONE" => "TIME",
        "BYTEA" => "BLOB",
        other => other,
    };
    canonical.to_string()
}

/// A column as the database reports it.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    /// SQL type as raw string
    pub sql_type: String,
    pub parsed_type: ParsedSqlType,
    pub nullable: bool,
    /// Default value expression
    pub default: Option<String>,
    pub primary_key: bool,
    pub auto_increment: bool,
}

/// An index as the database reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    /// Indexed columns in key order
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A live table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    /// Secondary indexes; primary-key and constraint-backed indexes are left out
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    /// Column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_auto_pk(&self) -> bool {
        self.primary_key.len() == 1
            && self
                .column(&self.primary_key[0])
                .is_some_and(|c| c.auto_increment)
    }
}

/// Every table of a database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSchema {
    pub dialect: Dialect,
    /// Tables in catalog name order
    pub tables: Vec<TableInfo>,
}

impl DatabaseSchema {
    /// Table by name, case-insensitively.
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Reads catalog metadata through an [`Executor`].
#[derive(Debug, Clone, Copy)]
pub struct Introspector {
    dialect: Dialect,
}

impl Introspector {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// List all user table names, sorted.
    pub async fn table_names<E: Executor>(&self, cx: &Cx, conn: &E) -> Outcome<Vec<String>, Error> {
        let sql = match self.dialect {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::Postgres => {
                "SELECT tablename FROM pg_tables WHERE schemaname = current_schema() ORDER BY tablename"
            }
            Dialect::Mysql => {
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME"
            }
        };
        let rows = try_outcome!(conn.query(cx, sql, &[]).await);
        Outcome::Ok(rows.iter().filter_map(|row| text(row, 0)).collect())
    }

    /// Columns, primary key and indexes of one table.
    pub async fn table_info<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<TableInfo, Error> {
        let columns = try_outcome!(self.columns(cx, conn, table_name).await);
        let indexes = try_outcome!(self.indexes(cx, conn, table_name).await);
        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();

        tracing::trace!(
            table = table_name,
            columns = columns.len(),
            indexes = indexes.len(),
            "Introspected table"
        );
        Outcome::Ok(TableInfo {
            name: table_name.to_string(),
            columns,
            primary_key,
            indexes,
        })
    }

    /// Introspect every table.
    pub async fn introspect_all<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
    ) -> Outcome<DatabaseSchema, Error> {
        let names = try_outcome!(self.table_names(cx, conn).await);
        let mut schema = DatabaseSchema {
            dialect: self.dialect,
            tables: Vec::with_capacity(names.len()),
        };
        for name in names {
            let info = try_outcome!(self.table_info(cx, conn, &name).await);
            schema.tables.push(info);
        }
        Outcome::Ok(schema)
    }

    async fn columns<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        match self.dialect {
            Dialect::Sqlite => self.sqlite_columns(cx, conn, table_name).await,
            Dialect::Postgres => self.postgres_columns(cx, conn, table_name).await,
            Dialect::Mysql => self.mysql_columns(cx, conn, table_name).await,
        }
    }

    async fn sqlite_columns<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let sql = format!("PRAGMA table_info({})", self.dialect.quote_identifier(table_name));
        let rows = try_outcome!(conn.query(cx, &sql, &[]).await);

        // AUTOINCREMENT is only visible in the CREATE statement.
        let ddl_sql = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1";
        let ddl = try_outcome!(
            conn.query(cx, ddl_sql, &[Value::Text(table_name.to_string())])
                .await
        );
        let autoincrement = ddl
            .first()
            .and_then(|row| text(row, 0))
            .is_some_and(|sql| sql.to_uppercase().contains("AUTOINCREMENT"));

        // cid, name, type, notnull, dflt_value, pk
        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text(row, 1)?;
                let sql_type = text(row, 2).unwrap_or_default();
                let primary_key = int(row, 5) > 0;
                Some(ColumnInfo {
                    parsed_type: ParsedSqlType::parse(&sql_type),
                    nullable: int(row, 3) == 0 && !primary_key,
                    default: text(row, 4),
                    auto_increment: primary_key && autoincrement,
                    primary_key,
                    sql_type,
                    name,
                })
            })
            .collect();
        Outcome::Ok(columns)
    }

    async fn postgres_columns<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let sql = "SELECT c.column_name, c.data_type, c.character_maximum_length, \
                   c.numeric_precision, c.numeric_scale, c.is_nullable, c.column_default, \
                   EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
                   JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                   WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = c.table_name \
                   AND tc.table_schema = c.table_schema AND kcu.column_name = c.column_name) AS is_pk \
                   FROM information_schema.columns c \
                   WHERE c.table_schema = current_schema() AND c.table_name = $1 \
                   ORDER BY c.ordinal_position";
        let rows = try_outcome!(
            conn.query(cx, sql, &[Value::Text(table_name.to_string())])
                .await
        );

        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text(row, 0)?;
                let data_type = text(row, 1).unwrap_or_default();
                let sql_type = match (row.get(2).and_then(Value::as_i64), data_type.as_str()) {
                    (Some(len), _) => format!("{}({})", data_type, len),
                    (None, "numeric") => match (
                        row.get(3).and_then(Value::as_i64),
                        row.get(4).and_then(Value::as_i64),
                    ) {
                        (Some(p), Some(s)) => format!("NUMERIC({}, {})", p, s),
                        _ => data_type.clone(),
                    },
                    _ => data_type.clone(),
                };
                let default = text(row, 6);
                let auto_increment = default
                    .as_deref()
                    .is_some_and(|d| d.starts_with("nextval("));
                Some(ColumnInfo {
                    parsed_type: ParsedSqlType::parse(&sql_type),
                    nullable: text(row, 5).is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                    default,
                    primary_key: row.get(7).and_then(Value::as_bool).unwrap_or(false),
                    auto_increment,
                    sql_type,
                    name,
                })
            })
            .collect();
        Outcome::Ok(columns)
    }

    async fn mysql_columns<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<ColumnInfo>, Error> {
        let sql = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_KEY, EXTRA \
                   FROM INFORMATION_SCHEMA.COLUMNS \
                   WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                   ORDER BY ORDINAL_POSITION";
        let rows = try_outcome!(
            conn.query(cx, sql, &[Value::Text(table_name.to_string())])
                .await
        );

        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text(row, 0)?;
                let sql_type = text(row, 1).unwrap_or_default();
                Some(ColumnInfo {
                    parsed_type: ParsedSqlType::parse(&sql_type),
                    nullable: text(row, 2).is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                    default: text(row, 3),
                    primary_key: text(row, 4).is_some_and(|k| k == "PRI"),
                    auto_increment: text(row, 5)
                        .is_some_and(|e| e.to_lowercase().contains("auto_increment")),
                    sql_type,
                    name,
                })
            })
            .collect();
        Outcome::Ok(columns)
    }

    async fn indexes<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<IndexInfo>, Error> {
        match self.dialect {
            Dialect::Sqlite => self.sqlite_indexes(cx, conn, table_name).await,
            Dialect::Postgres => {
                let sql = "SELECT i.relname, a.attname, ix.indisunique \
                           FROM pg_class t \
                           JOIN pg_namespace n ON n.oid = t.relnamespace \
                           JOIN pg_index ix ON t.oid = ix.indrelid \
                           JOIN pg_class i ON i.oid = ix.indexrelid \
                           JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                           WHERE n.nspname = current_schema() AND t.relname = $1 AND NOT ix.indisprimary \
                           ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)";
                let rows = try_outcome!(
                    conn.query(cx, sql, &[Value::Text(table_name.to_string())])
                        .await
                );
                Outcome::Ok(group_index_rows(&rows, |row| {
                    row.get(2).and_then(Value::as_bool).unwrap_or(false)
                }))
            }
            Dialect::Mysql => {
                let sql = "SELECT INDEX_NAME, COLUMN_NAME, NON_UNIQUE \
                           FROM INFORMATION_SCHEMA.STATISTICS \
                           WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY' \
                           ORDER BY INDEX_NAME, SEQ_IN_INDEX";
                let rows = try_outcome!(
                    conn.query(cx, sql, &[Value::Text(table_name.to_string())])
                        .await
                );
                Outcome::Ok(group_index_rows(&rows, |row| int(row, 2) == 0))
            }
        }
    }

    async fn sqlite_indexes<E: Executor>(
        &self,
        cx: &Cx,
        conn: &E,
        table_name: &str,
    ) -> Outcome<Vec<IndexInfo>, Error> {
        let sql = format!("PRAGMA index_list({})", self.dialect.quote_identifier(table_name));
        let rows = try_outcome!(conn.query(cx, &sql, &[]).await);

        let mut indexes = Vec::new();
        // seq, name, unique, origin, partial
        for row in &rows {
            let Some(name) = text(row, 1) else {
                continue;
            };
            // Only indexes created with CREATE INDEX; "pk" and "u" back constraints
            if text(row, 3).is_some_and(|origin| origin != "c") {
                continue;
            }
            let info_sql = format!("PRAGMA index_info({})", self.dialect.quote_identifier(&name));
            let cols = try_outcome!(conn.query(cx, &info_sql, &[]).await);
            // seqno, cid, name
            let mut cols: Vec<(i64, String)> = cols
                .iter()
                .filter_map(|c| Some((int(c, 0), text(c, 2)?)))
                .collect();
            cols.sort_by_key(|(seq, _)| *seq);
            indexes.push(IndexInfo {
                name,
                columns: cols.into_iter().map(|(_, c)| c).collect(),
                unique: int(row, 2) != 0,
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Outcome::Ok(indexes)
    }
}

/// Fold `(index, column, ...)` rows, already ordered by index then key position.
fn group_index_rows(rows: &[Row], unique: impl Fn(&Row) -> bool) -> Vec<IndexInfo> {
    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in rows {
        let (Some(name), Some(column)) = (text(row, 0), text(row, 1)) else {
            continue;
        };
        match indexes.last_mut() {
            Some(last) if last.name == name => last.columns.push(column),
            _ => indexes.push(IndexInfo {
                name,
                columns: vec![column],
                unique: unique(row),
            }),
        }
    }
    indexes
}

fn text(row: &Row, index: usize) -> Option<String> {
    match row.get(index)? {
        Value::Null => None,
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        other => Some(other.to_plain_string()),
    }
}

fn int(row: &Row, index: usize) -> i64 {
    row.get(index)
        .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_types() {
        let t = ParsedSqlType::parse("integer");
        assert_eq!(t.base_type, "INTEGER");
        assert_eq!(t.length, None);

        let t = ParsedSqlType::parse("VARCHAR(255)");
        assert_eq!(t.base_type, "VARCHAR");
        assert_eq!(t.length, Some(255));
        assert!(t.is_bounded_text());
    }

    #[test]
    fn test_parse_decimal() {
        let t = ParsedSqlType::parse("DECIMAL(10, 2)");
        assert_eq!(t.base_type, "DECIMAL");
        assert_eq!(t.precision, Some(10));
        assert_eq!(t.scale, Some(2));
        assert_eq!(t.length, None);

        let t = ParsedSqlType::parse("numeric(8)");
        assert_eq!(t.precision, Some(8));
    }

    #[test]
    fn test_parse_modifiers_and_aliases() {
        let t = ParsedSqlType::parse("int(11) unsigned");
        assert_eq!(t.base_type, "INTEGER");
        assert!(t.unsigned);

        let t = ParsedSqlType::parse("character varying(40)");
        assert_eq!(t.base_type, "VARCHAR");
        assert_eq!(t.length, Some(40));

        let t = ParsedSqlType::parse("timestamp without time zone");
        assert_eq!(t.base_type, "TIMESTAMP");
        assert!(t.is_datetime());

        let t = ParsedSqlType::parse("text[]");
        assert!(t.array);
        assert!(t.is_text());
    }

    #[test]
    fn test_same_as_ignores_display_width() {
        let declared = ParsedSqlType::parse("INT");
        assert!(declared.same_as(&ParsedSqlType::parse("int(11)")));
        assert!(ParsedSqlType::parse("SERIAL").same_as(&ParsedSqlType::parse("integer")));
        assert!(!ParsedSqlType::parse("VARCHAR(10)").same_as(&ParsedSqlType::parse("VARCHAR(20)")));
        assert!(!ParsedSqlType::parse("TEXT").same_as(&ParsedSqlType::parse("BLOB")));
    }

    #[test]
    fn test_widening() {
        let live = ParsedSqlType::parse("VARCHAR(20)");
        assert!(live.widens_to(&ParsedSqlType::parse("VARCHAR(64)")));
        assert!(live.widens_to(&ParsedSqlType::parse("TEXT")));
        assert!(!live.widens_to(&ParsedSqlType::parse("VARCHAR(10)")));
        assert!(!ParsedSqlType::parse("TEXT").widens_to(&ParsedSqlType::parse("VARCHAR(10)")));
        assert!(!ParsedSqlType::parse("INTEGER").widens_to(&ParsedSqlType::parse("BIGINT")));
    }

    #[test]
    fn test_group_index_rows() {
        let cols = vec!["name".to_string(), "column".to_string(), "unique".to_string()];
        let rows = vec![
            Row::new(cols.clone(), vec!["a".into(), "x".into(), Value::Bool(true)]),
            Row::new(cols.clone(), vec!["a".into(), "y".into(), Value::Bool(true)]),
            Row::new(cols, vec!["b".into(), "z".into(), Value::Bool(false)]),
        ];
        let grouped = group_index_rows(&rows, |r| r.get(2).and_then(Value::as_bool).unwrap_or(false));
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].columns, vec!["x", "y"]);
        assert!(grouped[0].unique);
        assert!(!grouped[1].unique);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = TableInfo {
            name: "user".into(),
            columns: vec![ColumnInfo {
                name: "Id".into(),
                sql_type: "INTEGER".into(),
                parsed_type: ParsedSqlType::parse("INTEGER"),
                nullable: false,
                default: None,
                primary_key: true,
                auto_increment: true,
            }],
            primary_key: vec!["Id".into()],
            indexes: Vec::new(),
        };
        assert!(table.column("id").is_some());
        assert!(table.has_auto_pk());

        let schema = DatabaseSchema {
            dialect: Dialect::Sqlite,
            tables: vec![table],
        };
        assert!(schema.table("USER").is_some());
        assert_eq!(schema.table_names(), vec!["user"]);
    }
}
