//! SQL dialects: placeholders, quoting, type names and DDL.

use crate::metadata::{Column, Index, TableMetadata};
use crate::types::SqlType;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL dialect for generating database-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite dialect (uses ?1, ?2 placeholders)
    #[default]
    Sqlite,
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    Postgres,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier, doubling embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// Quote a possibly qualified name (`t.col`), leaving `*` and
    /// already-quoted parts alone.
    pub fn quote_qualified(self, name: &str) -> String {
        name.split('.')
            .map(|part| {
                let part = part.trim();
                if part == "*" || part.starts_with('"') || part.starts_with('`') {
                    part.to_string()
                } else {
                    self.quote_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether `ALTER ... MODIFY/ALTER COLUMN` can change a column type.
    pub const fn supports_modify_column(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Whether VARCHAR→TEXT promotion is expressible as an alter.
    pub const fn supports_text_promotion(self) -> bool {
        matches!(self, Dialect::Mysql | Dialect::Postgres)
    }

    /// Product name of a SQL type.
    pub fn type_name(self, ty: SqlType) -> String {
        match self {
            Dialect::Sqlite => match ty {
                SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Boolean => "INTEGER".to_string(),
                SqlType::Real | SqlType::Double => "REAL".to_string(),
                SqlType::Decimal { .. } => "NUMERIC".to_string(),
                SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text | SqlType::Json => {
                    "TEXT".to_string()
                }
                SqlType::Blob => "BLOB".to_string(),
                SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp => {
                    "DATETIME".to_string()
                }
                SqlType::Custom(name) => name.to_string(),
            },
            Dialect::Postgres => match ty {
                SqlType::TinyInt | SqlType::SmallInt => "SMALLINT".to_string(),
                SqlType::Double => "DOUBLE PRECISION".to_string(),
                SqlType::Decimal { precision, scale } => {
                    format!("NUMERIC({}, {})", precision, scale)
                }
                SqlType::Blob => "BYTEA".to_string(),
                SqlType::DateTime => "TIMESTAMP".to_string(),
                other => other.sql_name(),
            },
            Dialect::Mysql => match ty {
                SqlType::Integer => "INT".to_string(),
                SqlType::Real => "FLOAT".to_string(),
                SqlType::Boolean => "TINYINT(1)".to_string(),
                other => other.sql_name(),
            },
        }
    }

    /// Type as it appears in a column definition, including serial forms.
    pub fn column_type(self, column: &Column) -> String {
        if column.auto_increment && self == Dialect::Postgres {
            return match column.sql_type {
                SqlType::BigInt => "BIGSERIAL".to_string(),
                _ => "SERIAL".to_string(),
            };
        }
        self.type_name(column.sql_type)
    }

    /// `name TYPE [PRIMARY KEY ...] [NOT NULL] [DEFAULT ...]`.
    pub fn column_definition(self, column: &Column, inline_pk: bool) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        );
        if inline_pk && column.primary_key {
            def.push_str(" PRIMARY KEY");
            if column.auto_increment {
                match self {
                    Dialect::Sqlite => def.push_str(" AUTOINCREMENT"),
                    Dialect::Mysql => def.push_str(" AUTO_INCREMENT"),
                    Dialect::Postgres => {}
                }
            }
        } else if column.auto_increment && self == Dialect::Mysql {
            def.push_str(" AUTO_INCREMENT");
        }
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = column.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }

    /// `CREATE TABLE IF NOT EXISTS` for a table.
    pub fn create_table_sql(self, table: &TableMetadata) -> String {
        let inline_pk = table.primary_keys.len() == 1;
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, inline_pk))
            .collect();
        if table.primary_keys.len() > 1 {
            let keys: Vec<String> = table
                .pk_columns()
                .map(|c| self.quote_identifier(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        )
    }

    pub fn drop_table_sql(self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// `ALTER TABLE ... ADD COLUMN`.
    ///
    /// A NOT NULL column without a default cannot be added to a populated
    /// table, so the constraint is relaxed in that case.
    pub fn add_column_sql(self, table: &str, column: &Column) -> String {
        let mut column = column.clone();
        if column.default.is_none() {
            column.nullable = true;
        }
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&column, false)
        )
    }

    /// Alter a column's type, when the dialect can.
    pub fn modify_column_sql(self, table: &str, column: &Column) -> Option<String> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Mysql => Some(format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column, false)
            )),
            Dialect::Postgres => Some(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                self.quote_identifier(table),
                self.quote_identifier(&column.name),
                self.type_name(column.sql_type)
            )),
        }
    }

    pub fn create_index_sql(self, table: &str, index: &Index) -> String {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();
        let unique = if index.unique { "UNIQUE " } else { "" };
        let guard = if self == Dialect::Mysql {
            ""
        } else {
            "IF NOT EXISTS "
        };
        format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            unique,
            guard,
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            columns.join(", ")
        )
    }

    pub fn drop_index_sql(self, table: &str, index_name: &str) -> String {
        match self {
            Dialect::Mysql => format!(
                "DROP INDEX {} ON {}",
                self.quote_identifier(index_name),
                self.quote_identifier(table)
            ),
            Dialect::Sqlite | Dialect::Postgres => {
                format!("DROP INDEX IF EXISTS {}", self.quote_identifier(index_name))
            }
        }
    }

    /// ` LIMIT n OFFSET m` in this dialect's spelling (leading space included).
    pub fn limit_sql(self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(n), None) => format!(" LIMIT {}", n),
            (Some(n), Some(m)) => format!(" LIMIT {} OFFSET {}", n, m),
            (None, Some(m)) => match self {
                Dialect::Sqlite => format!(" LIMIT -1 OFFSET {}", m),
                Dialect::Mysql => format!(" LIMIT {} OFFSET {}", u64::MAX, m),
                Dialect::Postgres => format!(" OFFSET {}", m),
            },
        }
    }

    /// Query returning one row when `table` exists.
    pub fn table_exists_sql(self, table: &str) -> (String, Vec<Value>) {
        let sql = match self {
            Dialect::Sqlite => format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
                self.placeholder(1)
            ),
            Dialect::Postgres => format!(
                "SELECT tablename FROM pg_tables WHERE schemaname = current_schema() AND tablename = {}",
                self.placeholder(1)
            ),
            Dialect::Mysql => format!(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
                self.placeholder(1)
            ),
        };
        (sql, vec![Value::Text(table.to_string())])
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInfo;
    use crate::mapper::SnakeMapper;

    static FIELDS: [FieldInfo; 3] = [
        FieldInfo::new("id", Some(SqlType::BigInt))
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("name", Some(SqlType::VarChar(64))).unique(""),
        FieldInfo::new("score", Some(SqlType::Integer)).default_value("0"),
    ];

    fn table() -> TableMetadata {
        TableMetadata::build("Player", None, &FIELDS, &[], true, &SnakeMapper).unwrap()
    }

    #[test]
    fn placeholders_and_quoting() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
        assert_eq!(Dialect::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::Sqlite.quote_qualified("u.name"), "\"u\".\"name\"");
        assert_eq!(Dialect::Sqlite.quote_qualified("u.*"), "\"u\".*");
    }

    #[test]
    fn sqlite_create_table() {
        let sql = Dialect::Sqlite.create_table_sql(&table());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"player\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             \"name\" TEXT NOT NULL, \"score\" INTEGER NOT NULL DEFAULT 0)"
        );
    }

    #[test]
    fn postgres_and_mysql_types() {
        let t = table();
        let pg = Dialect::Postgres.create_table_sql(&t);
        assert!(pg.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(pg.contains("\"name\" VARCHAR(64) NOT NULL"));
        let my = Dialect::Mysql.create_table_sql(&t);
        assert!(my.contains("`id` BIGINT PRIMARY KEY AUTO_INCREMENT NOT NULL"));
        assert!(my.contains("`score` INT NOT NULL DEFAULT 0"));
    }

    #[test]
    fn composite_primary_key_clause() {
        static PAIR: [FieldInfo; 2] = [
            FieldInfo::new("a", Some(SqlType::Integer)).primary_key(true),
            FieldInfo::new("b", Some(SqlType::Integer)).primary_key(true),
        ];
        let t = TableMetadata::build("Pair", None, &PAIR, &[], true, &SnakeMapper).unwrap();
        let sql = Dialect::Sqlite.create_table_sql(&t);
        assert!(sql.ends_with("PRIMARY KEY (\"a\", \"b\"))"));
    }

    #[test]
    fn alter_statements() {
        let t = table();
        let score = t.column("score").unwrap();
        assert_eq!(
            Dialect::Sqlite.add_column_sql("player", score),
            "ALTER TABLE \"player\" ADD COLUMN \"score\" INTEGER NOT NULL DEFAULT 0"
        );
        let name = t.column("name").unwrap();
        assert_eq!(
            Dialect::Sqlite.add_column_sql("player", name),
            "ALTER TABLE \"player\" ADD COLUMN \"name\" TEXT"
        );
        assert!(Dialect::Sqlite.modify_column_sql("player", name).is_none());
        assert_eq!(
            Dialect::Mysql.modify_column_sql("player", name).unwrap(),
            "ALTER TABLE `player` MODIFY COLUMN `name` VARCHAR(64) NOT NULL"
        );
    }

    #[test]
    fn index_statements() {
        let t = table();
        let idx = &t.indexes[0];
        assert_eq!(
            Dialect::Sqlite.create_index_sql("player", idx),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"UQE_player_name\" ON \"player\" (\"name\")"
        );
        assert_eq!(
            Dialect::Mysql.drop_index_sql("player", "IDX_player_x"),
            "DROP INDEX `IDX_player_x` ON `player`"
        );
    }

    #[test]
    fn limit_spelling() {
        assert_eq!(Dialect::Sqlite.limit_sql(Some(10), Some(5)), " LIMIT 10 OFFSET 5");
        assert_eq!(Dialect::Sqlite.limit_sql(None, Some(5)), " LIMIT -1 OFFSET 5");
        assert_eq!(Dialect::Postgres.limit_sql(None, Some(5)), " OFFSET 5");
        assert_eq!(Dialect::Mysql.limit_sql(None, None), "");
    }
}
