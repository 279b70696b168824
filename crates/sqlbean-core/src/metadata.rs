//! Table metadata and the process-wide registry that memoizes it.
//!
//! A bean type is reflected once into a [`TableMetadata`]: column names after
//! the naming convention, SQL types, lifecycle columns and indexes. Every
//! later statement for that type reuses the same `Arc`.

use crate::bean::Bean;
use crate::error::{Error, MetadataErrorKind, Result};
use crate::field::{FieldInfo, IndexInfo};
use crate::mapper::{NameMapper, SnakeMapper};
use crate::types::SqlType;
use crate::value::{PrimaryKey, Timestamp, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// One persisted column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name after mapping
    pub name: String,
    /// Rust field name
    pub field_name: &'static str,
    /// Position of the field in `Bean::fields()`
    pub field_index: usize,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub default: Option<&'static str>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub created: bool,
    pub updated: bool,
    pub deleted: bool,
    pub version: bool,
    pub json: bool,
    pub rust_type: &'static str,
}

impl Column {
    /// The value written into a lifecycle column for "now".
    ///
    /// Integer columns store Unix seconds; everything else a timestamp.
    pub fn now_value(&self) -> Value {
        self.time_value(Timestamp::now())
    }

    /// `at` in this column's storage representation.
    pub fn time_value(&self, at: Timestamp) -> Value {
        if self.sql_type.is_integer() {
            Value::BigInt(at.as_micros() / Timestamp::MICROS_PER_SECOND)
        } else {
            Value::Timestamp(at.as_micros())
        }
    }
}

/// A named index over ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Index {
    /// Structural equality: same columns in the same order, case-insensitively.
    pub fn same_columns(&self, other_columns: &[String]) -> bool {
        self.columns.len() == other_columns.len()
            && self
                .columns
                .iter()
                .zip(other_columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

/// Reflected schema of one bean type.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    pub name: String,
    pub struct_name: &'static str,
    pub columns: Vec<Column>,
    /// Positions in `columns` of the primary key, in declaration order
    pub primary_keys: Vec<usize>,
    pub auto_increment: Option<usize>,
    pub created: Option<usize>,
    pub updated: Option<usize>,
    pub deleted: Option<usize>,
    pub version: Option<usize>,
    pub indexes: Vec<Index>,
    pub cacheable: bool,
}

impl TableMetadata {
    /// Reflect a bean type's static description.
    pub fn of<T: Bean>(mapper: &dyn NameMapper) -> Result<Self> {
        Self::build(
            T::STRUCT_NAME,
            T::TABLE_NAME,
            T::fields(),
            T::indexes(),
            T::CACHEABLE,
            mapper,
        )
    }

    /// Build metadata from raw field declarations.
    pub fn build(
        struct_name: &'static str,
        table_name: Option<&'static str>,
        fields: &'static [FieldInfo],
        struct_indexes: &'static [IndexInfo],
        cacheable: bool,
        mapper: &dyn NameMapper,
    ) -> Result<Self> {
        let name = table_name.map_or_else(|| mapper.table_name(struct_name), str::to_string);
        let mut meta = TableMetadata {
            name,
            struct_name,
            columns: Vec::with_capacity(fields.len()),
            primary_keys: Vec::new(),
            auto_increment: None,
            created: None,
            updated: None,
            deleted: None,
            version: None,
            indexes: Vec::new(),
            cacheable,
        };

        for (field_index, field) in fields.iter().enumerate() {
            let Some(sql_type) = field.sql_type else {
                return Err(Error::metadata(
                    MetadataErrorKind::UnsupportedFieldType,
                    struct_name,
                    format!(
                        "field '{}' of type `{}` has no SQL representation; tag it `json` or give it a `sql_type`",
                        field.name, field.rust_type
                    ),
                ));
            };
            let position = meta.columns.len();
            let column = Column {
                name: field
                    .column
                    .map_or_else(|| mapper.column_name(field.name), str::to_string),
                field_name: field.name,
                field_index,
                sql_type,
                nullable: field.nullable && !field.primary_key,
                default: field.default,
                primary_key: field.primary_key,
                auto_increment: field.auto_increment,
                created: field.created,
                updated: field.updated,
                deleted: field.deleted,
                version: field.version,
                json: field.json,
                rust_type: field.rust_type,
            };

            if column.primary_key {
                meta.primary_keys.push(position);
            }
            let flags = [
                (column.auto_increment, &mut meta.auto_increment, "autoincr"),
                (column.created, &mut meta.created, "created"),
                (column.updated, &mut meta.updated, "updated"),
                (column.deleted, &mut meta.deleted, "deleted"),
                (column.version, &mut meta.version, "version"),
            ];
            for (set, slot, tag) in flags {
                if !set {
                    continue;
                }
                if slot.is_some() {
                    return Err(Error::invalid_metadata(
                        struct_name,
                        format!("more than one column is tagged `{}`", tag),
                    ));
                }
                *slot = Some(position);
            }
            if column.auto_increment && !column.primary_key {
                return Err(Error::invalid_metadata(
                    struct_name,
                    format!("autoincrement column '{}' is not part of the primary key", column.name),
                ));
            }
            if column.version && !column.sql_type.is_integer() {
                return Err(Error::invalid_metadata(
                    struct_name,
                    format!(
                        "version column '{}' must be an integer, found {}",
                        column.name,
                        column.sql_type.sql_name()
                    ),
                ));
            }
            meta.columns.push(column);
        }

        meta.collect_field_indexes(fields);
        for declared in struct_indexes {
            let mut columns = Vec::with_capacity(declared.columns.len());
            for wanted in declared.columns {
                let col = meta.column(wanted).or_else(|| {
                    meta.columns.iter().find(|c| c.field_name == *wanted)
                });
                match col {
                    Some(c) => columns.push(c.name.clone()),
                    None => {
                        return Err(Error::invalid_metadata(
                            struct_name,
                            format!("index '{}' references unknown column '{}'", declared.name, wanted),
                        ));
                    }
                }
            }
            let name = index_name(&meta.name, declared.name, declared.unique);
            meta.indexes.push(Index {
                name,
                columns,
                unique: declared.unique,
            });
        }

        tracing::trace!(
            table = %meta.name,
            columns = meta.columns.len(),
            indexes = meta.indexes.len(),
            "Reflected bean metadata"
        );
        Ok(meta)
    }

    /// Group field-level `index`/`unique` tags by name into indexes.
    fn collect_field_indexes(&mut self, fields: &[FieldInfo]) {
        let mut grouped: Vec<Index> = Vec::new();
        for column in &self.columns {
            let field = &fields[column.field_index];
            for (tag, unique) in [(field.index, false), (field.unique, true)] {
                let Some(tag) = tag else { continue };
                let base = if tag.is_empty() { column.name.as_str() } else { tag };
                let name = index_name(&self.name, base, unique);
                match grouped.iter_mut().find(|i| i.name == name) {
                    Some(existing) => existing.columns.push(column.name.clone()),
                    None => grouped.push(Index {
                        name,
                        columns: vec![column.name.clone()],
                        unique,
                    }),
                }
            }
        }
        self.indexes.extend(grouped);
    }

    /// Look up a column by name, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_position(name).map(|i| &self.columns[i])
    }

    /// Position of a column by name, ignoring ASCII case.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// Primary key columns in key order.
    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_keys.iter().map(|&i| &self.columns[i])
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.auto_increment.map(|i| &self.columns[i])
    }

    pub fn created_column(&self) -> Option<&Column> {
        self.created.map(|i| &self.columns[i])
    }

    pub fn updated_column(&self) -> Option<&Column> {
        self.updated.map(|i| &self.columns[i])
    }

    pub fn deleted_column(&self) -> Option<&Column> {
        self.deleted.map(|i| &self.columns[i])
    }

    pub fn version_column(&self) -> Option<&Column> {
        self.version.map(|i| &self.columns[i])
    }

    /// Read every column value of a bean, in column order.
    pub fn values_of<T: Bean>(&self, bean: &T) -> Result<Vec<Value>> {
        self.columns
            .iter()
            .map(|c| bean.field_value(c.field_index))
            .collect()
    }

    /// Read the primary key of a bean.
    pub fn pk_of<T: Bean>(&self, bean: &T) -> Result<PrimaryKey> {
        if !self.has_primary_key() {
            return Err(Error::missing_primary_key(self.struct_name));
        }
        self.pk_columns()
            .map(|c| bean.field_value(c.field_index))
            .collect::<Result<Vec<_>>>()
            .map(PrimaryKey::new)
    }

    /// Extract the primary key from a full column-ordered value list.
    pub fn pk_from_values(&self, values: &[Value]) -> Option<PrimaryKey> {
        self.primary_keys
            .iter()
            .map(|&i| values.get(i).cloned())
            .collect::<Option<Vec<_>>>()
            .map(PrimaryKey::new)
    }

    /// Split `id(...)` values across the key columns.
    pub fn id_conditions(&self, key: &PrimaryKey) -> Result<Vec<(&Column, Value)>> {
        if !self.has_primary_key() {
            return Err(Error::missing_primary_key(self.struct_name));
        }
        if key.len() != self.primary_keys.len() {
            return Err(Error::invalid_metadata(
                self.struct_name,
                format!(
                    "id has {} value(s) but the primary key has {} column(s)",
                    key.len(),
                    self.primary_keys.len()
                ),
            ));
        }
        Ok(self.pk_columns().zip(key.values().iter().cloned()).collect())
    }
}

/// `IDX_<table>_<name>` / `UQE_<table>_<name>`.
pub fn index_name(table: &str, name: &str, unique: bool) -> String {
    let prefix = if unique { "UQE" } else { "IDX" };
    format!("{}_{}_{}", prefix, table, name)
}

/// Process-wide memo of reflected bean metadata.
pub struct Registry {
    tables: RwLock<HashMap<TypeId, Arc<TableMetadata>>>,
    mapper: RwLock<Arc<dyn NameMapper>>,
}

impl Registry {
    pub fn new(mapper: Arc<dyn NameMapper>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            mapper: RwLock::new(mapper),
        }
    }

    /// Metadata for `T`, reflecting it on first use.
    pub fn resolve<T: Bean>(&self) -> Result<Arc<TableMetadata>> {
        let key = TypeId::of::<T>();
        if let Some(meta) = self.read_tables()?.get(&key) {
            return Ok(Arc::clone(meta));
        }

        let mut tables = self
            .tables
            .write()
            .map_err(|_| Error::Custom("metadata registry lock poisoned".to_string()))?;
        // Another writer may have won the race.
        if let Some(meta) = tables.get(&key) {
            return Ok(Arc::clone(meta));
        }
        let mapper = self.mapper()?;
        let meta = Arc::new(TableMetadata::of::<T>(mapper.as_ref())?);
        tables.insert(key, Arc::clone(&meta));
        Ok(meta)
    }

    /// Drop the memo entry for `T`.
    pub fn forget<T: Bean>(&self) {
        if let Ok(mut tables) = self.tables.write() {
            tables.remove(&TypeId::of::<T>());
        }
    }

    /// Replace the naming convention; every memo entry is dropped.
    pub fn set_mapper(&self, mapper: Arc<dyn NameMapper>) {
        if let Ok(mut slot) = self.mapper.write() {
            *slot = mapper;
        }
        if let Ok(mut tables) = self.tables.write() {
            tables.clear();
        }
    }

    pub fn mapper(&self) -> Result<Arc<dyn NameMapper>> {
        self.mapper
            .read()
            .map(|m| Arc::clone(&m))
            .map_err(|_| Error::Custom("metadata registry lock poisoned".to_string()))
    }

    fn read_tables(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TypeId, Arc<TableMetadata>>>> {
        self.tables
            .read()
            .map_err(|_| Error::Custom("metadata registry lock poisoned".to_string()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(SnakeMapper))
    }
}

/// The global registry.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::default)
}

/// Metadata for `T` from the global registry.
pub fn resolve<T: Bean>() -> Result<Arc<TableMetadata>> {
    registry().resolve::<T>()
}

/// Invalidate the global memo entry for `T`.
pub fn forget<T: Bean>() {
    registry().forget::<T>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::SameMapper;

    #[derive(Default)]
    struct UserInfo {
        id: i64,
        name: String,
        ver: i32,
    }

    static USER_FIELDS: [FieldInfo; 3] = [
        FieldInfo::new("id", Some(SqlType::BigInt))
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("name", Some(SqlType::VarChar(64))).unique(""),
        FieldInfo::new("ver", Some(SqlType::Integer)).version(true),
    ];

    impl Bean for UserInfo {
        const STRUCT_NAME: &'static str = "UserInfo";

        fn fields() -> &'static [FieldInfo] {
            &USER_FIELDS
        }

        fn field_value(&self, index: usize) -> Result<Value> {
            match index {
                0 => Ok(Value::from(self.id)),
                1 => Ok(Value::from(self.name.clone())),
                2 => Ok(Value::from(self.ver)),
                _ => Err(crate::bean::field_index_error(Self::STRUCT_NAME, index)),
            }
        }

        fn set_field_value(&mut self, index: usize, value: &Value) -> Result<()> {
            use crate::row::FromValue;
            match index {
                0 => self.id = FromValue::from_value(value)?,
                1 => self.name = FromValue::from_value(value)?,
                2 => self.ver = FromValue::from_value(value)?,
                _ => return Err(crate::bean::field_index_error(Self::STRUCT_NAME, index)),
            }
            Ok(())
        }
    }

    fn build(fields: &'static [FieldInfo]) -> Result<TableMetadata> {
        TableMetadata::build("Probe", None, fields, &[], true, &SnakeMapper)
    }

    #[test]
    fn reflects_names_and_lifecycle_columns() {
        let meta = TableMetadata::of::<UserInfo>(&SnakeMapper).unwrap();
        assert_eq!(meta.name, "user_info");
        assert_eq!(meta.primary_keys, vec![0]);
        assert_eq!(meta.auto_increment, Some(0));
        assert_eq!(meta.version_column().unwrap().name, "ver");
        assert_eq!(meta.indexes.len(), 1);
        assert_eq!(meta.indexes[0].name, "UQE_user_info_name");
        assert!(meta.indexes[0].unique);
        assert!(meta.column("NAME").is_some());
    }

    #[test]
    fn same_mapper_keeps_struct_name() {
        let meta = TableMetadata::of::<UserInfo>(&SameMapper).unwrap();
        assert_eq!(meta.name, "UserInfo");
    }

    #[test]
    fn registry_memoizes_until_forgotten() {
        let registry = Registry::default();
        let a = registry.resolve::<UserInfo>().unwrap();
        let b = registry.resolve::<UserInfo>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.forget::<UserInfo>();
        let c = registry.resolve::<UserInfo>().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        registry.set_mapper(Arc::new(SameMapper));
        assert_eq!(registry.resolve::<UserInfo>().unwrap().name, "UserInfo");
    }

    #[test]
    fn rejects_unsupported_field_type() {
        static FIELDS: [FieldInfo; 1] =
            [FieldInfo::new("tags", None).rust_type("HashMap<String, i32>")];
        let err = build(&FIELDS).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::UnsupportedFieldType));
    }

    #[test]
    fn rejects_non_integer_version() {
        static FIELDS: [FieldInfo; 1] = [FieldInfo::new("ver", Some(SqlType::Text)).version(true)];
        let err = build(&FIELDS).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::InvalidMetadata));
    }

    #[test]
    fn rejects_duplicate_lifecycle_flags() {
        static FIELDS: [FieldInfo; 2] = [
            FieldInfo::new("a", Some(SqlType::DateTime)).created(true),
            FieldInfo::new("b", Some(SqlType::DateTime)).created(true),
        ];
        let err = build(&FIELDS).unwrap_err();
        assert!(err.to_string().contains("created"));
    }

    #[test]
    fn rejects_autoincrement_outside_key() {
        static FIELDS: [FieldInfo; 1] =
            [FieldInfo::new("seq", Some(SqlType::BigInt)).auto_increment(true)];
        assert!(build(&FIELDS).is_err());
    }

    #[test]
    fn rejects_index_on_unknown_column() {
        static FIELDS: [FieldInfo; 1] = [FieldInfo::new("a", Some(SqlType::Integer))];
        static INDEXES: [IndexInfo; 1] = [IndexInfo::new("ab", &["a", "b"], false)];
        let err =
            TableMetadata::build("Probe", None, &FIELDS, &INDEXES, true, &SnakeMapper).unwrap_err();
        assert!(err.to_string().contains("unknown column 'b'"));
    }

    #[test]
    fn groups_named_field_indexes() {
        static FIELDS: [FieldInfo; 3] = [
            FieldInfo::new("a", Some(SqlType::Integer)).index("pair"),
            FieldInfo::new("b", Some(SqlType::Integer)).index("pair"),
            FieldInfo::new("c", Some(SqlType::Integer)).index(""),
        ];
        let meta = build(&FIELDS).unwrap();
        assert_eq!(meta.indexes.len(), 2);
        assert_eq!(meta.indexes[0].name, "IDX_probe_pair");
        assert_eq!(meta.indexes[0].columns, vec!["a", "b"]);
        assert_eq!(meta.indexes[1].name, "IDX_probe_c");
    }

    #[test]
    fn composite_id_split() {
        static FIELDS: [FieldInfo; 2] = [
            FieldInfo::new("a", Some(SqlType::Integer)).primary_key(true),
            FieldInfo::new("b", Some(SqlType::Text)).primary_key(true),
        ];
        let meta = build(&FIELDS).unwrap();
        let key = PrimaryKey::new(vec![Value::Int(1), Value::Text("x".into())]);
        let conds = meta.id_conditions(&key).unwrap();
        assert_eq!(conds[1].0.name, "b");
        assert!(meta.id_conditions(&PrimaryKey::new(vec![Value::Int(1)])).is_err());
    }
}
