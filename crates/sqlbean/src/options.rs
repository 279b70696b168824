//! Engine configuration.

use serde::Deserialize;
use sqlbean_core::{Error, NameMapper, PrefixMapper, Result, SameMapper, SnakeMapper, SuffixMapper};
use sqlbean_query::LruCacher;
use sqlbean_schema::DEFAULT_MIGRATIONS_TABLE;
use std::sync::Arc;
use std::time::Duration;

/// Built-in naming conventions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapperKind {
    /// `UserInfo` -> `user_info`
    #[default]
    Snake,
    /// Names are used unchanged
    Same,
}

/// Options for an [`Engine`](crate::Engine).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```ignore
/// let options = EngineOptions::from_json(r#"{"show_sql": true, "cache_capacity": 500}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Log every statement at `info` instead of `debug`
    pub show_sql: bool,
    /// Include the elapsed time in statement logs
    pub show_exec_time: bool,
    pub mapper: MapperKind,
    /// Prefix added to every mapped table name
    pub table_prefix: Option<String>,
    /// Suffix added to every mapped table name
    pub table_suffix: Option<String>,
    /// Entries per tier of the default cacher; `None` disables caching
    pub cache_capacity: Option<usize>,
    /// Maximum age of a cache entry in seconds
    pub cache_max_age_secs: Option<u64>,
    pub migrations_table: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            show_sql: false,
            show_exec_time: false,
            mapper: MapperKind::Snake,
            table_prefix: None,
            table_suffix: None,
            cache_capacity: None,
            cache_max_age_secs: None,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    pub fn show_sql(mut self, on: bool) -> Self {
        self.show_sql = on;
        self
    }

    pub fn show_exec_time(mut self, on: bool) -> Self {
        self.show_exec_time = on;
        self
    }

    pub fn mapper(mut self, kind: MapperKind) -> Self {
        self.mapper = kind;
        self
    }

    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    pub fn table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.table_suffix = Some(suffix.into());
        self
    }

    /// Enable the default LRU cacher with `capacity` entries per tier.
    pub fn cache(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age_secs = Some(max_age.as_secs());
        self
    }

    pub fn migrations_table(mut self, name: impl Into<String>) -> Self {
        self.migrations_table = name.into();
        self
    }

    /// Whether the naming options differ from plain snake case.
    pub fn customizes_mapper(&self) -> bool {
        self.mapper != MapperKind::Snake || self.table_prefix.is_some() || self.table_suffix.is_some()
    }

    /// The naming convention these options describe.
    pub fn name_mapper(&self) -> Arc<dyn NameMapper> {
        let mut mapper: Arc<dyn NameMapper> = match self.mapper {
            MapperKind::Snake => Arc::new(SnakeMapper),
            MapperKind::Same => Arc::new(SameMapper),
        };
        if let Some(prefix) = &self.table_prefix {
            mapper = Arc::new(PrefixMapper::new(mapper, prefix.clone()));
        }
        if let Some(suffix) = &self.table_suffix {
            mapper = Arc::new(SuffixMapper::new(mapper, suffix.clone()));
        }
        mapper
    }

    /// The default cacher, when caching is enabled.
    pub fn default_cacher(&self) -> Option<LruCacher> {
        let capacity = self.cache_capacity?;
        let cacher = LruCacher::new(capacity);
        Some(match self.cache_max_age_secs {
            Some(secs) => cacher.with_max_age(Duration::from_secs(secs)),
            None => cacher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert!(!options.show_sql);
        assert_eq!(options.migrations_table, "sqlbean_migrations");
        assert!(options.default_cacher().is_none());
        assert!(!options.customizes_mapper());
    }

    #[test]
    fn test_partial_json() {
        let options = EngineOptions::from_json(
            r#"{"show_sql": true, "mapper": "same", "table_prefix": "t_", "cache_capacity": 10, "cache_max_age_secs": 60}"#,
        )
        .unwrap();
        assert!(options.show_sql);
        assert_eq!(options.mapper, MapperKind::Same);
        assert!(options.customizes_mapper());
        assert_eq!(options.name_mapper().table_name("UserInfo"), "t_UserInfo");

        let cacher = options.default_cacher().unwrap();
        assert_eq!(cacher.max_age(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_bad_json_is_serde_error() {
        let err = EngineOptions::from_json(r#"{"mapper": "kebab"}"#).unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
    }

    #[test]
    fn test_builder() {
        let options = EngineOptions::new()
            .show_sql(true)
            .show_exec_time(true)
            .cache(5)
            .migrations_table("history");
        assert_eq!(options.cache_capacity, Some(5));
        assert_eq!(options.migrations_table, "history");
    }
}
