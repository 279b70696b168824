//! Which cacher serves which table, and write-path invalidation.
//!
//! Cache failures never reach the caller: they are logged at `warn` and the
//! operation continues uncached.

use sqlbean_core::{PrimaryKey, TableMetadata};
use sqlbean_query::Cacher;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default cacher plus per-table overrides.
#[derive(Default)]
pub(crate) struct CachePolicy {
    default: RwLock<Option<Arc<dyn Cacher>>>,
    /// `None` disables caching for the table even with a default cacher
    tables: RwLock<HashMap<String, Option<Arc<dyn Cacher>>>>,
}

impl std::fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapped: Vec<String> = self
            .tables
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("CachePolicy")
            .field("has_default", &self.default.read().is_ok_and(|d| d.is_some()))
            .field("tables", &mapped)
            .finish()
    }
}

impl CachePolicy {
    pub(crate) fn set_default(&self, cacher: Option<Arc<dyn Cacher>>) {
        match self.default.write() {
            Ok(mut slot) => *slot = cacher,
            Err(_) => tracing::warn!(target: "sqlbean::cache", "Cache policy lock poisoned"),
        }
    }

    pub(crate) fn map(&self, table: &str, cacher: Option<Arc<dyn Cacher>>) {
        match self.tables.write() {
            Ok(mut tables) => {
                tables.insert(table.to_string(), cacher);
            }
            Err(_) => tracing::warn!(target: "sqlbean::cache", "Cache policy lock poisoned"),
        }
    }

    /// The cacher for a table name, ignoring the bean's own opt-out.
    pub(crate) fn for_table(&self, table: &str) -> Option<Arc<dyn Cacher>> {
        if let Ok(tables) = self.tables.read() {
            if let Some(mapped) = tables.get(table) {
                return mapped.clone();
            }
        }
        self.default.read().ok().and_then(|d| d.clone())
    }

    /// The cacher for reads of `meta` under the name `table`.
    pub(crate) fn for_bean(&self, meta: &TableMetadata, table: &str) -> Option<Arc<dyn Cacher>> {
        if !meta.cacheable || !meta.has_primary_key() {
            return None;
        }
        self.for_table(table)
    }

    fn all(&self) -> Vec<Arc<dyn Cacher>> {
        let mut cachers: Vec<Arc<dyn Cacher>> = self
            .tables
            .read()
            .map(|t| t.values().flatten().cloned().collect())
            .unwrap_or_default();
        if let Some(default) = self.default.read().ok().and_then(|d| d.clone()) {
            cachers.push(default);
        }
        cachers
    }

    /// Drop a table's query sets and the given keys' beans; every bean of
    /// the table when `keys` is `None`.
    pub(crate) fn invalidate(&self, table: &str, keys: Option<&[PrimaryKey]>) {
        let Some(cacher) = self.for_table(table) else {
            return;
        };
        let result = cacher.clear_ids(table).and_then(|()| match keys {
            Some(keys) => keys.iter().try_for_each(|key| cacher.del_bean(table, key)),
            None => cacher.clear_beans(table),
        });
        match result {
            Ok(()) => tracing::trace!(target: "sqlbean::cache", table, "Invalidated cache"),
            Err(e) => tracing::warn!(target: "sqlbean::cache", table, error = %e, "Cache invalidation failed"),
        }
    }

    /// Empty every cacher.
    pub(crate) fn clear_all(&self) {
        for cacher in self.all() {
            if let Err(e) = cacher.clear_all() {
                tracing::warn!(target: "sqlbean::cache", error = %e, "Cache clear failed");
            }
        }
    }
}
