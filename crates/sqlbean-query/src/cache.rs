//! Two-tier result cache.
//!
//! The set tier maps a query fingerprint (compiled SQL plus arguments) to
//! the ordered primary keys it returned. The bean tier maps a primary key to
//! the last row loaded for it. Both tiers are keyed by table, bounded with
//! least-recently-used eviction and optionally expire entries by age.

use lru::LruCache;
use sqlbean_core::{Error, PrimaryKey, Result, Row, Value};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default entries per tier.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Storage for cached query results.
///
/// Implementations must tolerate concurrent callers; every method may fail,
/// and callers treat a failure as a cache miss.
pub trait Cacher: Send + Sync {
    /// Primary keys a query fingerprint resolved to.
    fn get_ids(&self, table: &str, fingerprint: &str) -> Result<Option<Vec<PrimaryKey>>>;

    fn put_ids(&self, table: &str, fingerprint: &str, ids: Vec<PrimaryKey>) -> Result<()>;

    /// Last row loaded for a key.
    fn get_bean(&self, table: &str, key: &PrimaryKey) -> Result<Option<Row>>;

    fn put_bean(&self, table: &str, key: PrimaryKey, row: Row) -> Result<()>;

    fn del_bean(&self, table: &str, key: &PrimaryKey) -> Result<()>;

    /// Drop every set-tier entry of a table.
    fn clear_ids(&self, table: &str) -> Result<()>;

    /// Drop every bean-tier entry of a table.
    fn clear_beans(&self, table: &str) -> Result<()>;

    /// Drop everything.
    fn clear_all(&self) -> Result<()>;
}

/// Fingerprint of a compiled query.
pub fn fingerprint(sql: &str, args: &[Value]) -> Result<String> {
    let args = serde_json::to_string(args)?;
    Ok(format!("{}-{}", sql, args))
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, max_age: Option<Duration>) -> bool {
        max_age.is_some_and(|age| self.stored_at.elapsed() > age)
    }
}

type IdKey = (String, String);
type BeanKey = (String, PrimaryKey);

#[derive(Debug)]
struct Tiers {
    ids: LruCache<IdKey, Entry<Vec<PrimaryKey>>>,
    beans: LruCache<BeanKey, Entry<Row>>,
}

/// In-memory [`Cacher`] backed by two LRU maps behind one mutex.
#[derive(Debug)]
pub struct LruCacher {
    tiers: Mutex<Tiers>,
    max_age: Option<Duration>,
}

impl LruCacher {
    /// Create a cacher holding up to `capacity` entries per tier.
    ///
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiers: Mutex::new(Tiers {
                ids: LruCache::new(capacity),
                beans: LruCache::new(capacity),
            }),
            max_age: None,
        }
    }

    /// Expire entries older than `max_age`.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Entry counts of the (set, bean) tiers.
    pub fn len(&self) -> Result<(usize, usize)> {
        let tiers = self.lock()?;
        Ok((tiers.ids.len(), tiers.beans.len()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tiers>> {
        self.tiers
            .lock()
            .map_err(|_| Error::Custom("cache lock poisoned".to_string()))
    }
}

impl Default for LruCacher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Look up a key, dropping it when expired.
fn lookup<K, V>(map: &mut LruCache<K, Entry<V>>, key: &K, max_age: Option<Duration>) -> Option<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    if map.peek(key)?.is_expired(max_age) {
        map.pop(key);
        return None;
    }
    map.get(key).map(|e| e.value.clone())
}

/// Remove every key belonging to `table`.
fn purge_table<K, V>(map: &mut LruCache<(String, K), V>, table: &str)
where
    K: std::hash::Hash + Eq + Clone,
{
    let doomed: Vec<(String, K)> = map
        .iter()
        .filter(|((t, _), _)| t == table)
        .map(|(k, _)| k.clone())
        .collect();
    for key in doomed {
        map.pop(&key);
    }
}

impl Cacher for LruCacher {
    fn get_ids(&self, table: &str, fingerprint: &str) -> Result<Option<Vec<PrimaryKey>>> {
        let mut tiers = self.lock()?;
        let key = (table.to_string(), fingerprint.to_string());
        Ok(lookup(&mut tiers.ids, &key, self.max_age))
    }

    fn put_ids(&self, table: &str, fingerprint: &str, ids: Vec<PrimaryKey>) -> Result<()> {
        let mut tiers = self.lock()?;
        tiers
            .ids
            .put((table.to_string(), fingerprint.to_string()), Entry::new(ids));
        Ok(())
    }

    fn get_bean(&self, table: &str, key: &PrimaryKey) -> Result<Option<Row>> {
        let mut tiers = self.lock()?;
        let key = (table.to_string(), key.clone());
        Ok(lookup(&mut tiers.beans, &key, self.max_age))
    }

    fn put_bean(&self, table: &str, key: PrimaryKey, row: Row) -> Result<()> {
        let mut tiers = self.lock()?;
        tiers.beans.put((table.to_string(), key), Entry::new(row));
        Ok(())
    }

    fn del_bean(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        let mut tiers = self.lock()?;
        tiers.beans.pop(&(table.to_string(), key.clone()));
        Ok(())
    }

    fn clear_ids(&self, table: &str) -> Result<()> {
        let mut tiers = self.lock()?;
        purge_table(&mut tiers.ids, table);
        Ok(())
    }

    fn clear_beans(&self, table: &str) -> Result<()> {
        let mut tiers = self.lock()?;
        purge_table(&mut tiers.beans, table);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let mut tiers = self.lock()?;
        tiers.ids.clear();
        tiers.beans.clear();
        Ok(())
    }
}
