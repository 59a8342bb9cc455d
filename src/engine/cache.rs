//! Cache engine - lookups, population, and administration.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};

use crate::backend::Connector;
use crate::config::Config;
use crate::engine::gate::{BlockingGate, FetchKey, PendingFetch, Resolution};
use crate::engine::keys;
use crate::engine::registry::{CacheDefinition, CacheInfo, ConnectionRegistry, NewCacheDefinition};
use crate::engine::stats::CacheStats;
use crate::engine::worker::{self, ColumnMeta, FetchedResultSet};
use crate::error::{CacheError, Result};
use crate::kv::{deadline_after, KvStore, MAX_KEY_LENGTH};

// == Cached Result Set ==
/// A result set as read back from the key-value store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<String>,
}

struct EngineInner {
    registry: ConnectionRegistry,
    kv: Arc<RwLock<KvStore>>,
    gate: BlockingGate,
    workers: Arc<Semaphore>,
    stats: Mutex<CacheStats>,
}

// == Cache Engine ==
/// Self-populating cache over every registered definition.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

impl CacheEngine {
    pub fn new(connector: Arc<dyn Connector>, kv: Arc<RwLock<KvStore>>, config: &Config) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry: ConnectionRegistry::new(connector),
                kv,
                gate: BlockingGate::new(config.fetch_timeout()),
                workers: Arc::new(Semaphore::new(config.max_fetch_workers)),
                stats: Mutex::new(CacheStats::new()),
            }),
        }
    }

    /// Shared key-value store.
    pub fn kv(&self) -> Arc<RwLock<KvStore>> {
        Arc::clone(&self.inner.kv)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    // == Administration ==
    pub async fn create(&self, new_definition: NewCacheDefinition) -> Result<CacheInfo> {
        let definition = self.inner.registry.create(new_definition).await?;
        Ok(definition.info())
    }

    pub fn list(&self) -> Vec<String> {
        self.inner.registry.list()
    }

    pub fn info(&self, name: &str) -> Result<CacheInfo> {
        self.inner.registry.info(name)
    }

    /// Pings the definition's store handle on a blocking thread.
    pub async fn test(&self, name: &str) -> Result<bool> {
        let definition = self.inner.registry.find(name)?;
        let alive = tokio::task::spawn_blocking(move || definition.ping())
            .await
            .map_err(|e| CacheError::Resource(format!("ping task failed: {}", e)))?;
        debug!(cache = %name, alive, "store handle tested");
        Ok(alive)
    }

    /// Removes every cached key belonging to `name`. Returns the number removed.
    ///
    /// A fetch already in flight for `name` is not cancelled and still commits
    /// its result once it finishes, after the flush.
    pub async fn flush(&self, name: &str) -> Result<usize> {
        let definition = self.inner.registry.find(name)?;
        let removed = self
            .inner
            .kv
            .write()
            .await
            .delete_prefix(&keys::prefix(definition.name()));
        info!(cache = %name, removed, "cache flushed");
        Ok(removed)
    }

    /// Unregisters `name`, flushes its keys, then closes its store handle.
    ///
    /// Fetches still in flight for the definition see it retired and discard
    /// their results, so nothing is left behind under its prefix.
    pub async fn delete(&self, name: &str) -> Result<usize> {
        let definition = self.inner.registry.remove(name)?;

        let removed = self
            .inner
            .kv
            .write()
            .await
            .delete_prefix(&keys::prefix(definition.name()));

        let closing = Arc::clone(&definition);
        tokio::task::spawn_blocking(move || closing.close())
            .await
            .map_err(|e| CacheError::Resource(format!("close task failed: {}", e)))?;

        info!(cache = %name, removed, "cache definition deleted");
        Ok(removed)
    }

    // == Lookups ==
    /// Rows for `query`, populating the cache on a miss.
    pub async fn get_value(&self, name: &str, query: &str) -> Result<Vec<String>> {
        self.get(name, query).await.map(|result| result.rows)
    }

    /// Schema for `query`, populating the cache on a miss.
    pub async fn get_meta(&self, name: &str, query: &str) -> Result<Vec<ColumnMeta>> {
        self.get(name, query).await.map(|result| result.columns)
    }

    /// Schema and rows for `query`, populating the cache on a miss.
    ///
    /// The store is re-read exactly once after a population; an empty result
    /// at that point is returned as-is.
    pub async fn get(&self, name: &str, query: &str) -> Result<CachedResultSet> {
        let definition = self.inner.registry.find(name)?;

        // Such a result could never be stored, so don't fetch it.
        if keys::value_key(definition.name(), query).len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "query too long: cache keys are limited to {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if let Some(hit) = self.lookup(&definition, query).await {
            self.inner.stats.lock().record_hit();
            debug!(cache = %name, "cache hit");
            return Ok(hit);
        }

        self.inner.stats.lock().record_miss();
        debug!(cache = %name, "cache miss");

        self.populate(Arc::clone(&definition), query).await?;

        Ok(self.lookup(&definition, query).await.unwrap_or_default())
    }

    /// Reads both keys at one instant. A missing schema record is a miss,
    /// whatever the row record holds.
    async fn lookup(&self, definition: &CacheDefinition, query: &str) -> Option<CachedResultSet> {
        let meta_key = keys::meta_key(definition.name(), query);
        let value_key = keys::value_key(definition.name(), query);

        let mut lists = self
            .inner
            .kv
            .write()
            .await
            .lrange_many(&[meta_key.as_str(), value_key.as_str()]);

        let rows = lists.pop().unwrap_or_default();
        let schema = lists.pop().unwrap_or_default();
        if schema.is_empty() {
            return None;
        }

        Some(CachedResultSet {
            columns: ColumnMeta::decode_schema(schema),
            rows,
        })
    }

    // == Population ==
    async fn populate(&self, definition: Arc<CacheDefinition>, query: &str) -> Result<()> {
        let key = FetchKey::new(definition.id(), keys::meta_key(definition.name(), query));
        let engine = self.clone();
        let owned_query = query.to_string();

        let waited = self
            .inner
            .gate
            .block_on(key, move |pending| {
                engine.dispatch(definition, owned_query, pending)
            })
            .await;

        match waited {
            Ok(Resolution::Led) => Ok(()),
            Ok(Resolution::Joined) => {
                self.inner.stats.lock().record_joined();
                Ok(())
            }
            Err(CacheError::Timeout(key)) => {
                self.inner.stats.lock().record_timeout();
                Err(CacheError::Timeout(key))
            }
            Err(err) => Err(err),
        }
    }

    /// Starts a detached fetch task. It runs to completion whether or not
    /// anyone is still waiting on it.
    fn dispatch(&self, definition: Arc<CacheDefinition>, query: String, pending: PendingFetch) {
        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = engine.fetch_and_store(&definition, &query).await;
            if let Err(err) = &outcome {
                engine.inner.stats.lock().record_fetch_failure();
                warn!(cache = %definition.name(), error = %err, "population failed");
            }
            pending.resolve(outcome);
        });
    }

    async fn fetch_and_store(&self, definition: &Arc<CacheDefinition>, query: &str) -> Result<()> {
        let _permit = Arc::clone(&self.inner.workers)
            .acquire_owned()
            .await
            .map_err(|e| CacheError::Resource(format!("fetch worker pool closed: {}", e)))?;

        let connector = self.inner.registry.connector();
        let worker_definition = Arc::clone(definition);
        let worker_query = query.to_string();
        let fetched = tokio::task::spawn_blocking(move || {
            worker::fetch(connector.as_ref(), &worker_definition, &worker_query)
        })
        .await
        .map_err(|e| CacheError::Resource(format!("fetch worker failed: {}", e)))??;

        self.store(definition, query, fetched).await
    }

    /// Replaces the cached result set for `query`. Schema and rows are written
    /// under one write lock and share one deadline.
    async fn store(
        &self,
        definition: &CacheDefinition,
        query: &str,
        fetched: FetchedResultSet,
    ) -> Result<()> {
        let meta_key = keys::meta_key(definition.name(), query);
        let value_key = keys::value_key(definition.name(), query);
        let row_count = fetched.rows.len();

        let mut kv = self.inner.kv.write().await;

        // Deleted mid-fetch: the prefix has been or is about to be flushed.
        if definition.is_retired() {
            return Err(CacheError::NotFound(definition.name().to_string()));
        }

        kv.del(&meta_key);
        kv.del(&value_key);

        let schema = ColumnMeta::encode_schema(&fetched.columns);
        if schema.is_empty() {
            debug!(cache = %definition.name(), "query returned no columns, nothing cached");
            return Ok(());
        }

        let deadline = deadline_after(definition.ttl());
        if let Err(err) = write_result_set(&mut kv, &meta_key, &value_key, schema, fetched.rows, deadline) {
            kv.del(&meta_key);
            kv.del(&value_key);
            return Err(err);
        }
        drop(kv);

        self.inner.stats.lock().record_population();
        debug!(cache = %definition.name(), rows = row_count, ttl = definition.ttl(), "result set cached");
        Ok(())
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let total_keys = self.inner.kv.read().await.len();
        let mut stats = self.inner.stats.lock().clone();
        stats.set_total_keys(total_keys);
        stats
    }
}

fn write_result_set(
    kv: &mut KvStore,
    meta_key: &str,
    value_key: &str,
    schema: Vec<String>,
    rows: Vec<String>,
    deadline: u64,
) -> Result<()> {
    if !rows.is_empty() {
        kv.rpush(value_key, rows)?;
        kv.expire_at(value_key, deadline);
    }
    kv.rpush(meta_key, schema)?;
    kv.expire_at(meta_key, deadline);
    Ok(())
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("registry", &self.inner.registry)
            .field("gate", &self.inner.gate)
            .finish()
    }
}
