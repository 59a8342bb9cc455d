//! Connection registry - named cache definitions and their store handles.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{Connection, ConnectionParams, Connector, REDACTED};
use crate::engine::keys::NAME_FORBIDDEN;
use crate::error::{CacheError, Result};

// == New Definition ==
/// Everything needed to create a cache definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCacheDefinition {
    pub name: String,
    /// Default TTL in seconds for every key populated through this cache
    pub ttl: u64,
    pub params: ConnectionParams,
}

impl NewCacheDefinition {
    /// Rejects parameters that can never produce a working definition.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::InvalidConfig("cache name cannot be empty".to_string()));
        }
        // Any ':' in a name could let one cache's prefix cover another's keys.
        if self.name.contains(NAME_FORBIDDEN) {
            return Err(CacheError::InvalidConfig(format!(
                "cache name cannot contain '{}'",
                NAME_FORBIDDEN
            )));
        }
        if self.ttl == 0 {
            return Err(CacheError::InvalidConfig("invalid default TTL".to_string()));
        }
        if self.params.port == 0 {
            return Err(CacheError::InvalidConfig("invalid dbport number".to_string()));
        }
        Ok(())
    }
}

// == Cache Definition ==
/// A named cache bound to one backing-store connection.
pub struct CacheDefinition {
    id: u64,
    name: String,
    ttl: u64,
    params: ConnectionParams,
    created_at: DateTime<Utc>,
    /// Store handle; `None` once closed. Held for the whole of a fetch, which
    /// serializes fetches per definition.
    handle: Mutex<Option<Box<dyn Connection>>>,
    retired: AtomicBool,
}

impl CacheDefinition {
    fn new(
        id: u64,
        new_definition: NewCacheDefinition,
        connection: Option<Box<dyn Connection>>,
    ) -> Self {
        Self {
            id,
            name: new_definition.name,
            ttl: new_definition.ttl,
            params: new_definition.params,
            created_at: Utc::now(),
            handle: Mutex::new(connection),
            retired: AtomicBool::new(false),
        }
    }

    /// Process-unique identity; differs between a deleted definition and a
    /// later one created under the same name.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub(crate) fn handle(&self) -> &Mutex<Option<Box<dyn Connection>>> {
        &self.handle
    }

    /// True once the definition has been removed from the registry.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Pings the store handle. Blocking.
    pub fn ping(&self) -> bool {
        self.handle
            .lock()
            .as_mut()
            .map(|connection| connection.ping())
            .unwrap_or(false)
    }

    /// Closes the store handle, waiting for any fetch using it. Blocking.
    pub fn close(&self) {
        if let Some(connection) = self.handle.lock().take() {
            connection.close();
            debug!(cache = %self.name, "store handle closed");
        }
    }

    /// Read-back with the password redacted.
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            name: self.name.clone(),
            host: self.params.host.clone(),
            port: self.params.port,
            database: self.params.database.clone(),
            user: self.params.user.clone(),
            password: REDACTED.to_string(),
            ttl: self.ttl,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl std::fmt::Debug for CacheDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("params", &self.params)
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Public view of a cache definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ttl: u64,
    pub created_at: String,
}

// == Connection Registry ==
#[derive(Default)]
struct RegistryInner {
    /// Definitions in creation order
    definitions: Vec<Arc<CacheDefinition>>,
    /// Names whose creation is in progress
    reserved: HashSet<String>,
}

impl RegistryInner {
    fn position(&self, name: &str) -> Option<usize> {
        self.definitions.iter().position(|d| d.name == name)
    }
}

/// Ordered, mutex-guarded collection of cache definitions.
///
/// The lock only covers in-memory bookkeeping; connecting and closing happen
/// outside it.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    inner: Mutex<RegistryInner>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        info!("Connection registry initialized");
        Self {
            connector,
            inner: Mutex::new(RegistryInner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Connector used to open (and reopen) store handles.
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    // == Create ==
    /// Validates, connects, and registers a new definition.
    ///
    /// The name is reserved before connecting, so a concurrent create of the
    /// same name fails with `DuplicateName` rather than racing the insert.
    pub async fn create(&self, new_definition: NewCacheDefinition) -> Result<Arc<CacheDefinition>> {
        new_definition.validate()?;

        let reservation = self.reserve(&new_definition.name)?;

        let connector = Arc::clone(&self.connector);
        let params = new_definition.params.clone();
        let mut opened = tokio::task::spawn_blocking(move || {
            connector.connect(&params).map(OpenedConnection::new)
        })
        .await
        .map_err(|e| CacheError::Resource(format!("connect task failed: {}", e)))??;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let definition = Arc::new(CacheDefinition::new(id, new_definition, opened.take()));
        reservation.commit(Arc::clone(&definition));

        info!(cache = %definition.name, ttl = definition.ttl, "cache definition created");
        Ok(definition)
    }

    fn reserve(&self, name: &str) -> Result<Reservation<'_>> {
        let mut inner = self.inner.lock();
        if inner.position(name).is_some() || inner.reserved.contains(name) {
            return Err(CacheError::DuplicateName(name.to_string()));
        }
        inner.reserved.insert(name.to_string());
        Ok(Reservation {
            registry: self,
            name: name.to_string(),
        })
    }

    // == Find ==
    pub fn find(&self, name: &str) -> Result<Arc<CacheDefinition>> {
        let inner = self.inner.lock();
        inner
            .position(name)
            .map(|i| Arc::clone(&inner.definitions[i]))
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    // == List ==
    /// Names in creation order.
    pub fn list(&self) -> Vec<String> {
        self.inner
            .lock()
            .definitions
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    // == Info ==
    pub fn info(&self, name: &str) -> Result<CacheInfo> {
        self.find(name).map(|d| d.info())
    }

    // == Remove ==
    /// Unregisters and retires a definition. Does not flush or close it.
    pub fn remove(&self, name: &str) -> Result<Arc<CacheDefinition>> {
        let mut inner = self.inner.lock();
        let index = inner
            .position(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        let definition = inner.definitions.remove(index);
        definition.retire();
        debug!(cache = %name, "cache definition removed from registry");
        Ok(definition)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().definitions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("caches", &self.list())
            .finish()
    }
}

/// A freshly opened store handle not yet owned by a definition.
///
/// Closed on drop, so a create abandoned while connecting still closes the
/// handle once the connect finishes.
struct OpenedConnection(Option<Box<dyn Connection>>);

impl OpenedConnection {
    fn new(connection: Box<dyn Connection>) -> Self {
        Self(Some(connection))
    }

    fn take(&mut self) -> Option<Box<dyn Connection>> {
        self.0.take()
    }
}

impl Drop for OpenedConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.0.take() {
            connection.close();
            debug!("abandoned store handle closed");
        }
    }
}

/// Holds a reserved name until the definition is inserted or creation fails.
struct Reservation<'a> {
    registry: &'a ConnectionRegistry,
    name: String,
}

impl Reservation<'_> {
    fn commit(self, definition: Arc<CacheDefinition>) {
        let mut inner = self.registry.inner.lock();
        inner.reserved.remove(&self.name);
        inner.definitions.push(definition);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.inner.lock().reserved.remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::MemoryBackend;

    fn new_definition(name: &str) -> NewCacheDefinition {
        NewCacheDefinition {
            name: name.to_string(),
            ttl: 60,
            params: ConnectionParams {
                host: "db.local".to_string(),
                port: 3306,
                database: "shop".to_string(),
                user: "ro".to_string(),
                password: "pw".to_string(),
            },
        }
    }

    fn registry() -> (ConnectionRegistry, MemoryBackend) {
        let backend = MemoryBackend::new();
        (ConnectionRegistry::new(Arc::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (registry, backend) = registry();

        let definition = registry.create(new_definition("orders")).await.unwrap();
        assert_eq!(definition.name(), "orders");
        assert_eq!(definition.ttl(), 60);
        assert_eq!(backend.connects(), 1);

        let found = registry.find("orders").unwrap();
        assert_eq!(found.id(), definition.id());
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected() {
        let (registry, _backend) = registry();
        let first = registry.create(new_definition("orders")).await.unwrap();

        let result = registry.create(new_definition("orders")).await;
        assert!(matches!(result, Err(CacheError::DuplicateName(_))));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("orders").unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_winner() {
        let (registry, _backend) = registry();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.create(new_definition("orders")).await }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, CacheError::DuplicateName(_))),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(registry.list(), vec!["orders"]);
    }

    #[tokio::test]
    async fn test_invalid_parameters() {
        let (registry, backend) = registry();

        let mut zero_ttl = new_definition("a");
        zero_ttl.ttl = 0;
        assert_eq!(
            registry.create(zero_ttl).await.unwrap_err(),
            CacheError::InvalidConfig("invalid default TTL".to_string())
        );

        let mut zero_port = new_definition("b");
        zero_port.params.port = 0;
        assert!(matches!(
            registry.create(zero_port).await,
            Err(CacheError::InvalidConfig(_))
        ));

        for name in ["a::b", "a:", ":a", "a:b"] {
            assert!(matches!(
                registry.create(new_definition(name)).await,
                Err(CacheError::InvalidConfig(_))
            ));
        }

        assert_eq!(backend.connects(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_releases_name() {
        let (registry, backend) = registry();
        backend.set_reachable(false);

        let result = registry.create(new_definition("orders")).await;
        assert!(matches!(result, Err(CacheError::Connect(_))));
        assert!(registry.is_empty());

        backend.set_reachable(true);
        assert!(registry.create(new_definition("orders")).await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_create_closes_connection() {
        let (registry, backend) = registry();
        backend.set_connect_latency(Duration::from_millis(200));

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            registry.create(new_definition("orders")),
        )
        .await;
        assert!(result.is_err());
        assert!(registry.is_empty());

        // Let the connect finish on its blocking thread
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.connects(), 1);
        assert_eq!(backend.closed(), 1);

        backend.set_connect_latency(Duration::ZERO);
        assert!(registry.create(new_definition("orders")).await.is_ok());
        assert_eq!(backend.closed(), 1);
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let (registry, _backend) = registry();
        for name in ["zeta", "alpha", "mid"] {
            registry.create(new_definition(name)).await.unwrap();
        }
        assert_eq!(registry.list(), vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_info_redacts_password() {
        let (registry, _backend) = registry();
        registry.create(new_definition("orders")).await.unwrap();

        let info = registry.info("orders").unwrap();
        assert_eq!(info.password, REDACTED);
        assert_eq!(info.host, "db.local");
        assert_eq!(info.port, 3306);
    }

    #[tokio::test]
    async fn test_remove_retires() {
        let (registry, _backend) = registry();
        registry.create(new_definition("orders")).await.unwrap();

        let removed = registry.remove("orders").unwrap();
        assert!(removed.is_retired());
        assert!(matches!(registry.find("orders"), Err(CacheError::NotFound(_))));
        assert!(matches!(registry.remove("orders"), Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_close_and_ping() {
        let (registry, backend) = registry();
        let definition = registry.create(new_definition("orders")).await.unwrap();

        assert!(definition.ping());
        definition.close();
        assert!(!definition.ping());
        assert_eq!(backend.closed(), 1);

        // Closing twice is a no-op.
        definition.close();
        assert_eq!(backend.closed(), 1);
    }
}
