/**
 * Watch-driven cache facade
 *
 * Controllers declare their interest before `start()`, await `ready()`, and
 * then read the local mirror without network round trips.
 */
use super::config::CacheConfig;
use super::index::{ObjectIndex, Snapshot};
use super::listener::{ChannelListener, CacheUpdate, SharedListener};
use super::ready::Readiness;
use super::registry::ResourceRegistry;
use super::resource::{ObjectKey, ResourceType};
use super::source::ResourceClient;
use super::stats::{CacheStats, SyncStats};
use super::sync_loop::SyncLoop;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

pub struct WatchCache {
    client: Arc<dyn ResourceClient>,
    config: CacheConfig,
    /// `None` once started; registration is closed from then on
    registry: Mutex<Option<ResourceRegistry>>,
    index: OnceLock<Arc<ObjectIndex>>,
    stats: OnceLock<Vec<Arc<RwLock<SyncStats>>>>,
    readiness: Arc<Readiness>,
}

impl WatchCache {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, config: CacheConfig) -> Self {
        Self {
            client,
            config,
            registry: Mutex::new(Some(ResourceRegistry::new())),
            index: OnceLock::new(),
            stats: OnceLock::new(),
            readiness: Arc::new(Readiness::new()),
        }
    }

    /// Mirrors `resource` without attaching a listener
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` after `start()`
    pub fn watch(&self, resource: &ResourceType) -> Result<()> {
        self.with_registry(|registry| registry.declare(resource))
    }

    /// Adds a listener for `resource`; listeners run in registration order
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` after `start()`; the listener set is left unchanged
    pub fn register_interest(&self, resource: &ResourceType, listener: SharedListener) -> Result<()> {
        self.with_registry(|registry| registry.register(resource, listener))
    }

    /// Registers a channel listener and returns its receiving end
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` after `start()`
    pub fn subscribe(&self, resource: &ResourceType) -> Result<mpsc::Receiver<CacheUpdate>> {
        let (listener, rx) = ChannelListener::new(self.config.subscription_capacity);
        self.register_interest(resource, Arc::new(listener))?;
        Ok(rx)
    }

    /// Spawns one sync loop per registered type and returns immediately
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` if called twice
    pub fn start(&self) -> Result<WatchCacheHandle> {
        let registry = self
            .registry
            .lock()
            .map_err(|_| Error::LockPoisoned("registry lock poisoned".to_string()))?
            .take()
            .ok_or(Error::AlreadyStarted)?;

        let index = Arc::new(ObjectIndex::with_types(registry.types()));
        self.readiness.begin(registry.types());

        let mut all_stats = Vec::with_capacity(registry.len());
        let mut loops = Vec::with_capacity(registry.len());
        for (resource, listeners) in registry.into_entries() {
            let Some(store) = index.store(&resource) else {
                continue;
            };
            let stats = Arc::new(RwLock::new(SyncStats::new(resource.clone())));
            all_stats.push(stats.clone());
            loops.push(SyncLoop::new(
                resource,
                self.client.clone(),
                store,
                listeners,
                stats,
                self.config.backoff.clone(),
            ));
        }

        // Publish the index before any loop can report readiness
        if self.index.set(index).is_err() || self.stats.set(all_stats).is_err() {
            return Err(Error::AlreadyStarted);
        }

        let task_handles: Vec<JoinHandle<()>> = loops
            .into_iter()
            .map(|sync| {
                let readiness = self.readiness.clone();
                tokio::spawn(async move {
                    sync.run(readiness).await;
                })
            })
            .collect();

        info!("🔍 Watch cache started for {} resource type(s)", task_handles.len());
        Ok(WatchCacheHandle { task_handles })
    }

    /// Resolves once every registered type has completed its first full list.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitialList` if any type's first list failed
    pub async fn ready(&self) -> Result<()> {
        self.readiness.wait().await
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.index.get().is_some()
    }

    /// Current snapshot of one object, straight from memory
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the type is not mirrored, the object is not
    /// cached, or the cache has not listed it yet
    pub fn read(&self, resource: &ResourceType, key: &ObjectKey) -> Result<Snapshot> {
        match self.index.get() {
            Some(index) => index.get(resource, key),
            None => Err(Error::NotFound {
                resource: resource.clone(),
                key: key.clone(),
            }),
        }
    }

    /// All cached objects of a type, ordered by key; empty before the first list
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock was poisoned
    pub fn list(&self, resource: &ResourceType) -> Result<Vec<Snapshot>> {
        match self.index.get().and_then(|index| index.store(resource)) {
            Some(store) => store.snapshot(),
            None => Ok(Vec::new()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let types = self
            .stats
            .get()
            .map(|all| {
                all.iter()
                    .filter_map(|stats| stats.read().ok().map(|s| s.clone()))
                    .collect()
            })
            .unwrap_or_default();
        CacheStats {
            started: self.is_started(),
            types,
        }
    }

    fn with_registry(&self, f: impl FnOnce(&mut ResourceRegistry)) -> Result<()> {
        let mut guard = self
            .registry
            .lock()
            .map_err(|_| Error::LockPoisoned("registry lock poisoned".to_string()))?;
        let registry = guard.as_mut().ok_or(Error::AlreadyStarted)?;
        f(registry);
        Ok(())
    }
}

/// Handle to the spawned sync tasks
pub struct WatchCacheHandle {
    task_handles: Vec<JoinHandle<()>>,
}

impl WatchCacheHandle {
    /// Abort all sync tasks
    pub fn shutdown(self) {
        for handle in self.task_handles {
            handle.abort();
        }
    }

    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.task_handles.iter().filter(|h| !h.is_finished()).count()
    }
}
