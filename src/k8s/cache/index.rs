/**
 * In-memory object index
 *
 * Two levels: resource type → object key → latest snapshot. The outer map is
 * fixed when the cache starts, each type's inner map sits behind its own lock
 * and is only written by that type's sync loop.
 */
use super::resource::{ObjectKey, ResourceType};
use crate::error::{Error, Result};
use kube::api::DynamicObject;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

pub type Snapshot = Arc<DynamicObject>;

/// Objects of a single resource type
#[derive(Debug, Default)]
pub struct TypeStore {
    objects: RwLock<HashMap<ObjectKey, Snapshot>>,
}

impl TypeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every entry with the contents of an authoritative list.
    /// Returns the snapshots the list no longer contains, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn replace_all(&self, items: Vec<DynamicObject>) -> Result<Vec<Snapshot>> {
        let fresh: HashMap<ObjectKey, Snapshot> = items
            .into_iter()
            .map(|obj| (ObjectKey::from_object(&obj), Arc::new(obj)))
            .collect();
        let mut objects = self.write()?;
        let previous = std::mem::replace(&mut *objects, fresh);

        let mut removed: Vec<(ObjectKey, Snapshot)> = previous
            .into_iter()
            .filter(|(key, _)| !objects.contains_key(key))
            .collect();
        removed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(removed.into_iter().map(|(_, obj)| obj).collect())
    }

    /// Inserts or fully replaces the snapshot stored under the object's key
    ///
    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn upsert(&self, obj: DynamicObject) -> Result<Snapshot> {
        let key = ObjectKey::from_object(&obj);
        let snapshot = Arc::new(obj);
        self.write()?.insert(key, snapshot.clone());
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn remove(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
        Ok(self.write()?.remove(key))
    }

    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn get(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
        Ok(self.read()?.get(key).cloned())
    }

    /// All snapshots, ordered by key
    ///
    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn snapshot(&self) -> Result<Vec<Snapshot>> {
        let objects = self.read()?;
        let mut entries: Vec<(&ObjectKey, &Snapshot)> = objects.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Ok(entries.into_iter().map(|(_, obj)| obj.clone()).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the lock was poisoned
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ObjectKey, Snapshot>>> {
        self.objects
            .read()
            .map_err(|_| Error::LockPoisoned("object index read lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ObjectKey, Snapshot>>> {
        self.objects
            .write()
            .map_err(|_| Error::LockPoisoned("object index write lock poisoned".to_string()))
    }
}

/// The index across all registered types
#[derive(Debug, Default)]
pub struct ObjectIndex {
    stores: HashMap<ResourceType, Arc<TypeStore>>,
}

impl ObjectIndex {
    /// Creates an empty store for each type
    pub fn with_types<'a>(types: impl IntoIterator<Item = &'a ResourceType>) -> Self {
        let stores = types
            .into_iter()
            .map(|rt| (rt.clone(), Arc::new(TypeStore::new())))
            .collect();
        Self { stores }
    }

    #[must_use]
    pub fn store(&self, resource: &ResourceType) -> Option<Arc<TypeStore>> {
        self.stores.get(resource).cloned()
    }

    /// Looks up one object, failing with `NotFound` for unknown types and keys
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when nothing is cached under the key
    pub fn get(&self, resource: &ResourceType, key: &ObjectKey) -> Result<Snapshot> {
        let found = match self.stores.get(resource) {
            Some(store) => store.get(key)?,
            None => None,
        };
        found.ok_or_else(|| {
            debug!("❌ Cache MISS: {} {}", resource, key);
            Error::NotFound {
                resource: resource.clone(),
                key: key.clone(),
            }
        })
    }
}
