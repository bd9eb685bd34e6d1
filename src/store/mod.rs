pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::Keyspace;
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{debug, warn};

/// A thread-safe key-value store that can hold multiple collections.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens the persistent keyspace under `cache_dir`. When it cannot be
    /// opened every collection is kept in memory.
    pub fn open(cache_dir: &Path) -> Self {
        let keyspace = match fjall::Config::new(cache_dir).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(error = %e, path = %cache_dir.display(), "Persistent cache unavailable");
                None
            }
        };

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    fn create_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        if persist && let Some(keyspace) = &self.keyspace {
            match DiskCollection::open(keyspace, name) {
                Ok(collection) => return Arc::new(collection),
                Err(e) => warn!(error = %e, name, "Failed to open partition, using memory"),
            }
        }
        debug!(name, "Creating in-memory collection");
        Arc::new(MemoryCollection::new())
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(collection);
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert_with(|| self.create_collection(name, persist)),
        )
    }
}
