//! Storage backends for the account store

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use std::sync::Arc;

use crate::account::store::{AccountStore, StoreResult};
use crate::config::{StorageBackend, StorageConfig};

/// Open the backend named in the configuration
pub fn open(config: &StorageConfig) -> StoreResult<Arc<dyn AccountStore>> {
    match config.backend {
        StorageBackend::Sled => Ok(Arc::new(SledStore::open(&config.path)?)),
        StorageBackend::Memory => {
            tracing::warn!("Persistence: using in-memory store, nothing will survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
