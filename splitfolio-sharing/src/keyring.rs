//! Thread-safe cache of unwrapped resource keys for the current session.
//!
//! Unwrapping a resource key costs an RSA private-key operation, so the
//! share manager keeps keys here once opened. Each entry remembers the
//! wrapped key it came from; after a rotation the member's wrapped key
//! changes and the stale entry stops matching. Keys never leave memory.

use crate::error::{SharingError, SharingResult};
use crate::types::ResourceId;
use splitfolio_crypto::{SymmetricKey, WrappedKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct Entry {
    wrapped: WrappedKey,
    key: SymmetricKey,
}

#[derive(Clone)]
pub struct ResourceKeyring {
    entries: Arc<RwLock<HashMap<ResourceId, Entry>>>,
}

impl ResourceKeyring {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Caches the key unwrapped from `wrapped`, replacing any previous entry.
    pub async fn insert(&self, resource_id: ResourceId, wrapped: WrappedKey, key: SymmetricKey) {
        self.entries
            .write()
            .await
            .insert(resource_id, Entry { wrapped, key });
    }

    /// Retrieves a cloned key if it was unwrapped from this exact wrapped key.
    pub async fn get(&self, resource_id: &ResourceId, wrapped: &WrappedKey) -> SharingResult<SymmetricKey> {
        self.entries
            .read()
            .await
            .get(resource_id)
            .filter(|entry| &entry.wrapped == wrapped)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| SharingError::NotFound(format!("no key cached for resource {resource_id}")))
    }

    pub async fn remove(&self, resource_id: &ResourceId) -> Option<SymmetricKey> {
        self.entries
            .write()
            .await
            .remove(resource_id)
            .map(|entry| entry.key)
    }

    /// Drops every cached key (logout).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ResourceKeyring {
    fn default() -> Self {
        Self::new()
    }
}
