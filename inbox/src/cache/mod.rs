//! Partitioned inbox cache
//!
//! The updater never reaches for a global store: it is handed a
//! [`PartitionStore`] and works through three operations, read, write and
//! revert. [`MemoryCache`] is the in-process implementation.

mod patch;

pub use patch::{Patch, PatchSet};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::message::Message;
use crate::partition::PartitionKey;

/// Edit applied to one partition: gets the current list and returns the
/// replacement, or `None` to leave the partition as it is.
pub type PartitionEdit<'a> = &'a mut dyn FnMut(&[Message]) -> Option<Vec<Message>>;

/// Store of cached inbox partitions
pub trait PartitionStore: Send + Sync {
    /// Current message list of a partition, `None` if it is not cached.
    fn read_partition(&self, key: &PartitionKey) -> Option<Arc<Vec<Message>>>;

    /// Replace the message list of a cached partition with the result of
    /// `edit`, atomically: no other write can land between the read `edit`
    /// sees and the write of its result.
    ///
    /// Returns the undo handle, or `None` without writing anything when the
    /// partition is not cached or `edit` declines to change it.
    fn update_partition(&self, key: &PartitionKey, edit: PartitionEdit<'_>) -> Option<Patch>;

    /// Undo a previous update.
    fn revert(&self, patch: Patch);
}

/// Serializable copy of a whole cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub partitions: Vec<PartitionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub key: PartitionKey,
    pub messages: Vec<Message>,
}

/// In-memory partition store.
///
/// Lists are copy-on-write: a write installs a new `Arc`, so readers holding
/// an older list never observe a half-applied change.
pub struct MemoryCache {
    partitions: RwLock<HashMap<PartitionKey, Arc<Vec<Message>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Build a cache holding the partitions of a snapshot
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let cache = Self::new();
        for partition in snapshot.partitions {
            cache.insert(partition.key, partition.messages);
        }
        cache
    }

    /// Cache the result of a partition query, replacing any previous one.
    pub fn insert(&self, key: PartitionKey, messages: Vec<Message>) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions.insert(key, Arc::new(messages));
    }

    /// Drop a partition from the cache. Pending patches on it become no-ops.
    pub fn remove(&self, key: &PartitionKey) -> Option<Arc<Vec<Message>>> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions.remove(key)
    }

    pub fn contains(&self, key: &PartitionKey) -> bool {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.contains_key(key)
    }

    /// All cached partition keys, ordered
    pub fn keys(&self) -> Vec<PartitionKey> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<PartitionKey> = partitions.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Number of unread messages in a partition
    pub fn unread_count(&self, key: &PartitionKey) -> Option<usize> {
        self.read_partition(key)
            .map(|messages| messages.iter().filter(|m| !m.read).count())
    }

    /// Copy every partition, ordered by key
    pub fn snapshot(&self) -> CacheSnapshot {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        let mut partitions: Vec<PartitionSnapshot> = partitions
            .iter()
            .map(|(key, messages)| PartitionSnapshot {
                key: *key,
                messages: messages.as_ref().clone(),
            })
            .collect();
        partitions.sort_by_key(|p| p.key);
        CacheSnapshot { partitions }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionStore for MemoryCache {
    fn read_partition(&self, key: &PartitionKey) -> Option<Arc<Vec<Message>>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.get(key).cloned()
    }

    fn update_partition(&self, key: &PartitionKey, edit: PartitionEdit<'_>) -> Option<Patch> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);

        let Some(slot) = partitions.get_mut(key) else {
            debug!("{} is not cached, skipping write", key);
            return None;
        };

        let after = Arc::new(edit(&slot[..])?);
        let before = std::mem::replace(slot, after.clone());
        debug!("{}: {} -> {} messages", key, before.len(), after.len());

        Some(Patch::new(*key, before, after))
    }

    fn revert(&self, patch: Patch) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);

        let Some(slot) = partitions.get_mut(patch.key()) else {
            warn!("{} was evicted before revert, nothing to restore", patch.key());
            return;
        };

        let restored = patch.undo_onto(slot);
        debug!(
            "{}: reverted {} -> {} messages",
            patch.key(),
            slot.len(),
            restored.len()
        );
        *slot = restored;
    }
}
