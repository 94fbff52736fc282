//! Directory of chunk caches keyed by (world, encoding profile).
//!
//! The directory hands out one cache per world and profile. Instances start
//! untagged; [`CacheDirectory::migrate`] swaps a default instance for a
//! partition-tagged successor that inherits its entries and counters, in one
//! critical section, so no caller can reach the old instance afterwards.
//!
//! Lock order is directory first, then a cache's entry lock. The request path
//! only ever takes the entry lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::compression::{Compressor, EncodingProfile};
use crate::error::MigrationError;
use crate::partition::PartitionTag;
use crate::world::{ChunkSource, WorldId};

use super::chunk_cache::{CacheStats, ChunkCache};
use super::task::TaskPool;

type DirectoryKey = (WorldId, EncodingProfile);

/// Result of a successful [`CacheDirectory::migrate`] call.
pub enum Migration<W: ChunkSource> {
    /// A default instance was replaced by a tagged successor
    Migrated(Arc<ChunkCache<W>>),

    /// The instance already carried the requested tag; nothing changed
    AlreadyTagged(Arc<ChunkCache<W>>),
}

impl<W: ChunkSource> Migration<W> {
    /// The instance now registered in the directory.
    pub fn instance(&self) -> &Arc<ChunkCache<W>> {
        match self {
            Self::Migrated(cache) | Self::AlreadyTagged(cache) => cache,
        }
    }

    /// Whether state was actually moved.
    pub fn performed(&self) -> bool {
        matches!(self, Self::Migrated(_))
    }
}

/// Registry of chunk caches.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use chunk_streamer::cache::{CacheDirectory, DeferredTaskPool};
/// use chunk_streamer::compression::{Compressor, ZlibCompressor};
/// use chunk_streamer::partition::PartitionTag;
/// use chunk_streamer::world::{ChunkSource, MemoryWorld};
///
/// let world = Arc::new(MemoryWorld::new("nether_world"));
/// world.set_chunk(0, 0, vec![Bytes::from_static(b"section")], Bytes::new());
/// let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::default());
///
/// let directory = CacheDirectory::new(Arc::new(DeferredTaskPool::new()));
/// let promise = directory.instance(&world, &compressor).request(0, 0).unwrap();
///
/// let migration = directory
///     .migrate(world.id(), &compressor.profile(), PartitionTag::NETHER)
///     .unwrap();
/// let tagged = directory.instance(&world, &compressor);
/// assert!(Arc::ptr_eq(&tagged, migration.instance()));
/// assert!(tagged.request(0, 0).unwrap().same_as(&promise));
/// ```
pub struct CacheDirectory<W: ChunkSource> {
    /// Pool handed to every cache the directory creates
    pool: Arc<dyn TaskPool>,

    /// Registered caches
    instances: Mutex<HashMap<DirectoryKey, Arc<ChunkCache<W>>>>,
}

impl<W: ChunkSource> CacheDirectory<W> {
    /// Create an empty directory whose caches submit to `pool`.
    pub fn new(pool: Arc<dyn TaskPool>) -> Self {
        Self {
            pool,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cache for `world` and `compressor`, creating a default one if
    /// none is registered.
    pub fn instance(
        &self,
        world: &Arc<W>,
        compressor: &Arc<dyn Compressor>,
    ) -> Arc<ChunkCache<W>> {
        let key = (world.id(), compressor.profile());
        let mut instances = self.instances.lock();
        instances
            .entry(key)
            .or_insert_with(|| {
                debug!(world = world.name(), profile = %key.1, "creating chunk cache");
                Arc::new(ChunkCache::new(
                    world.clone(),
                    compressor.clone(),
                    self.pool.clone(),
                ))
            })
            .clone()
    }

    /// Get the registered cache, if any.
    pub fn get(&self, world: WorldId, profile: &EncodingProfile) -> Option<Arc<ChunkCache<W>>> {
        self.instances.lock().get(&(world, *profile)).cloned()
    }

    /// Register a partition-tagged instance.
    ///
    /// Returns the previous occupant, if any. The occupant must already be
    /// retired (or be `instance` itself), so two live caches never own entries
    /// for the same key.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::TagMismatch`] if `instance` is not tagged `partition`
    /// - [`MigrationError::WrongKey`] if `instance` belongs to another world or
    ///   profile
    /// - [`MigrationError::Occupied`] if a live, different instance is
    ///   registered
    pub fn set(
        &self,
        world: WorldId,
        profile: &EncodingProfile,
        partition: PartitionTag,
        instance: Arc<ChunkCache<W>>,
    ) -> Result<Option<Arc<ChunkCache<W>>>, MigrationError> {
        if instance.partition() != Some(partition) {
            return Err(MigrationError::TagMismatch {
                expected: partition,
                actual: instance.partition(),
            });
        }
        if instance.world_id() != world || instance.profile() != *profile {
            return Err(MigrationError::WrongKey {
                world,
                profile: profile.to_string(),
            });
        }

        let mut instances = self.instances.lock();
        let key = (world, *profile);
        if let Some(existing) = instances.get(&key) {
            if !existing.is_retired() && !Arc::ptr_eq(existing, &instance) {
                return Err(MigrationError::Occupied {
                    world,
                    profile: profile.to_string(),
                });
            }
        }
        Ok(instances.insert(key, instance))
    }

    /// Replace the default cache for (world, profile) with a tagged successor
    /// carrying all of its state.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NotFound`] if no cache is registered
    /// - [`MigrationError::PartitionConflict`] if the cache is tagged differently
    /// - [`MigrationError::DonorRetired`] if the registered cache was retired
    pub fn migrate(
        &self,
        world: WorldId,
        profile: &EncodingProfile,
        partition: PartitionTag,
    ) -> Result<Migration<W>, MigrationError> {
        let mut instances = self.instances.lock();
        let key = (world, *profile);

        let current = instances
            .get(&key)
            .cloned()
            .ok_or_else(|| MigrationError::NotFound {
                world,
                profile: profile.to_string(),
            })?;

        match current.partition() {
            Some(existing) if existing == partition => {
                return Ok(Migration::AlreadyTagged(current));
            }
            Some(existing) => {
                warn!(
                    world = current.world().name(),
                    %existing,
                    requested = %partition,
                    "refusing to re-tag partitioned chunk cache"
                );
                return Err(MigrationError::PartitionConflict {
                    existing,
                    requested: partition,
                });
            }
            None => {}
        }

        let migrated = Arc::new(ChunkCache::migrate_from(&current, partition)?);
        instances.insert(key, migrated.clone());
        Ok(Migration::Migrated(migrated))
    }

    /// All caches registered for a world.
    pub fn instances_for_world(&self, world: WorldId) -> Vec<Arc<ChunkCache<W>>> {
        self.instances
            .lock()
            .iter()
            .filter(|((id, _), _)| *id == world)
            .map(|(_, cache)| cache.clone())
            .collect()
    }

    /// Drop every cache of a world, e.g. when it is unloaded.
    ///
    /// Removed caches are retired, so handles still held elsewhere reject
    /// further requests. Returns how many caches were removed.
    pub fn remove_world(&self, world: WorldId) -> usize {
        let mut instances = self.instances.lock();
        let keys: Vec<_> = instances
            .keys()
            .filter(|(id, _)| *id == world)
            .copied()
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some(cache) = instances.remove(&key) {
                let entries = cache.retire();
                debug!(
                    world = cache.world().name(),
                    profile = %key.1,
                    entries,
                    "removed chunk cache"
                );
                removed += 1;
            }
        }
        removed
    }

    /// Clear the entries of every registered cache.
    ///
    /// Instances and their counters stay registered. Returns how many entries
    /// were dropped.
    pub fn prune(&self) -> usize {
        let caches: Vec<_> = self.instances.lock().values().cloned().collect();
        let dropped = caches.iter().map(|cache| cache.clear()).sum();
        info!(caches = caches.len(), entries = dropped, "pruned chunk caches");
        dropped
    }

    /// Counters for every registered cache.
    pub fn stats(&self) -> Vec<CacheStats> {
        let caches: Vec<_> = self.instances.lock().values().cloned().collect();
        caches.iter().map(|cache| cache.stats()).collect()
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
