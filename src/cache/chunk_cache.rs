//! Per-world, per-profile cache of compressed chunk payloads.
//!
//! The cache maps a chunk's 64-bit coordinate hash to the
//! [`CompressionPromise`] for its payload. The first request for a chunk
//! (a miss) creates the promise and dispatches one encode job; every later
//! request until the chunk changes (a hit) receives the same promise.
//!
//! # Invalidation
//!
//! The cache subscribes to every chunk it is asked for. A change or unload
//! notification drops the entry unconditionally, resolved or not; an orphaned
//! in-flight job still resolves its promise but is no longer reachable from
//! the cache.
//!
//! Entries also remember the snapshot revision they were encoded from.
//! Revisions only grow, so an entry is stale only when the world now holds a
//! newer snapshot than the one it was encoded from. Such an entry is
//! recomputed, so a delayed or lost notification cannot serve an outdated
//! payload. A requester holding an older snapshot than the entry is served
//! the entry.
//!
//! # Migration
//!
//! All mutable state (entries and counters) lives in a shared core. A
//! partition-tagged cache is built from a default one by moving that core
//! with [`ChunkCache::migrate_from`]; the donor is retired in the same
//! critical section and rejects further requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::compression::{Compressor, EncodingProfile};
use crate::error::{CacheError, MigrationError};
use crate::partition::PartitionTag;
use crate::world::{chunk_hash, ChunkCoord, ChunkListener, ChunkSource, WorldId};

use super::promise::CompressionPromise;
use super::task::{ChunkRequestTask, TaskPool};

// =============================================================================
// Shared Core
// =============================================================================

struct Entry {
    promise: CompressionPromise,
    revision: u64,
}

/// Entries and counters, shared between a cache and its migration successor.
///
/// The core is also the listener registered with the world, so registrations
/// made before a migration keep invalidating the right map afterwards.
struct CacheCore {
    entries: Mutex<HashMap<u64, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCore {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn remove(&self, x: i32, z: i32) -> bool {
        let removed = self.entries.lock().remove(&chunk_hash(x, z)).is_some();
        if removed {
            trace!(x, z, "dropped cached chunk");
        }
        removed
    }
}

impl ChunkListener for CacheCore {
    fn on_chunk_changed(&self, x: i32, z: i32) {
        self.remove(x, z);
    }

    fn on_chunk_unloaded(&self, x: i32, z: i32) {
        self.remove(x, z);
    }
}

// =============================================================================
// Cache Statistics
// =============================================================================

/// Point-in-time counters for one cache instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub world: String,
    pub profile: EncodingProfile,
    pub partition: Option<PartitionTag>,
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    /// Bytes held by successfully resolved payloads
    pub cache_size: usize,
    pub hit_ratio: f64,
}

// =============================================================================
// Chunk Cache
// =============================================================================

/// Cache of compressed chunk payloads for one world and encoding profile.
///
/// # Type Parameters
///
/// * `W` - The world the chunks are read from
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use chunk_streamer::cache::{ChunkCache, DeferredTaskPool};
/// use chunk_streamer::compression::ZlibCompressor;
/// use chunk_streamer::world::MemoryWorld;
///
/// let world = Arc::new(MemoryWorld::new("world"));
/// world.set_chunk(0, 0, vec![Bytes::from(vec![0u8; 256])], Bytes::new());
///
/// let pool = Arc::new(DeferredTaskPool::new());
/// let cache = ChunkCache::new(world, Arc::new(ZlibCompressor::default()), pool.clone());
///
/// let first = cache.request(0, 0).unwrap();
/// let second = cache.request(0, 0).unwrap();
/// assert!(first.same_as(&second));
/// assert_eq!(pool.pending(), 1);
///
/// pool.run_pending();
/// assert!(first.result().unwrap().is_ok());
/// ```
pub struct ChunkCache<W: ChunkSource> {
    world: Arc<W>,
    compressor: Arc<dyn Compressor>,
    pool: Arc<dyn TaskPool>,
    partition: Option<PartitionTag>,
    core: Arc<CacheCore>,
    retired: AtomicBool,
}

impl<W: ChunkSource> ChunkCache<W> {
    /// Create a default (untagged) cache. Chunks are encoded as overworld.
    pub fn new(world: Arc<W>, compressor: Arc<dyn Compressor>, pool: Arc<dyn TaskPool>) -> Self {
        Self::build(world, compressor, pool, None, Arc::new(CacheCore::new()))
    }

    /// Create an empty cache tagged with a partition from the start.
    pub fn with_partition(
        world: Arc<W>,
        compressor: Arc<dyn Compressor>,
        pool: Arc<dyn TaskPool>,
        partition: PartitionTag,
    ) -> Self {
        Self::build(
            world,
            compressor,
            pool,
            Some(partition),
            Arc::new(CacheCore::new()),
        )
    }

    fn build(
        world: Arc<W>,
        compressor: Arc<dyn Compressor>,
        pool: Arc<dyn TaskPool>,
        partition: Option<PartitionTag>,
        core: Arc<CacheCore>,
    ) -> Self {
        Self {
            world,
            compressor,
            pool,
            partition,
            core,
            retired: AtomicBool::new(false),
        }
    }

    /// Build a partition-tagged cache that takes over all of `donor`'s state.
    ///
    /// Entries (with their promise identity), hit and miss counters, and the
    /// world/compressor/pool collaborators move to the new instance. The donor
    /// is retired in the same critical section: every later `request` on it
    /// fails with [`CacheError::Retired`].
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::DonorRetired`] if `donor` was already
    /// migrated.
    pub fn migrate_from(donor: &Self, partition: PartitionTag) -> Result<Self, MigrationError> {
        let entries = donor.core.entries.lock();
        if donor.retired.swap(true, Ordering::AcqRel) {
            return Err(MigrationError::DonorRetired);
        }

        info!(
            world = donor.world.name(),
            profile = %donor.compressor.profile(),
            %partition,
            entries = entries.len(),
            hits = donor.core.hits.load(Ordering::Relaxed),
            misses = donor.core.misses.load(Ordering::Relaxed),
            "migrating chunk cache to partition"
        );
        drop(entries);

        Ok(Self::build(
            donor.world.clone(),
            donor.compressor.clone(),
            donor.pool.clone(),
            Some(partition),
            donor.core.clone(),
        ))
    }

    /// Request the compressed payload for the chunk at (x, z).
    ///
    /// Returns immediately; the payload is produced by the task pool and
    /// delivered through the returned promise. Concurrent and repeated
    /// requests for one chunk share one promise until the chunk changes.
    ///
    /// # Errors
    ///
    /// - [`CacheError::TileUnavailable`] if the chunk is not loaded
    /// - [`CacheError::Retired`] if this instance was migrated away
    pub fn request(&self, x: i32, z: i32) -> Result<CompressionPromise, CacheError> {
        if self.retired.load(Ordering::Acquire) {
            return Err(CacheError::Retired);
        }

        let listener = self.listener();
        self.world.register_listener(listener.clone(), x, z);
        let Some(snapshot) = self.world.chunk(x, z) else {
            self.world.unregister_listener(&listener, x, z);
            self.core.remove(x, z);
            return Err(CacheError::TileUnavailable { x, z });
        };
        let hash = chunk_hash(x, z);

        let promise = {
            let mut entries = self.core.entries.lock();
            // Re-checked under the lock that migration holds while retiring
            if self.retired.load(Ordering::Acquire) {
                return Err(CacheError::Retired);
            }

            match entries.get(&hash) {
                Some(entry) if entry.revision >= snapshot.revision => {
                    self.core.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(x, z, "chunk cache hit");
                    return Ok(entry.promise.clone());
                }
                Some(entry) => {
                    debug!(
                        x,
                        z,
                        cached = entry.revision,
                        current = snapshot.revision,
                        "cached chunk is stale"
                    );
                }
                None => {}
            }

            self.core.misses.fetch_add(1, Ordering::Relaxed);
            let promise = CompressionPromise::new();
            entries.insert(
                hash,
                Entry {
                    promise: promise.clone(),
                    revision: snapshot.revision,
                },
            );
            promise
        };

        let coord = ChunkCoord::new(x, z);
        let partition = self.effective_partition();
        debug!(%coord, %partition, "chunk cache miss, dispatching encode");
        self.pool.submit(ChunkRequestTask::new(
            coord,
            partition,
            snapshot,
            promise.clone(),
            self.compressor.clone(),
        ));

        Ok(promise)
    }

    /// Drop the entry for (x, z). Returns `true` if one existed.
    pub fn invalidate(&self, x: i32, z: i32) -> bool {
        self.core.remove(x, z)
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.core.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Whether an entry exists for (x, z).
    pub fn contains(&self, x: i32, z: i32) -> bool {
        self.core.entries.lock().contains_key(&chunk_hash(x, z))
    }

    /// Number of cached entries, pending or resolved.
    pub fn len(&self) -> usize {
        self.core.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.entries.lock().is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.core.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.core.misses.load(Ordering::Relaxed)
    }

    /// Fraction of requests served from cache, 0.0 before any request.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Total bytes of successfully resolved payloads currently cached.
    pub fn cache_size(&self) -> usize {
        self.core
            .entries
            .lock()
            .values()
            .filter_map(|entry| entry.promise.payload_len())
            .sum()
    }

    /// Snapshot of the counters for reporting.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            world: self.world.name().to_string(),
            profile: self.profile(),
            partition: self.partition,
            hits: self.hits(),
            misses: self.misses(),
            entries: self.len(),
            cache_size: self.cache_size(),
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Partition tag, `None` for a default cache.
    pub fn partition(&self) -> Option<PartitionTag> {
        self.partition
    }

    /// Tag chunks are encoded with: the partition tag, or overworld.
    pub fn effective_partition(&self) -> PartitionTag {
        self.partition.unwrap_or(PartitionTag::OVERWORLD)
    }

    pub fn profile(&self) -> EncodingProfile {
        self.compressor.profile()
    }

    pub fn compressor(&self) -> &Arc<dyn Compressor> {
        &self.compressor
    }

    pub fn world(&self) -> &Arc<W> {
        &self.world
    }

    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    /// Whether this instance handed its state to a migration successor or
    /// was removed from its directory.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Retire this instance and drop its entries.
    ///
    /// Later requests fail with [`CacheError::Retired`]. Returns how many
    /// entries were dropped.
    pub(crate) fn retire(&self) -> usize {
        let mut entries = self.core.entries.lock();
        self.retired.store(true, Ordering::Release);
        let count = entries.len();
        entries.clear();
        count
    }

    fn listener(&self) -> Arc<dyn ChunkListener> {
        self.core.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
