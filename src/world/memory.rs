//! In-memory world implementation.
//!
//! Holds chunk snapshots in a map and delivers change notifications
//! synchronously to registered listeners. Used by the demo binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::coord::chunk_hash;
use super::source::{same_listener, ChunkListener, ChunkSnapshot, ChunkSource, WorldId};

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// A world whose chunks live entirely in memory.
pub struct MemoryWorld {
    id: WorldId,
    name: String,
    chunks: RwLock<HashMap<u64, ChunkSnapshot>>,
    listeners: Mutex<HashMap<u64, Vec<Arc<dyn ChunkListener>>>>,
    revision: AtomicU64,
}

impl MemoryWorld {
    /// Create an empty world with a fresh process-unique id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            chunks: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            revision: AtomicU64::new(0),
        }
    }

    /// Load or replace the chunk at (x, z).
    ///
    /// Replacing a loaded chunk notifies its listeners with
    /// [`ChunkListener::on_chunk_changed`]. Returns the new revision.
    pub fn set_chunk(&self, x: i32, z: i32, sub_chunks: Vec<Bytes>, biomes: Bytes) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = ChunkSnapshot {
            revision,
            sub_chunks,
            biomes,
        };

        let replaced = self
            .chunks
            .write()
            .insert(chunk_hash(x, z), snapshot)
            .is_some();

        if replaced {
            for listener in self.listeners_for(x, z) {
                listener.on_chunk_changed(x, z);
            }
        }
        revision
    }

    /// Unload the chunk at (x, z) and drop its listeners.
    ///
    /// Listeners are notified only if the chunk was loaded. Returns `true` if
    /// it was.
    pub fn unload_chunk(&self, x: i32, z: i32) -> bool {
        let hash = chunk_hash(x, z);
        let loaded = self.chunks.write().remove(&hash).is_some();
        let listeners = self.listeners.lock().remove(&hash).unwrap_or_default();

        if loaded {
            for listener in listeners {
                listener.on_chunk_unloaded(x, z);
            }
        }
        loaded
    }

    /// Whether the chunk at (x, z) is loaded.
    pub fn is_loaded(&self, x: i32, z: i32) -> bool {
        self.chunks.read().contains_key(&chunk_hash(x, z))
    }

    /// Number of loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Number of listeners registered for the chunk at (x, z).
    pub fn listener_count(&self, x: i32, z: i32) -> usize {
        self.listeners
            .lock()
            .get(&chunk_hash(x, z))
            .map_or(0, Vec::len)
    }

    fn listeners_for(&self, x: i32, z: i32) -> Vec<Arc<dyn ChunkListener>> {
        self.listeners
            .lock()
            .get(&chunk_hash(x, z))
            .cloned()
            .unwrap_or_default()
    }
}

impl ChunkSource for MemoryWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn chunk(&self, x: i32, z: i32) -> Option<ChunkSnapshot> {
        self.chunks.read().get(&chunk_hash(x, z)).cloned()
    }

    fn register_listener(&self, listener: Arc<dyn ChunkListener>, x: i32, z: i32) {
        let mut listeners = self.listeners.lock();
        let entry = listeners.entry(chunk_hash(x, z)).or_default();
        if !entry.iter().any(|l| same_listener(l, &listener)) {
            trace!(world = %self.name, x, z, "registered chunk listener");
            entry.push(listener);
        }
    }

    fn unregister_listener(&self, listener: &Arc<dyn ChunkListener>, x: i32, z: i32) {
        let mut listeners = self.listeners.lock();
        let hash = chunk_hash(x, z);
        if let Some(entry) = listeners.get_mut(&hash) {
            entry.retain(|l| !same_listener(l, listener));
            if entry.is_empty() {
                listeners.remove(&hash);
            }
        }
    }
}
