use std::sync::Arc;

use bytes::Bytes;

/// Identifier of a world instance, unique for the lifetime of the process.
pub type WorldId = u64;

/// Immutable view of a chunk at one point in time.
///
/// Cloning is cheap: section payloads are reference-counted [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkSnapshot {
    /// Bumped by the source every time the chunk is modified; never
    /// decreases for a given chunk
    pub revision: u64,

    /// Serialized sub-chunk sections, bottom to top
    pub sub_chunks: Vec<Bytes>,

    /// Serialized biome palette
    pub biomes: Bytes,
}

impl ChunkSnapshot {
    /// Create a snapshot at revision 0.
    pub fn new(sub_chunks: Vec<Bytes>, biomes: Bytes) -> Self {
        Self {
            revision: 0,
            sub_chunks,
            biomes,
        }
    }

    /// Total size of the section and biome payloads in bytes.
    pub fn payload_len(&self) -> usize {
        self.sub_chunks.iter().map(Bytes::len).sum::<usize>() + self.biomes.len()
    }
}

/// Receives change notifications for chunks it registered interest in.
pub trait ChunkListener: Send + Sync {
    /// The chunk at (x, z) was modified.
    fn on_chunk_changed(&self, x: i32, z: i32);

    /// The chunk at (x, z) was unloaded from memory.
    fn on_chunk_unloaded(&self, x: i32, z: i32);
}

/// Trait for the world storage backing a chunk cache.
///
/// Implementations own loading and mutation of chunks; the cache only reads
/// snapshots and subscribes to changes.
pub trait ChunkSource: Send + Sync + 'static {
    /// Stable identifier of this world.
    fn id(&self) -> WorldId;

    /// Folder name of the world, used to match partition configuration.
    fn name(&self) -> &str;

    /// Current snapshot of the chunk at (x, z), or `None` if it is not loaded.
    fn chunk(&self, x: i32, z: i32) -> Option<ChunkSnapshot>;

    /// Subscribe `listener` to changes of the chunk at (x, z).
    ///
    /// Registering the same listener (by identity) twice for one chunk must
    /// have no additional effect.
    fn register_listener(&self, listener: Arc<dyn ChunkListener>, x: i32, z: i32);

    /// Remove a subscription made with [`ChunkSource::register_listener`].
    fn unregister_listener(&self, listener: &Arc<dyn ChunkListener>, x: i32, z: i32);
}

/// Compare two listeners by the address of their shared allocation.
#[inline]
pub(crate) fn same_listener(a: &Arc<dyn ChunkListener>, b: &Arc<dyn ChunkListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
