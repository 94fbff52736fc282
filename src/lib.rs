//! # Chunk Streamer
//!
//! A compressed chunk payload cache for world-streaming servers.
//!
//! Serializing and compressing a chunk for the network is expensive, and many
//! players usually ask for the same chunks at the same time. This library
//! makes sure each chunk is encoded once per encoding profile and dimension,
//! hands every requester the same pending result, and throws the result away
//! as soon as the chunk changes.
//!
//! ## Features
//!
//! - **Request deduplication**: concurrent requests for a chunk share one
//!   [`CompressionPromise`]
//! - **Background encoding**: serialization and compression run on a bounded
//!   tokio worker pool
//! - **Change tracking**: caches listen to their world and drop stale payloads
//! - **Dimension partitions**: one world can be streamed as the nether or the
//!   end, with caches migrated in place without losing their state
//!
//! ## Architecture
//!
//! - [`world`] - Chunk sources, snapshots and change listeners
//! - [`compression`] - Wire serialization and compressors
//! - [`cache`] - Promise cache, encode tasks and the cache directory
//! - [`partition`] - Dimension tags and the partition manager
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use chunk_streamer::{
//!     CacheDirectory, ChunkSource, Compressor, MemoryWorld, PartitionTag, TokioTaskPool,
//!     ZlibCompressor,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Arc::new(TokioTaskPool::from_current(4).unwrap());
//!     let directory = CacheDirectory::new(pool);
//!
//!     let world = Arc::new(MemoryWorld::new("hell"));
//!     world.set_chunk(0, 0, vec![Bytes::from_static(b"section")], Bytes::new());
//!
//!     let zlib: Arc<dyn Compressor> = Arc::new(ZlibCompressor::default());
//!     directory.instance(&world, &zlib);
//!     let migration = directory
//!         .migrate(world.id(), &zlib.profile(), PartitionTag::NETHER)
//!         .unwrap();
//!
//!     let payload = migration.instance().request(0, 0).unwrap().wait().await;
//!     println!("{} bytes", payload.unwrap().len());
//! }
//! ```

pub mod cache;
pub mod compression;
pub mod config;
pub mod error;
pub mod partition;
pub mod world;

// Re-export commonly used types
pub use cache::{
    CacheDirectory, CacheStats, ChunkCache, ChunkRequestTask, CompressionPromise,
    CompressionResult, DeferredTaskPool, Migration, TaskPool, TokioTaskPool, DEFAULT_WORKERS,
};
pub use compression::{
    clamp_level, encode_chunk, is_valid_level, Compressor, EncodingProfile,
    PassthroughCompressor, ZlibCompressor, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL,
    MIN_COMPRESSION_LEVEL,
};
pub use config::Config;
pub use error::{CacheError, CompressionError, MigrationError, PartitionError};
pub use partition::{PartitionConfig, PartitionManager, PartitionTag};
pub use world::{
    chunk_hash, ChunkCoord, ChunkListener, ChunkSnapshot, ChunkSource, MemoryWorld, WorldId,
};
