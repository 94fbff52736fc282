//! Dimension partitioning.
//!
//! Several dimensions may be backed by one in-memory world. Each is streamed
//! with its own [`PartitionTag`], and therefore needs its own chunk cache: a
//! chunk encoded for the nether is not valid as an overworld chunk.
//!
//! - [`PartitionTag`]: the dimension a cache encodes for
//! - [`PartitionConfig`]: the `apply-to-worlds` mapping read from disk
//! - [`PartitionManager`]: applies the mapping to loaded worlds by migrating
//!   their caches through the [`CacheDirectory`](crate::cache::CacheDirectory)

mod config;
mod manager;
mod tag;

pub use config::PartitionConfig;
pub use manager::PartitionManager;
pub use tag::PartitionTag;
