use thiserror::Error;

use crate::partition::PartitionTag;

/// Errors returned when requesting a compressed chunk from a cache
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The chunk is not loaded in the world backing this cache
    #[error("Cannot request an unloaded chunk at ({x}, {z})")]
    TileUnavailable { x: i32, z: i32 },

    /// The cache handed its state to a partition-tagged successor
    #[error("Cache instance was retired by a partition migration")]
    Retired,
}

/// Errors produced while encoding a chunk on a background worker.
///
/// These travel inside the promise result, so every waiter observes the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// Chunk payload could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(String),

    /// Compressor rejected the payload
    #[error("Compress error: {0}")]
    Compress(String),

    /// A compressed payload could not be inflated
    #[error("Decompress error: {0}")]
    Decompress(String),

    /// The worker panicked before producing a result
    #[error("Compression worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Errors from moving a default cache into a partition-tagged one
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// No cache is registered for the world and encoding profile
    #[error("No cache registered for world {world} with profile {profile}")]
    NotFound { world: u64, profile: String },

    /// The registered cache is already tagged with a different partition
    #[error("Cache already tagged {existing}, refusing to re-tag as {requested}")]
    PartitionConflict {
        existing: PartitionTag,
        requested: PartitionTag,
    },

    /// The donor cache was already migrated elsewhere
    #[error("Donor cache was already retired")]
    DonorRetired,

    /// An instance handed to the directory does not carry the expected tag
    #[error("Instance partition {actual:?} does not match requested {expected}")]
    TagMismatch {
        expected: PartitionTag,
        actual: Option<PartitionTag>,
    },

    /// An instance handed to the directory belongs to another world or profile
    #[error("Instance does not belong to world {world} with profile {profile}")]
    WrongKey { world: u64, profile: String },

    /// The slot holds a live instance that was not migrated
    #[error("World {world} with profile {profile} already has a live cache")]
    Occupied { world: u64, profile: String },
}

/// Errors related to partition configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Dimension name or id is not recognized
    #[error("Invalid dimension ID in configuration: {0}")]
    InvalidDimension(String),

    /// Partition configuration could not be read or parsed
    #[error("Partition config error: {0}")]
    Config(String),
}
