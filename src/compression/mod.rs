//! Chunk serialization and compression.
//!
//! A background job turns a [`ChunkSnapshot`](crate::world::ChunkSnapshot)
//! into wire bytes in two steps:
//!
//! 1. [`encode_chunk`] serializes the snapshot for one dimension
//! 2. a [`Compressor`] compresses the serialized payload
//!
//! Compressors are keyed by [`EncodingProfile`]; each profile gets its own
//! cache because their outputs are not interchangeable.

mod compressor;
mod serializer;

pub use compressor::{
    clamp_level, is_valid_level, Compressor, EncodingProfile, PassthroughCompressor,
    ZlibCompressor, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, MIN_COMPRESSION_LEVEL,
};
pub use serializer::{encode_chunk, HEADER_SIZE};
