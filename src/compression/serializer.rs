//! Chunk payload serialization.
//!
//! Produces the uncompressed wire payload for one chunk in one dimension.
//! All integers are little-endian:
//!
//! ```text
//! ┌────────┬────────┬───────────┬─────────────┬──────────────────────┬───────────────────┐
//! │ x: i32 │ z: i32 │ dim: u8   │ count: u16  │ count × (u32 + data) │ u32 + biome bytes │
//! └────────┴────────┴───────────┴─────────────┴──────────────────────┴───────────────────┘
//! ```
//!
//! The section count is truncated to the dimension's vertical limit, so the
//! same chunk streamed as a nether chunk carries fewer sections than as an
//! overworld chunk.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CompressionError;
use crate::partition::PartitionTag;
use crate::world::{ChunkCoord, ChunkSnapshot};

/// Fixed header size: x, z, dimension, section count.
pub const HEADER_SIZE: usize = 4 + 4 + 1 + 2;

/// Serialize a chunk snapshot for the given dimension.
pub fn encode_chunk(
    coord: ChunkCoord,
    partition: PartitionTag,
    snapshot: &ChunkSnapshot,
) -> Result<Bytes, CompressionError> {
    let count = snapshot.sub_chunks.len().min(partition.sub_chunk_limit());
    let sections = &snapshot.sub_chunks[..count];

    let body_len = sections.iter().map(|s| 4 + s.len()).sum::<usize>() + 4 + snapshot.biomes.len();
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len);

    buf.put_i32_le(coord.x);
    buf.put_i32_le(coord.z);
    buf.put_u8(partition.0);
    // Bounded by sub_chunk_limit(), which always fits in a u16
    buf.put_u16_le(sections.len() as u16);

    for section in sections {
        put_prefixed(&mut buf, section)?;
    }
    put_prefixed(&mut buf, &snapshot.biomes)?;

    Ok(buf.freeze())
}

fn put_prefixed(buf: &mut BytesMut, data: &[u8]) -> Result<(), CompressionError> {
    let len = u32::try_from(data.len()).map_err(|_| {
        CompressionError::Serialize(format!(
            "section of {} bytes exceeds u32 length prefix",
            data.len()
        ))
    })?;
    buf.put_u32_le(len);
    buf.put_slice(data);
    Ok(())
}
