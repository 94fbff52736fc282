//! Chunk coordinates and their 64-bit cache key.

use std::fmt;

/// Position of a chunk within one world, in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// Chunk X coordinate
    pub x: i32,

    /// Chunk Z coordinate
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Pack both components into a single 64-bit key.
    ///
    /// X occupies the high 32 bits and Z the low 32 bits, each taken as its
    /// two's-complement bit pattern, so the mapping is injective over the
    /// whole `i32 × i32` range.
    #[inline]
    pub const fn hash(&self) -> u64 {
        chunk_hash(self.x, self.z)
    }

    /// Recover a coordinate from a key produced by [`ChunkCoord::hash`].
    #[inline]
    pub const fn from_hash(hash: u64) -> Self {
        Self {
            x: (hash >> 32) as u32 as i32,
            z: hash as u32 as i32,
        }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, z): (i32, i32)) -> Self {
        Self::new(x, z)
    }
}

/// Pack a chunk position into a 64-bit key.
#[inline]
pub const fn chunk_hash(x: i32, z: i32) -> u64 {
    ((x as u32 as u64) << 32) | (z as u32 as u64)
}
