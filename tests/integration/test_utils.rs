//! Test utilities for integration tests.
//!
//! This module provides instrumented compressors and helpers for building
//! populated worlds and decoding streamed chunk payloads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes};

use chunk_streamer::compression::{Compressor, EncodingProfile, ZlibCompressor};
use chunk_streamer::error::CompressionError;
use chunk_streamer::world::MemoryWorld;

// =============================================================================
// Compressor with Call Tracking
// =============================================================================

/// A zlib compressor that counts every compression it performs.
///
/// An optional delay keeps jobs in flight long enough for concurrent
/// requests to pile up on the same promise.
pub struct TrackingCompressor {
    inner: ZlibCompressor,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl TrackingCompressor {
    pub fn new() -> Self {
        Self {
            inner: ZlibCompressor::default(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compressor for TrackingCompressor {
    fn profile(&self) -> EncodingProfile {
        self.inner.profile()
    }

    fn compress(&self, payload: &[u8]) -> Result<Bytes, CompressionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.compress(payload)
    }
}

/// A compressor that always fails.
pub struct BrokenCompressor;

impl Compressor for BrokenCompressor {
    fn profile(&self) -> EncodingProfile {
        EncodingProfile::new("broken", 0)
    }

    fn compress(&self, _payload: &[u8]) -> Result<Bytes, CompressionError> {
        Err(CompressionError::Compress("out of buffers".to_string()))
    }
}

// =============================================================================
// Worlds
// =============================================================================

/// Sections stored in every generated chunk.
pub const TEST_SECTIONS: usize = 24;

/// Build a world with every chunk within `radius` of the origin loaded.
pub fn populated_world(name: &str, radius: i32) -> Arc<MemoryWorld> {
    let world = Arc::new(MemoryWorld::new(name));
    for x in -radius..=radius {
        for z in -radius..=radius {
            world.set_chunk(x, z, sections(x, z, 0), Bytes::from_static(b"biomes"));
        }
    }
    world
}

/// Section data for a chunk; `generation` changes the content.
pub fn sections(x: i32, z: i32, generation: u8) -> Vec<Bytes> {
    (0..TEST_SECTIONS)
        .map(|y| Bytes::from(vec![(x + z + y as i32) as u8 ^ generation; 64]))
        .collect()
}

// =============================================================================
// Payload Decoding
// =============================================================================

/// Header and sections of a decoded chunk payload.
#[derive(Debug)]
pub struct DecodedChunk {
    pub x: i32,
    pub z: i32,
    pub dimension: u8,
    pub sections: Vec<Bytes>,
    pub biomes: Bytes,
}

/// Inflate and parse a payload produced with the default zlib profile.
pub fn decode_payload(payload: &[u8]) -> DecodedChunk {
    let raw = ZlibCompressor::default()
        .decompress(payload)
        .expect("payload should inflate");
    let mut buf = Bytes::from(raw);

    let x = buf.get_i32_le();
    let z = buf.get_i32_le();
    let dimension = buf.get_u8();
    let count = buf.get_u16_le() as usize;

    let sections = (0..count)
        .map(|_| {
            let len = buf.get_u32_le() as usize;
            buf.split_to(len)
        })
        .collect();

    let len = buf.get_u32_le() as usize;
    let biomes = buf.split_to(len);
    assert!(!buf.has_remaining(), "trailing bytes in payload");

    DecodedChunk {
        x,
        z,
        dimension,
        sections,
        biomes,
    }
}
