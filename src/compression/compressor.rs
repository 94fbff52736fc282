//! Compressors for chunk payloads.
//!
//! A compressor is identified by its [`EncodingProfile`]. Output produced
//! under one profile is not interchangeable with another, so caches are kept
//! per profile.
//!
//! # Design Decisions
//!
//! - **Raw deflate**: the zlib compressor emits a raw deflate stream with no
//!   zlib header or checksum, matching what game clients expect on the wire.
//!
//! - **Level clamping**: out-of-range levels are clamped rather than rejected
//!   at compression time; configuration validates them up front.

use std::fmt;
use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::error::CompressionError;

/// Default zlib compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Minimum allowed zlib compression level.
pub const MIN_COMPRESSION_LEVEL: u32 = 0;

/// Maximum allowed zlib compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

// =============================================================================
// Encoding Profile
// =============================================================================

/// Comparable handle identifying one compression configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EncodingProfile {
    /// Algorithm name (e.g. "zlib")
    pub algorithm: &'static str,

    /// Algorithm-specific level
    pub level: u32,
}

impl EncodingProfile {
    pub const fn new(algorithm: &'static str, level: u32) -> Self {
        Self { algorithm, level }
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.level)
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compressing serialized chunk payloads.
///
/// Compression runs on background workers, so implementations must be
/// thread-safe.
pub trait Compressor: Send + Sync + 'static {
    /// Profile identifying this compressor's output format.
    fn profile(&self) -> EncodingProfile;

    /// Compress a serialized payload.
    fn compress(&self, payload: &[u8]) -> Result<Bytes, CompressionError>;
}

// =============================================================================
// Zlib Compressor
// =============================================================================

/// Raw deflate compressor.
///
/// # Example
///
/// ```
/// use chunk_streamer::compression::{Compressor, ZlibCompressor};
///
/// let compressor = ZlibCompressor::new(6);
/// let compressed = compressor.compress(&[0u8; 4096]).unwrap();
/// assert!(compressed.len() < 4096);
/// assert_eq!(compressor.profile().to_string(), "zlib:6");
/// ```
#[derive(Debug, Clone)]
pub struct ZlibCompressor {
    level: u32,
}

impl ZlibCompressor {
    /// Create a compressor at the given level, clamped to 0-9.
    pub fn new(level: u32) -> Self {
        Self {
            level: clamp_level(level),
        }
    }

    /// Inflate a raw deflate stream produced by [`ZlibCompressor::compress`].
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut output = Vec::new();
        DeflateDecoder::new(data)
            .read_to_end(&mut output)
            .map_err(|e| CompressionError::Decompress(e.to_string()))?;
        Ok(output)
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for ZlibCompressor {
    fn profile(&self) -> EncodingProfile {
        EncodingProfile::new("zlib", self.level)
    }

    fn compress(&self, payload: &[u8]) -> Result<Bytes, CompressionError> {
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(payload.len() / 2),
            Compression::new(self.level),
        );

        encoder
            .write_all(payload)
            .map_err(|e| CompressionError::Compress(e.to_string()))?;

        let output = encoder
            .finish()
            .map_err(|e| CompressionError::Compress(e.to_string()))?;

        Ok(Bytes::from(output))
    }
}

// =============================================================================
// Passthrough Compressor
// =============================================================================

/// Compressor that returns the payload unchanged.
///
/// Useful for local connections where bandwidth is not a concern.
#[derive(Debug, Clone, Default)]
pub struct PassthroughCompressor;

impl Compressor for PassthroughCompressor {
    fn profile(&self) -> EncodingProfile {
        EncodingProfile::new("none", 0)
    }

    fn compress(&self, payload: &[u8]) -> Result<Bytes, CompressionError> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if the level is in the valid range (0-9).
#[inline]
pub fn is_valid_level(level: u32) -> bool {
    (MIN_COMPRESSION_LEVEL..=MAX_COMPRESSION_LEVEL).contains(&level)
}

/// Clamp level to the valid range.
#[inline]
pub fn clamp_level(level: u32) -> u32 {
    level.clamp(MIN_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL)
}

// =============================================================================
// Tests
// =============================================================================
