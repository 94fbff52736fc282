//! Configuration management for Chunk Streamer.
//!
//! This module provides the command-line configuration, which supports:
//! - Command-line arguments via clap
//! - Environment variables with `CHUNK_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use chunk_streamer::config::Config;
//!
//! let config = Config::parse();
//! println!("Encoding with {} workers", config.workers);
//! ```
//!
//! # Environment Variables
//!
//! - `CHUNK_WORKERS` - Concurrent compression jobs (default: 4)
//! - `CHUNK_COMPRESSION_LEVEL` - Zlib level, 0-9 (default: 6)
//! - `CHUNK_WORLDS` - Comma-separated `NAME=DIMENSION` partition mappings
//! - `CHUNK_PARTITIONS_FILE` - JSON file with an `apply-to-worlds` object
//! - `CHUNK_RADIUS` - Chunk radius requested around the origin (default: 4)

use std::path::PathBuf;

use clap::Parser;

use crate::cache::DEFAULT_WORKERS;
use crate::compression::{is_valid_level, DEFAULT_COMPRESSION_LEVEL};
use crate::partition::{PartitionConfig, PartitionTag};

// =============================================================================
// Default Values
// =============================================================================

/// Default chunk radius requested around the origin.
pub const DEFAULT_RADIUS: u32 = 4;

/// Largest accepted radius.
pub const MAX_RADIUS: u32 = 64;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Chunk Streamer - compressed chunk payload cache.
///
/// Loads in-memory worlds, streams a square of chunks from each through the
/// shared compression cache and reports per-cache statistics.
#[derive(Parser, Debug, Clone)]
#[command(name = "chunk-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Compression
    // =========================================================================
    /// Maximum number of chunks compressed concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "CHUNK_WORKERS")]
    pub workers: usize,

    /// Zlib compression level (0-9).
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL, env = "CHUNK_COMPRESSION_LEVEL")]
    pub compression_level: u32,

    // =========================================================================
    // Partitions
    // =========================================================================
    /// Stream a world as another dimension, e.g. `--world hell=nether`.
    ///
    /// May be repeated. Accepted dimensions are `nether` and `end`.
    #[arg(
        long = "world",
        env = "CHUNK_WORLDS",
        value_delimiter = ',',
        value_parser = parse_world_mapping
    )]
    pub worlds: Vec<(String, PartitionTag)>,

    /// JSON file with an `apply-to-worlds` object.
    ///
    /// Mappings from the file are applied before `--world` mappings.
    #[arg(long, env = "CHUNK_PARTITIONS_FILE")]
    pub partitions_file: Option<PathBuf>,

    // =========================================================================
    // Demo
    // =========================================================================
    /// Chunk radius requested around the origin of every world.
    #[arg(long, default_value_t = DEFAULT_RADIUS, env = "CHUNK_RADIUS")]
    pub radius: u32,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        if !is_valid_level(self.compression_level) {
            return Err("compression_level must be between 0 and 9".to_string());
        }

        if self.radius > MAX_RADIUS {
            return Err(format!("radius must be at most {}", MAX_RADIUS));
        }

        if let Some(ref path) = self.partitions_file {
            if !path.is_file() {
                return Err(format!("partitions file not found: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Collect partition mappings from the partitions file and `--world`.
    ///
    /// A world named in both keeps the `--world` mapping.
    pub fn partition_mappings(&self) -> Result<Vec<(String, PartitionTag)>, String> {
        let mut mappings = match self.partitions_file {
            Some(ref path) => PartitionConfig::load(path)
                .and_then(|config| config.resolve())
                .map_err(|e| e.to_string())?,
            None => Vec::new(),
        };

        for (name, tag) in &self.worlds {
            mappings.retain(|(existing, _)| existing != name);
            mappings.push((name.clone(), *tag));
        }

        Ok(mappings)
    }
}

/// Parse a `NAME=DIMENSION` mapping.
fn parse_world_mapping(s: &str) -> Result<(String, PartitionTag), String> {
    let (name, dimension) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=DIMENSION, got '{}'", s))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing world name in '{}'", s));
    }

    let tag = PartitionTag::from_config_name(dimension.trim()).map_err(|e| e.to_string())?;
    Ok((name.to_string(), tag))
}

// =============================================================================
// Tests
// =============================================================================
