//! Chunk Streamer - compressed chunk payload cache demo.
//!
//! This binary loads in-memory worlds, applies the configured dimension
//! partitions and streams a square of chunks from every world through the
//! shared compression cache.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bytes::Bytes;
use chunk_streamer::{
    config::Config, CacheDirectory, ChunkSource, CompressionPromise, Compressor, MemoryWorld,
    PartitionManager, TokioTaskPool, ZlibCompressor,
};

/// World that is always loaded, streamed as the overworld unless mapped.
const DEFAULT_WORLD: &str = "world";

/// Sections per generated chunk.
const SECTIONS_PER_CHUNK: usize = 24;

/// Bytes per generated section.
const SECTION_SIZE: usize = 2048;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mappings = match config.partition_mappings() {
        Ok(mappings) => mappings,
        Err(e) => {
            error!("Partition configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Workers: {}", config.workers);
    info!("  Compression level: {}", config.compression_level);
    info!("  Radius: {}", config.radius);
    for (name, tag) in &mappings {
        info!("  Partition: {} -> {}", name, tag);
    }

    let pool = match TokioTaskPool::from_current(config.workers) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            error!("Failed to create worker pool: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let directory = Arc::new(CacheDirectory::new(pool.clone()));
    let manager = Arc::new(PartitionManager::new(directory.clone()));

    for (name, tag) in &mappings {
        manager.apply_to_world(name, *tag);
    }

    // Load worlds
    let mut names = vec![DEFAULT_WORLD.to_string()];
    names.extend(
        mappings
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| name != DEFAULT_WORLD),
    );

    let mut worlds = Vec::with_capacity(names.len());
    for name in names {
        let world = Arc::new(MemoryWorld::new(name));
        populate(&world, config.radius as i32);
        manager.world_loaded(world.clone());
        info!(
            "  Loaded world '{}' ({} chunks)",
            world.name(),
            world.loaded_count()
        );
        worlds.push(world);
    }

    let compressor: Arc<dyn Compressor> = Arc::new(ZlibCompressor::new(config.compression_level));
    let migrated = manager.register_compressor(compressor.clone()).await;
    info!("Registered {} ({} caches migrated)", compressor.profile(), migrated);

    // Two passes: the second one is served from cache
    let mut promises = Vec::new();
    for _ in 0..2 {
        for world in &worlds {
            promises.extend(request_square(&directory, world, &compressor, config.radius));
        }
    }

    // Changing a chunk drops its cached payload; the next request recomputes it
    if let Some(world) = worlds.first() {
        let (sub_chunks, biomes) = generate_chunk(0, 0, 1);
        world.set_chunk(0, 0, sub_chunks, biomes);
        let cache = directory.instance(world, &compressor);
        match cache.request(0, 0) {
            Ok(promise) => promises.push(promise),
            Err(e) => warn!("Request after change failed: {}", e),
        }
    }

    let mut encoded = 0usize;
    let mut failed = 0usize;
    for promise in &promises {
        match promise.wait().await {
            Ok(payload) => encoded += payload.len(),
            Err(e) => {
                warn!("Chunk encode failed: {}", e);
                failed += 1;
            }
        }
    }

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Requests: {}", promises.len());
    info!("  Encode jobs: {}", pool.submitted());
    info!("  Payload bytes delivered: {}", encoded);
    if failed > 0 {
        warn!("  Failed requests: {}", failed);
    }
    info!("────────────────────────────────────────────────────────────────");

    match serde_json::to_string_pretty(&directory.stats()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize statistics: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "chunk_streamer=debug"
    } else {
        "chunk_streamer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Fill the square of chunks within `radius` of the origin.
fn populate(world: &MemoryWorld, radius: i32) {
    for x in -radius..=radius {
        for z in -radius..=radius {
            let (sub_chunks, biomes) = generate_chunk(x, z, 0);
            world.set_chunk(x, z, sub_chunks, biomes);
        }
    }
}

/// Deterministic terrain-like section data for a chunk.
fn generate_chunk(x: i32, z: i32, seed: u8) -> (Vec<Bytes>, Bytes) {
    let sub_chunks = (0..SECTIONS_PER_CHUNK)
        .map(|y| {
            let block = (x ^ z ^ y as i32) as u8 ^ seed;
            let data: Vec<u8> = (0..SECTION_SIZE)
                .map(|i| if i % 64 == 0 { block.wrapping_add(1) } else { block })
                .collect();
            Bytes::from(data)
        })
        .collect();
    let biomes = Bytes::from(vec![(x.wrapping_add(z) & 0x7f) as u8; 256]);
    (sub_chunks, biomes)
}

/// Request every chunk within `radius` of the origin.
fn request_square(
    directory: &CacheDirectory<MemoryWorld>,
    world: &Arc<MemoryWorld>,
    compressor: &Arc<dyn Compressor>,
    radius: u32,
) -> Vec<CompressionPromise> {
    let cache = directory.instance(world, compressor);
    let radius = radius as i32;

    let mut promises = Vec::new();
    for x in -radius..=radius {
        for z in -radius..=radius {
            match cache.request(x, z) {
                Ok(promise) => promises.push(promise),
                Err(e) => warn!("Request for {} ({}, {}) failed: {}", world.name(), x, z, e),
            }
        }
    }
    promises
}
