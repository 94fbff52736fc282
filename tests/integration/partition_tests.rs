//! Dimension partition integration tests.
//!
//! Tests verify:
//! - Differently tagged caches over one world never share payloads
//! - Migration keeps entries, counters and promise identity
//! - Requests racing a migration are either counted once or rejected
//! - The partition manager follows configuration and world lifecycle

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chunk_streamer::cache::{CacheDirectory, ChunkCache, TokioTaskPool};
use chunk_streamer::compression::Compressor;
use chunk_streamer::error::{CacheError, MigrationError};
use chunk_streamer::partition::{PartitionConfig, PartitionManager, PartitionTag};
use chunk_streamer::world::ChunkSource;

use super::test_utils::{decode_payload, populated_world, TrackingCompressor, TEST_SECTIONS};

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_tagged_caches_do_not_share_payloads() {
    let world = populated_world("shared", 1);
    let compressor = Arc::new(TrackingCompressor::new());
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());

    let overworld = ChunkCache::new(world.clone(), compressor.clone(), pool.clone());
    let nether = ChunkCache::with_partition(
        world.clone(),
        compressor.clone(),
        pool.clone(),
        PartitionTag::NETHER,
    );
    let end = ChunkCache::with_partition(world, compressor.clone(), pool, PartitionTag::END);

    let a = overworld.request(0, 1).unwrap();
    let b = nether.request(0, 1).unwrap();
    let c = end.request(0, 1).unwrap();
    assert!(!a.same_as(&b));
    assert!(!b.same_as(&c));

    let a = decode_payload(&a.wait().await.unwrap());
    let b = decode_payload(&b.wait().await.unwrap());
    let c = decode_payload(&c.wait().await.unwrap());

    assert_eq!((a.dimension, a.sections.len()), (0, TEST_SECTIONS));
    assert_eq!((b.dimension, b.sections.len()), (1, 8));
    assert_eq!((c.dimension, c.sections.len()), (2, 16));
    assert_eq!(b.sections[..], a.sections[..8]);

    assert_eq!(compressor.calls(), 3);
    for cache in [&overworld, &nether, &end] {
        assert_eq!((cache.hits(), cache.misses()), (0, 1));
    }
}

// =============================================================================
// Migration
// =============================================================================

#[tokio::test]
async fn test_migration_keeps_state() {
    let world = populated_world("hell", 1);
    let compressor: Arc<dyn Compressor> = Arc::new(TrackingCompressor::new());
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());
    let directory = CacheDirectory::new(pool);

    let donor = directory.instance(&world, &compressor);
    let promise = donor.request(0, 0).unwrap();
    donor.request(0, 0).unwrap();
    donor.request(1, 0).unwrap();
    promise.wait().await.unwrap();

    let migration = directory
        .migrate(world.id(), &compressor.profile(), PartitionTag::NETHER)
        .unwrap();
    assert!(migration.performed());

    let tagged = directory.instance(&world, &compressor);
    assert!(Arc::ptr_eq(&tagged, migration.instance()));
    assert_eq!(tagged.partition(), Some(PartitionTag::NETHER));
    assert_eq!((tagged.hits(), tagged.misses(), tagged.len()), (1, 2, 2));
    assert!(tagged.request(0, 0).unwrap().same_as(&promise));

    assert!(donor.is_retired());
    assert_eq!(donor.request(0, 0).unwrap_err(), CacheError::Retired);

    // Listener registrations survive the move
    world.set_chunk(0, 0, Vec::new(), bytes::Bytes::new());
    assert!(!tagged.contains(0, 0));

    // Re-tagging is refused; same tag is a no-op
    assert_eq!(
        directory
            .migrate(world.id(), &compressor.profile(), PartitionTag::END)
            .err(),
        Some(MigrationError::PartitionConflict {
            existing: PartitionTag::NETHER,
            requested: PartitionTag::END,
        })
    );
    let again = directory
        .migrate(world.id(), &compressor.profile(), PartitionTag::NETHER)
        .unwrap();
    assert!(!again.performed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_racing_migration_are_counted_once() {
    let world = populated_world("void", 3);
    let compressor: Arc<dyn Compressor> =
        Arc::new(TrackingCompressor::new().with_delay(Duration::from_millis(1)));
    let pool = Arc::new(TokioTaskPool::from_current(4).unwrap());
    let directory = Arc::new(CacheDirectory::new(pool));
    directory.instance(&world, &compressor);

    let served = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();
    for worker in 0..8 {
        let directory = directory.clone();
        let world = world.clone();
        let compressor = compressor.clone();
        let served = served.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let x = (worker + i) % 7 - 3;
                loop {
                    let cache = directory.instance(&world, &compressor);
                    match cache.request(x, 0) {
                        Ok(_) => break,
                        Err(CacheError::Retired) => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                served.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        }));
    }

    tokio::time::sleep(Duration::from_millis(2)).await;
    directory
        .migrate(world.id(), &compressor.profile(), PartitionTag::END)
        .unwrap();

    for handle in handles {
        handle.await.unwrap();
    }

    let tagged = directory.instance(&world, &compressor);
    assert_eq!(tagged.partition(), Some(PartitionTag::END));
    assert_eq!(tagged.hits() + tagged.misses(), served.load(Ordering::SeqCst));
    assert_eq!(served.load(Ordering::SeqCst), 400);
}

// =============================================================================
// Partition Manager
// =============================================================================

#[tokio::test]
async fn test_manager_follows_configuration_and_lifecycle() {
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());
    let directory = Arc::new(CacheDirectory::new(pool));
    let manager = Arc::new(PartitionManager::new(directory.clone()));

    let config = PartitionConfig::from_json(
        r#"{"apply-to-worlds": {"hell": "nether", "void": "end"}}"#,
    )
    .unwrap();
    assert_eq!(manager.apply_config(&config).unwrap(), 0);

    let overworld = populated_world("world", 1);
    let hell = populated_world("hell", 1);
    manager.world_loaded(overworld.clone());
    manager.world_loaded(hell.clone());

    let compressor: Arc<dyn Compressor> = Arc::new(TrackingCompressor::new());
    assert_eq!(manager.register_compressor(compressor.clone()).await, 1);

    let hell_cache = directory.instance(&hell, &compressor);
    let world_cache = directory.instance(&overworld, &compressor);
    assert_eq!(hell_cache.partition(), Some(PartitionTag::NETHER));
    assert_eq!(world_cache.partition(), None);

    let payload = hell_cache.request(0, 0).unwrap().wait().await.unwrap();
    assert_eq!(decode_payload(&payload).dimension, PartitionTag::NETHER.0);

    // A world loaded later is migrated on load
    let void = populated_world("void", 0);
    assert_eq!(manager.world_loaded(void.clone()), 1);
    assert_eq!(
        directory.instance(&void, &compressor).partition(),
        Some(PartitionTag::END)
    );

    // Memory pressure drops payloads but keeps tagged instances
    assert_eq!(manager.low_memory(), 1);
    assert_eq!(
        directory.instance(&hell, &compressor).partition(),
        Some(PartitionTag::NETHER)
    );
    assert!(hell_cache.is_empty());

    assert_eq!(manager.world_unloaded("hell"), 1);
    assert!(directory.get(hell.id(), &compressor.profile()).is_none());
    assert_eq!(directory.len(), 2);
}
