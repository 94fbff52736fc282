//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Concurrent requests for one chunk share a single encode
//! - Repeated passes over a region are served from cache
//! - Changed and unloaded chunks are recomputed or rejected
//! - Encode failures reach every waiter

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use chunk_streamer::cache::{ChunkCache, DeferredTaskPool, TokioTaskPool};
use chunk_streamer::error::{CacheError, CompressionError};

use super::test_utils::{
    decode_payload, populated_world, sections, BrokenCompressor, TrackingCompressor,
    TEST_SECTIONS,
};

// =============================================================================
// Deduplication
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_encode() {
    let world = populated_world("world", 2);
    let compressor = Arc::new(TrackingCompressor::new().with_delay(Duration::from_millis(20)));
    let pool = Arc::new(TokioTaskPool::from_current(4).unwrap());
    let cache = Arc::new(ChunkCache::new(world, compressor.clone(), pool.clone()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.request(1, -1).unwrap().wait().await
        }));
    }

    let mut payloads = Vec::new();
    for handle in handles {
        payloads.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(compressor.calls(), 1);
    assert_eq!(pool.submitted(), 1);
    assert!(payloads.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_pass_served_from_cache() {
    let radius = 2;
    let world = populated_world("world", radius);
    let compressor = Arc::new(TrackingCompressor::new());
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());
    let cache = ChunkCache::new(world, compressor.clone(), pool);

    let mut promises = Vec::new();
    for _ in 0..2 {
        for x in -radius..=radius {
            for z in -radius..=radius {
                promises.push(((x, z), cache.request(x, z).unwrap()));
            }
        }
    }

    for ((x, z), promise) in &promises {
        let payload = promise.wait().await.unwrap();
        let chunk = decode_payload(&payload);
        assert_eq!((chunk.x, chunk.z), (*x, *z));
        assert_eq!(chunk.dimension, 0);
        assert_eq!(chunk.sections.len(), TEST_SECTIONS);
        assert_eq!(chunk.sections, sections(*x, *z, 0));
        assert_eq!(&chunk.biomes[..], b"biomes");
    }

    assert_eq!(compressor.calls(), 25);
    assert_eq!(cache.misses(), 25);
    assert_eq!(cache.hits(), 25);
    assert_eq!(cache.len(), 25);
    assert!(cache.cache_size() > 0);
    assert!((cache.hit_ratio() - 0.5).abs() < f64::EPSILON);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_changed_chunk_is_recomputed() {
    let world = populated_world("world", 1);
    let compressor = Arc::new(TrackingCompressor::new());
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());
    let cache = ChunkCache::new(world.clone(), compressor.clone(), pool);

    let before = cache.request(0, 0).unwrap();
    let old = decode_payload(&before.wait().await.unwrap());

    world.set_chunk(0, 0, sections(0, 0, 0xff), bytes::Bytes::from_static(b"biomes"));
    assert!(!cache.contains(0, 0));

    let after = cache.request(0, 0).unwrap();
    assert!(!after.same_as(&before));
    let new = decode_payload(&after.wait().await.unwrap());

    assert_ne!(old.sections, new.sections);
    assert_eq!(new.sections, sections(0, 0, 0xff));
    assert_eq!(compressor.calls(), 2);
    assert_eq!(cache.misses(), 2);
    assert_eq!(cache.hits(), 0);
}

#[tokio::test]
async fn test_unloaded_chunk_is_rejected() {
    let world = populated_world("world", 1);
    let pool = Arc::new(TokioTaskPool::from_current(2).unwrap());
    let cache = ChunkCache::new(world.clone(), Arc::new(TrackingCompressor::new()), pool);

    cache.request(1, 1).unwrap().wait().await.unwrap();
    assert!(cache.contains(1, 1));

    assert!(world.unload_chunk(1, 1));
    assert!(!cache.contains(1, 1));
    assert_eq!(world.listener_count(1, 1), 0);

    assert_eq!(
        cache.request(1, 1).unwrap_err(),
        CacheError::TileUnavailable { x: 1, z: 1 }
    );
    assert_eq!(cache.request(5, 5).unwrap_err(), CacheError::TileUnavailable { x: 5, z: 5 });

    // Rejected requests do not leave subscriptions behind
    assert_eq!(world.listener_count(1, 1), 0);
    assert_eq!(world.listener_count(5, 5), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_encode_failure_reaches_every_waiter() {
    let world = populated_world("world", 0);
    let pool = Arc::new(DeferredTaskPool::new());
    let cache = ChunkCache::new(world, Arc::new(BrokenCompressor), pool.clone());

    let promise = cache.request(0, 0).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let early = seen.clone();
    promise.on_complete(move |result| early.lock().push(result.clone()));
    assert!(seen.lock().is_empty());

    assert_eq!(pool.run_pending(), 1);
    assert_eq!(seen.lock().len(), 1);

    let late = seen.clone();
    cache
        .request(0, 0)
        .unwrap()
        .on_complete(move |result| late.lock().push(result.clone()));

    let expected = Err(CompressionError::Compress("out of buffers".to_string()));
    assert_eq!(*seen.lock(), vec![expected.clone(), expected]);

    // Failed payloads hold no bytes
    assert_eq!(cache.cache_size(), 0);
    assert_eq!(cache.hits(), 1);
}

#[test]
fn test_stats_serialize_to_json() {
    let world = populated_world("stats_world", 0);
    let pool = Arc::new(DeferredTaskPool::new());
    let cache = ChunkCache::new(world, Arc::new(TrackingCompressor::new()), pool.clone());

    cache.request(0, 0).unwrap();
    cache.request(0, 0).unwrap();
    pool.run_pending();

    let json = serde_json::to_value(cache.stats()).unwrap();
    assert_eq!(json["world"], "stats_world");
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["entries"], 1);
    assert_eq!(json["partition"], serde_json::Value::Null);
    assert_eq!(json["profile"]["algorithm"], "zlib");
}
