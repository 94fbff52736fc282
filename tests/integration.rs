//! Integration tests for Chunk Streamer.
//!
//! These tests verify end-to-end functionality including:
//! - Request deduplication under concurrent load on the tokio worker pool
//! - Invalidation when chunks change or unload
//! - Dimension partition isolation and in-place cache migration
//! - Partition manager lifecycle driven by configuration

mod integration {
    pub mod test_utils;

    pub mod cache_tests;
    pub mod partition_tests;
}
