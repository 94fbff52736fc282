//! Compressed chunk cache.
//!
//! This module deduplicates chunk compression work per
//! (chunk coordinate, encoding profile, dimension).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             CacheDirectory              │
//! │     (world, profile) → ChunkCache       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               ChunkCache                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ coord hash → │  │  hit / miss     │  │
//! │  │   promise    │  │  counters       │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ miss: submit
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                TaskPool                 │
//! │  ChunkRequestTask: serialize → compress │
//! │  → resolve CompressionPromise           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ChunkCache`]: keyed promise store with hit/miss accounting
//! - [`CompressionPromise`]: single-assignment result shared by all requesters
//! - [`ChunkRequestTask`]: the encode job for one chunk
//! - [`TaskPool`]: where encode jobs run ([`TokioTaskPool`], [`DeferredTaskPool`])
//! - [`CacheDirectory`]: hands out caches and performs partition migration

mod chunk_cache;
mod directory;
mod promise;
mod task;

pub use chunk_cache::{CacheStats, ChunkCache};
pub use directory::{CacheDirectory, Migration};
pub use promise::{CompressionPromise, CompressionResult};
pub use task::{ChunkRequestTask, DeferredTaskPool, TaskPool, TokioTaskPool, DEFAULT_WORKERS};
