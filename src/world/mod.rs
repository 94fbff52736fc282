//! World model consumed by the chunk cache.
//!
//! The cache never loads or mutates chunks itself. It reads immutable
//! [`ChunkSnapshot`]s from a [`ChunkSource`] and subscribes to changes through
//! [`ChunkListener`] so stale payloads can be dropped.
//!
//! ```text
//! ┌──────────────────────┐  chunk(x, z)        ┌──────────────────────┐
//! │      ChunkCache      │ ──────────────────▶ │     ChunkSource      │
//! │                      │  register_listener  │  (e.g. MemoryWorld)  │
//! │   (ChunkListener)    │ ◀────────────────── │                      │
//! └──────────────────────┘  on_chunk_changed   └──────────────────────┘
//! ```

mod coord;
mod memory;
mod source;

pub use coord::{chunk_hash, ChunkCoord};
pub use memory::MemoryWorld;
pub use source::{ChunkListener, ChunkSnapshot, ChunkSource, WorldId};
