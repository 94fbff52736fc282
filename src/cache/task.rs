//! Background encode jobs and the pools that run them.
//!
//! A [`ChunkRequestTask`] carries everything a worker needs to produce the
//! payload for one chunk: the coordinate, the dimension tag, an immutable
//! snapshot, the compressor and the promise to resolve. Running a task always
//! resolves its promise exactly once, with an error if encoding fails or the
//! compressor panics.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::compression::{encode_chunk, Compressor};
use crate::error::CompressionError;
use crate::partition::PartitionTag;
use crate::world::{ChunkCoord, ChunkSnapshot};

use super::promise::{CompressionPromise, CompressionResult};

/// Default number of concurrent encode jobs.
pub const DEFAULT_WORKERS: usize = 4;

// =============================================================================
// Chunk Request Task
// =============================================================================

/// Encode job for one chunk.
pub struct ChunkRequestTask {
    coord: ChunkCoord,
    partition: PartitionTag,
    snapshot: ChunkSnapshot,
    promise: CompressionPromise,
    compressor: Arc<dyn Compressor>,
}

impl ChunkRequestTask {
    pub fn new(
        coord: ChunkCoord,
        partition: PartitionTag,
        snapshot: ChunkSnapshot,
        promise: CompressionPromise,
        compressor: Arc<dyn Compressor>,
    ) -> Self {
        Self {
            coord,
            partition,
            snapshot,
            promise,
            compressor,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn partition(&self) -> PartitionTag {
        self.partition
    }

    /// Promise this task resolves when run.
    pub fn promise(&self) -> &CompressionPromise {
        &self.promise
    }

    /// Serialize and compress the chunk, then resolve the promise.
    ///
    /// Consumes the task, so a task can resolve its promise only once.
    pub fn run(self) {
        let result = catch_unwind(AssertUnwindSafe(|| self.encode())).unwrap_or_else(|panic| {
            Err(CompressionError::WorkerPanicked(panic_message(&*panic)))
        });

        match &result {
            Ok(bytes) => debug!(
                coord = %self.coord,
                partition = %self.partition,
                bytes = bytes.len(),
                "chunk encoded"
            ),
            Err(e) => warn!(
                coord = %self.coord,
                partition = %self.partition,
                error = %e,
                "chunk encode failed"
            ),
        }

        self.promise.resolve(result);
    }

    fn encode(&self) -> CompressionResult {
        let payload = encode_chunk(self.coord, self.partition, &self.snapshot)?;
        self.compressor.compress(&payload)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Task Pool
// =============================================================================

/// Facility that runs encode jobs off the caller's thread.
///
/// `submit` must not block on the job. The pool guarantees that every
/// submitted task is eventually run.
pub trait TaskPool: Send + Sync + 'static {
    fn submit(&self, task: ChunkRequestTask);
}

/// Pool backed by a tokio runtime.
///
/// Each job runs on the blocking thread pool; a semaphore bounds how many
/// jobs compress at once.
pub struct TokioTaskPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
    submitted: AtomicU64,
}

impl TokioTaskPool {
    /// Create a pool on the given runtime with `workers` concurrent jobs.
    pub fn new(handle: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            submitted: AtomicU64::new(0),
        }
    }

    /// Create a pool on the runtime the caller is running in.
    pub fn from_current(workers: usize) -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, workers))
    }

    /// Maximum number of concurrently running jobs.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Total number of jobs submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl TaskPool for TokioTaskPool {
    fn submit(&self, task: ChunkRequestTask) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let permits = self.permits.clone();

        self.handle.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            let coord = task.coord();
            if let Err(e) = tokio::task::spawn_blocking(move || task.run()).await {
                warn!(%coord, error = %e, "encode job did not complete");
            }
        });
    }
}

/// Pool that queues jobs until the owner drains it.
///
/// Suits hosts that run deferred work at a fixed point of their own loop, and
/// makes dispatch observable in tests.
#[derive(Default)]
pub struct DeferredTaskPool {
    queue: Mutex<VecDeque<ChunkRequestTask>>,
    submitted: AtomicU64,
}

impl DeferredTaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Total number of jobs submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Run every queued job on the calling thread. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let tasks: Vec<_> = self.queue.lock().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task.run();
        }
        count
    }

    /// Remove queued jobs without running them.
    pub fn take_pending(&self) -> Vec<ChunkRequestTask> {
        self.queue.lock().drain(..).collect()
    }
}

impl TaskPool for DeferredTaskPool {
    fn submit(&self, task: ChunkRequestTask) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push_back(task);
    }
}

// =============================================================================
// Tests
// =============================================================================
