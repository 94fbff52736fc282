//! Single-assignment promise for a compressed chunk payload.
//!
//! A [`CompressionPromise`] is created unresolved when a cache misses, handed
//! to every requester of that chunk, and resolved exactly once by the
//! background job. Callbacks may be attached before or after resolution:
//!
//! - before: they are queued and fire at resolution, in attachment order
//! - after: they fire immediately on the attaching thread
//!
//! Resolving twice is a dispatch bug and panics. A queued callback that
//! panics is logged and does not stop the callbacks queued after it.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::CompressionError;

/// Outcome delivered to every waiter of a promise.
pub type CompressionResult = Result<Bytes, CompressionError>;

type Callback = Box<dyn FnOnce(&CompressionResult) + Send>;

struct PromiseState {
    result: Option<CompressionResult>,
    callbacks: Vec<Callback>,
}

/// Shared handle to the compressed bytes of one chunk, once ready.
///
/// Cloning the handle is cheap and every clone observes the same result.
#[derive(Clone)]
pub struct CompressionPromise {
    inner: Arc<Mutex<PromiseState>>,
}

impl CompressionPromise {
    /// Create an unresolved promise.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PromiseState {
                result: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Store the result and fire every queued callback.
    ///
    /// # Panics
    ///
    /// Panics if the promise was already resolved.
    pub fn resolve(&self, result: CompressionResult) {
        let callbacks = {
            let mut state = self.inner.lock();
            if state.result.is_some() {
                panic!("compression promise resolved twice");
            }
            state.result = Some(result.clone());
            std::mem::take(&mut state.callbacks)
        };

        for (index, callback) in callbacks.into_iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| callback(&result))).is_err() {
                warn!(callback = index, "compression promise callback panicked");
            }
        }
    }

    /// Run `callback` with the result, now if resolved, otherwise at resolution.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&CompressionResult) + Send + 'static,
    {
        let result = {
            let mut state = self.inner.lock();
            match &state.result {
                Some(result) => result.clone(),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };

        callback(&result);
    }

    /// Wait asynchronously for the result.
    pub async fn wait(&self) -> CompressionResult {
        let (tx, rx) = oneshot::channel();
        self.on_complete(move |result| {
            let _ = tx.send(result.clone());
        });

        // `self` keeps the queued sender alive, so this only errs if the
        // callback was dropped without running.
        rx.await.unwrap_or_else(|_| {
            Err(CompressionError::WorkerPanicked(
                "promise dropped before resolution".to_string(),
            ))
        })
    }

    /// Whether a result has been stored.
    pub fn is_resolved(&self) -> bool {
        self.inner.lock().result.is_some()
    }

    /// The stored result, if resolved.
    pub fn result(&self) -> Option<CompressionResult> {
        self.inner.lock().result.clone()
    }

    /// Size of the payload if resolved successfully.
    pub(crate) fn payload_len(&self) -> Option<usize> {
        match &self.inner.lock().result {
            Some(Ok(bytes)) => Some(bytes.len()),
            _ => None,
        }
    }

    /// Whether both handles refer to the same promise.
    pub fn same_as(&self, other: &CompressionPromise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CompressionPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressionPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("CompressionPromise")
            .field("resolved", &state.result.is_some())
            .field("pending_callbacks", &state.callbacks.len())
            .finish()
    }
}
