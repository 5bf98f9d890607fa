//! In-flight request coalescing.
//!
//! When several callers ask for the same uncached [`CacheKey`] at once, only
//! the first one generates the tile; the others wait for its outcome.
//!
//! ```text
//! Request A ─┐                       ┌─► Owner: fetch → decode → render → encode
//!            │                       │          │
//! Request B ─┼──► InFlight ──────────┤          ▼ resolve(outcome)
//!            │                       │     ┌─────────┐
//! Request C ─┘                       └─► Waiters ◄───┘ same Ok(bytes) or Err(e)
//! ```
//!
//! Each generation gets a single-slot `tokio::sync::watch` channel. The
//! [`PipelineOwner`] holds the only sender and writes the slot exactly once;
//! the registry keeps a receiver so later callers can subscribe. The entry
//! is removed from the registry before the slot is written, so a request
//! arriving afterwards starts a fresh generation (or, if the owner cached the
//! tile first, finds it in the cache).
//!
//! If the owner is dropped without resolving (its request was cancelled),
//! every waiter receives [`TileError::Cancelled`] instead of hanging.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Result, TileError};
use crate::key::CacheKey;

type Slot = Option<Result<Bytes>>;
type Registry = Arc<Mutex<HashMap<CacheKey, watch::Receiver<Slot>>>>;

/// Registry of tiles currently being generated.
#[derive(Default)]
pub struct InFlight {
    pending: Registry,
}

/// Outcome of [`InFlight::acquire_or_join`].
pub enum Acquired {
    /// No generation was running for the key; the caller must run it and
    /// call [`PipelineOwner::resolve`].
    Owner(PipelineOwner),
    /// Another caller is generating the key; wait on the handle.
    Waiter(PipelineWaiter),
}

impl InFlight {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the owner of `key`'s generation, or join the one already running.
    ///
    /// Exactly one caller per key is handed [`Acquired::Owner`] until that
    /// owner resolves or is dropped.
    pub fn acquire_or_join(&self, key: CacheKey) -> Acquired {
        let mut pending = self.pending.lock();

        if let Some(rx) = pending.get(&key) {
            debug!(key = %key, "Joining in-flight tile generation");
            return Acquired::Waiter(PipelineWaiter {
                key,
                rx: rx.clone(),
            });
        }

        let (tx, rx) = watch::channel(None);
        pending.insert(key, rx);
        debug!(key = %key, in_flight = pending.len(), "Starting tile generation");

        Acquired::Owner(PipelineOwner {
            key,
            tx: Some(tx),
            pending: Arc::clone(&self.pending),
        })
    }

    /// Number of generations currently running.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if nothing is being generated.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// The single producer of one key's generation.
pub struct PipelineOwner {
    key: CacheKey,
    tx: Option<watch::Sender<Slot>>,
    pending: Registry,
}

impl PipelineOwner {
    /// The key being generated.
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Deregister the key and deliver `outcome` to every waiter.
    ///
    /// Returns `outcome` so the owner can hand it to its own caller.
    pub fn resolve(mut self, outcome: Result<Bytes>) -> Result<Bytes> {
        self.pending.lock().remove(&self.key);
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome.clone()));
        }
        outcome
    }
}

impl Drop for PipelineOwner {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            self.pending.lock().remove(&self.key);
            warn!(key = %self.key, waiters = tx.receiver_count(), "Tile generation abandoned");
            tx.send_replace(Some(Err(TileError::Cancelled { key: self.key })));
        }
    }
}

/// A caller waiting on another caller's generation.
pub struct PipelineWaiter {
    key: CacheKey,
    rx: watch::Receiver<Slot>,
}

impl PipelineWaiter {
    /// The key being waited on.
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Wait for the owner's outcome.
    pub async fn wait(mut self) -> Result<Bytes> {
        let cancelled = TileError::Cancelled { key: self.key };
        match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Err(cancelled)),
            Err(_) => Err(cancelled),
        }
    }
}
