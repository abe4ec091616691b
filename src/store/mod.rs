//! Path-addressed record store.
//!
//! The store holds one JSON tree. Every operation names a subtree by a
//! `/`-separated path; typed decoding happens in the callers.

mod memory;
pub mod path;
pub mod wal;

pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::notify::Change;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Read,
    Write,
    Update,
    Remove,
    Push,
    Subscribe,
    /// A stored value did not have the expected shape.
    Decode,
    Encode,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Read => "read",
            StoreOp::Write => "write",
            StoreOp::Update => "update",
            StoreOp::Remove => "remove",
            StoreOp::Push => "push",
            StoreOp::Subscribe => "subscribe",
            StoreOp::Decode => "decode",
            StoreOp::Encode => "encode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub operation: StoreOp,
    pub path: String,
    pub cause: String,
}

impl StoreError {
    pub fn new(operation: StoreOp, path: &str, cause: impl fmt::Display) -> Self {
        Self {
            operation,
            path: path.to_string(),
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {} at '{}' failed: {}", self.operation.as_str(), self.path, self.cause)
    }
}

impl std::error::Error for StoreError {}

/// Live feed of changes under a path. Dropping it unsubscribes.
pub struct Subscription {
    path: String,
    rx: broadcast::Receiver<Change>,
}

impl Subscription {
    pub(crate) fn new(path: String, rx: broadcast::Receiver<Change>) -> Self {
        Self { path, rx }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %self.path, skipped, "subscriber lagged, dropping changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next change if one is already queued.
    pub fn try_recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point read of the subtree at `path`.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the subtree at `path`. Writing `Null` removes it.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge the named children into `path`, leaving siblings untouched.
    /// A `Null` child is removed.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete the subtree at `path`. Missing paths are not an error.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Store `value` under a fresh child key of `path` and return the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Receive every change at, above, or below `path`.
    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}
