pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::core::{Listing, Result};

pub use memory::MemoryCollection;

/// A full point-in-time view of the remote collection: record id to raw
/// record body.
pub type Snapshot = HashMap<String, Value>;

/// Stream of full-collection snapshots delivered by a live subscription.
/// Errors carry `CacheError::Transport`.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot>>;

/// The remote realtime collection the cache mirrors.
///
/// Implementations map their failures into the cache taxonomy: `subscribe`
/// and `get_one` report `Transport`, `put` and `delete` report `RemoteWrite`.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Open a live subscription. The current collection contents are
    /// delivered as the first snapshot, then one snapshot per change.
    async fn subscribe(&self) -> Result<SnapshotStream>;

    /// One-shot fetch of a single record. Absent is `Ok(None)`, not an error.
    async fn get_one(&self, id: &str) -> Result<Option<Value>>;

    /// Full-record replace. Creates the record if it does not exist.
    async fn put(&self, id: &str, listing: &Listing) -> Result<()>;

    /// Remove a record. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Allocate a collection-unique, time-ordered id. `None` when the
    /// allocator is unavailable; the caller falls back to a local token.
    async fn new_id(&self) -> Option<String>;
}
