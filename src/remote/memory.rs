use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::{RemoteCollection, Snapshot, SnapshotStream};
use crate::core::{CacheError, Listing, Result};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// HashMap-backed realtime collection.
///
/// Ships with the crate as the local-development and test backend: every
/// write broadcasts a fresh full snapshot to all live subscriptions, the way
/// a hosted realtime store pushes value events. Ids are allocated
/// time-ordered so the mirror's recency sort holds.
pub struct MemoryCollection {
    records: RwLock<HashMap<String, Value>>,
    updates: broadcast::Sender<Snapshot>,
    seq: AtomicU64,
}

impl MemoryCollection {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            updates,
            seq: AtomicU64::new(0),
        }
    }

    /// Allocate a lexically sortable id: zero-padded epoch milliseconds, a
    /// six-digit per-instance sequence, and a random suffix for uniqueness
    /// across instances.
    pub fn allocate_id(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        let tail = Uuid::new_v4().simple().to_string();
        format!("{millis:013}{seq:06}{}", &tail[..8])
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn broadcast_current(&self) {
        let snapshot = self.records.read().await.clone();
        // Nobody listening is fine.
        let _ = self.updates.send(snapshot);
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCollection for MemoryCollection {
    async fn subscribe(&self) -> Result<SnapshotStream> {
        let rx = self.updates.subscribe();
        let initial = self.records.read().await.clone();

        let live = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => return Some((Ok(snapshot), rx)),
                    // A lagged receiver only missed intermediate snapshots;
                    // the next one is still a full view.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(futures::stream::once(async move { Ok(initial) })
            .chain(live)
            .boxed())
    }

    async fn get_one(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, id: &str, listing: &Listing) -> Result<()> {
        let body =
            serde_json::to_value(listing).map_err(|e| CacheError::RemoteWrite(e.to_string()))?;
        self.records.write().await.insert(id.to_string(), body);
        self.broadcast_current().await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id);
        self.broadcast_current().await;
        Ok(())
    }

    async fn new_id(&self) -> Option<String> {
        Some(self.allocate_id())
    }
}
