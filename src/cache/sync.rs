use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::SyncCache;
use super::state::{CacheHandles, InflightGuard};
use crate::core::{Listing, Result};
use crate::remote::{Snapshot, SnapshotStream};

impl SyncCache {
    /// Open the live subscription and keep the mirror current.
    ///
    /// Idempotent: a second call while the subscription task is alive is a
    /// no-op. Sets `loading` until the first snapshot (or error) arrives.
    pub async fn start_sync(&self) -> Result<()> {
        let mut slot = self.sync_task.lock().await;
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        self.handles.clear_error();
        let guard = CacheHandles::begin(&self.handles);
        let stream = match self.remote.subscribe().await {
            Ok(stream) => stream,
            Err(err) => return Err(self.handles.reject(err)),
        };

        *slot = Some(tokio::spawn(ingest_loop(
            stream,
            Arc::clone(&self.handles),
            guard,
        )));
        Ok(())
    }

    /// Release the subscription. No further ingestion occurs after this
    /// returns; the mirror keeps its last contents.
    pub async fn stop_sync(&self) {
        if let Some(task) = self.sync_task.lock().await.take() {
            task.abort();
        }
    }
}

async fn ingest_loop(mut stream: SnapshotStream, handles: Arc<CacheHandles>, guard: InflightGuard) {
    // `loading` covers only the window until the first event; later
    // snapshots replace the mirror silently.
    let mut initial = Some(guard);
    while let Some(event) = stream.next().await {
        match event {
            Ok(snapshot) => {
                let fresh = decode_snapshot(snapshot);
                debug!(records = fresh.len(), "collection snapshot applied");
                handles.replace_mirror(fresh);
            }
            Err(err) => {
                warn!(error = %err, "subscription error, keeping last mirror");
                handles.record_error(err);
            }
        }
        initial.take();
    }
}

/// Permissive decode of one raw record: missing fields default to empty
/// strings, the map key is the authoritative id. Only a record whose body is
/// not an object at all is skipped.
pub(crate) fn decode_record(id: &str, raw: Value) -> Option<Listing> {
    let mut listing: Listing = serde_json::from_value(raw).ok()?;
    listing.id = id.to_string();
    Some(listing)
}

/// Rebuild the whole mirror from one snapshot. Full replace, no incremental
/// diffing: downstream views assume atomic whole-mirror replacement. Sorted
/// id-descending as the recency proxy (ids are time-ordered tokens).
pub(crate) fn decode_snapshot(snapshot: Snapshot) -> Vec<Listing> {
    let mut fresh: Vec<Listing> = snapshot
        .into_iter()
        .filter(|(id, _)| !id.is_empty())
        .filter_map(|(id, raw)| decode_record(&id, raw))
        .collect();
    fresh.sort_by(|a, b| b.id.cmp(&a.id));
    fresh
}
