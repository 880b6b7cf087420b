mod mutation;
mod state;
mod sync;
mod views;

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::core::{CacheError, Listing, Result};
use crate::identity::Identity;
use crate::remote::RemoteCollection;
use crate::upload::ImageUpload;

use state::CacheHandles;
use sync::decode_record;

/// Session-scoped reactive mirror of one remote listing collection.
///
/// One instance per active session, passed by reference to consumers; there
/// is no ambient global. Readables (`mirror`, `selected`, `loading`,
/// `last_error`) can be read synchronously or watched for changes; commands
/// go through the optimistic mutation pipeline.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use lotsync::{FixedIdentity, ListingDraft, MemoryCollection, SyncCache};
///
/// # async fn demo() -> lotsync::Result<()> {
/// let remote = Arc::new(MemoryCollection::new());
/// let cache = SyncCache::new(remote, Arc::new(FixedIdentity::new("user-1")));
/// cache.start_sync().await?;
///
/// let draft = ListingDraft {
///     name: "Civic".into(),
///     price: "10000".into(),
///     category: "Sedan".into(),
///     seller_name: "Bo".into(),
///     ..Default::default()
/// };
/// let listing = cache.create(draft, None).await?;
/// assert!(cache.by_id(&listing.id).is_some());
/// # Ok(())
/// # }
/// ```
pub struct SyncCache {
    remote: Arc<dyn RemoteCollection>,
    uploader: Option<Arc<dyn ImageUpload>>,
    identity: Arc<dyn Identity>,
    handles: Arc<CacheHandles>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCache {
    pub fn new(remote: Arc<dyn RemoteCollection>, identity: Arc<dyn Identity>) -> Self {
        Self {
            remote,
            uploader: None,
            identity,
            handles: Arc::new(CacheHandles::new()),
            sync_task: Mutex::new(None),
        }
    }

    /// Attach an image uploader. Without one, a mutation carrying image
    /// bytes follows the non-fatal upload-failure path.
    pub fn with_uploader(mut self, uploader: Arc<dyn ImageUpload>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    // ---- reactive readables ----

    /// Current mirror contents, most-recently-created first. Callers that
    /// need consistency across a compound read snapshot once and derive from
    /// the returned value.
    pub fn mirror(&self) -> Vec<Listing> {
        self.handles.mirror()
    }

    pub fn selected(&self) -> Option<Listing> {
        self.handles.selected()
    }

    /// True exactly while at least one ingestion or mutation request is
    /// outstanding.
    pub fn loading(&self) -> bool {
        self.handles.loading()
    }

    /// Failure of the most recent operation, if any. Cleared at the start of
    /// every operation.
    pub fn last_error(&self) -> Option<CacheError> {
        self.handles.last_error()
    }

    pub fn watch_mirror(&self) -> watch::Receiver<Vec<Listing>> {
        self.handles.watch_mirror()
    }

    pub fn watch_selected(&self) -> watch::Receiver<Option<Listing>> {
        self.handles.watch_selected()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.handles.watch_loading()
    }

    pub fn watch_last_error(&self) -> watch::Receiver<Option<CacheError>> {
        self.handles.watch_last_error()
    }

    // ---- single-item load ----

    /// One-shot fetch, awaitable mode: returns the record (or `None` when
    /// absent, which is a normal outcome) and updates `selected`.
    pub async fn load_by_id(&self, id: &str) -> Result<Option<Listing>> {
        self.handles.clear_error();
        let _guard = CacheHandles::begin(&self.handles);
        fetch_one(self.remote.as_ref(), &self.handles, id).await
    }

    /// One-shot fetch, subscribed mode: no return value, the result lands in
    /// `selected` (with `loading`/`last_error` toggled along the way).
    pub fn load_by_id_detached(&self, id: &str) {
        let remote = Arc::clone(&self.remote);
        let handles = Arc::clone(&self.handles);
        let id = id.to_string();
        tokio::spawn(async move {
            handles.clear_error();
            let _guard = CacheHandles::begin(&handles);
            let _ = fetch_one(remote.as_ref(), &handles, &id).await;
        });
    }

    pub fn clear_selected(&self) {
        self.handles.set_selected(None);
    }
}

impl Drop for SyncCache {
    fn drop(&mut self) {
        // Releasing the session releases the subscription.
        if let Some(task) = self.sync_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn fetch_one(
    remote: &dyn RemoteCollection,
    handles: &Arc<CacheHandles>,
    id: &str,
) -> Result<Option<Listing>> {
    match remote.get_one(id).await {
        Ok(raw) => {
            let listing = raw.and_then(|raw| decode_record(id, raw));
            handles.set_selected(listing.clone());
            Ok(listing)
        }
        // Transport failure: keep the last good `selected`.
        Err(err) => Err(handles.reject(err)),
    }
}
