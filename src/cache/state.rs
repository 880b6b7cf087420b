use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::core::{CacheError, Listing};

/// The reactive state cells behind a `SyncCache`.
///
/// Each readable is a watch channel: consumers either borrow the current
/// value synchronously or subscribe a receiver and observe changes. The
/// ingestion task holds a clone of the `Arc`, so the cells outlive any one
/// caller.
pub(crate) struct CacheHandles {
    mirror: watch::Sender<Vec<Listing>>,
    selected: watch::Sender<Option<Listing>>,
    loading: watch::Sender<bool>,
    last_error: watch::Sender<Option<CacheError>>,
    /// Ingestion and mutations overlap; `loading` stays true until the last
    /// outstanding operation finishes.
    inflight: AtomicUsize,
}

impl CacheHandles {
    pub fn new() -> Self {
        let (mirror, _) = watch::channel(Vec::new());
        let (selected, _) = watch::channel(None);
        let (loading, _) = watch::channel(false);
        let (last_error, _) = watch::channel(None);
        Self {
            mirror,
            selected,
            loading,
            last_error,
            inflight: AtomicUsize::new(0),
        }
    }

    // ---- reads ----

    pub fn mirror(&self) -> Vec<Listing> {
        self.mirror.borrow().clone()
    }

    /// Run a read against a single borrowed mirror value. Every derived view
    /// goes through here so no view mixes two snapshots.
    pub fn with_mirror<T>(&self, f: impl FnOnce(&[Listing]) -> T) -> T {
        f(&self.mirror.borrow())
    }

    pub fn selected(&self) -> Option<Listing> {
        self.selected.borrow().clone()
    }

    pub fn loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn last_error(&self) -> Option<CacheError> {
        self.last_error.borrow().clone()
    }

    // ---- watchers ----

    pub fn watch_mirror(&self) -> watch::Receiver<Vec<Listing>> {
        self.mirror.subscribe()
    }

    pub fn watch_selected(&self) -> watch::Receiver<Option<Listing>> {
        self.selected.subscribe()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn watch_last_error(&self) -> watch::Receiver<Option<CacheError>> {
        self.last_error.subscribe()
    }

    // ---- writes ----

    /// Full mirror replace, the ingestion contract.
    pub fn replace_mirror(&self, fresh: Vec<Listing>) {
        self.mirror.send_replace(fresh);
    }

    /// Optimistic insert-or-replace keeping the id-descending order.
    pub fn apply_upsert(&self, listing: Listing) {
        self.mirror.send_modify(|mirror| {
            match mirror.iter_mut().find(|l| l.id == listing.id) {
                Some(slot) => *slot = listing,
                None => {
                    mirror.push(listing);
                    mirror.sort_by(|a, b| b.id.cmp(&a.id));
                }
            }
        });
    }

    /// Optimistic removal.
    pub fn apply_remove(&self, id: &str) {
        self.mirror.send_modify(|mirror| mirror.retain(|l| l.id != id));
    }

    pub fn set_selected(&self, value: Option<Listing>) {
        self.selected.send_replace(value);
    }

    /// Called at the start of every operation.
    pub fn clear_error(&self) {
        self.last_error.send_replace(None);
    }

    pub fn record_error(&self, err: CacheError) {
        self.last_error.send_replace(Some(err));
    }

    /// Record and hand the error back, for `return Err(handles.reject(err))`.
    pub fn reject(&self, err: CacheError) -> CacheError {
        self.record_error(err.clone());
        err
    }

    /// Mark one operation in flight. `loading` turns true with the first
    /// guard and false when the last one drops.
    pub fn begin(this: &Arc<Self>) -> InflightGuard {
        if this.inflight.fetch_add(1, Ordering::SeqCst) == 0 {
            this.loading.send_replace(true);
        }
        InflightGuard {
            handles: Arc::clone(this),
        }
    }
}

pub(crate) struct InflightGuard {
    handles: Arc<CacheHandles>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.handles.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.handles.loading.send_replace(false);
        }
    }
}
