/// Subscription and ingestion tests
///
/// Run with: cargo test --test cache_sync_tests
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::timeout;

use lotsync::{
    CacheError, FixedIdentity, Listing, MemoryCollection, RemoteCollection, Result, Snapshot,
    SnapshotStream, SyncCache,
};

/// Remote collection fed by the test through a channel, so snapshots arrive
/// exactly when and how the test says.
struct ScriptedCollection {
    feed: Mutex<Option<mpsc::UnboundedReceiver<Result<Snapshot>>>>,
}

impl ScriptedCollection {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Snapshot>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                feed: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl RemoteCollection for ScriptedCollection {
    async fn subscribe(&self) -> Result<SnapshotStream> {
        let rx = self
            .feed
            .lock()
            .await
            .take()
            .ok_or_else(|| CacheError::Transport("already subscribed".into()))?;
        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }

    async fn get_one(&self, _id: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn put(&self, _id: &str, _listing: &Listing) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn new_id(&self) -> Option<String> {
        None
    }
}

async fn wait_until(
    rx: &mut watch::Receiver<Vec<Listing>>,
    pred: impl Fn(&[Listing]) -> bool,
) -> Vec<Listing> {
    timeout(Duration::from_secs(2), async {
        loop {
            if pred(&rx.borrow()) {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("cache dropped");
        }
    })
    .await
    .expect("mirror never reached the expected state")
}

fn scripted_cache() -> (SyncCache, mpsc::UnboundedSender<Result<Snapshot>>) {
    let (remote, tx) = ScriptedCollection::new();
    let cache = SyncCache::new(remote, Arc::new(FixedIdentity::anonymous()));
    (cache, tx)
}

#[tokio::test]
async fn first_snapshot_fills_the_mirror_and_clears_loading() {
    let (cache, tx) = scripted_cache();
    let mut mirror_rx = cache.watch_mirror();

    cache.start_sync().await.unwrap();
    assert!(cache.loading());

    tx.send(Ok(Snapshot::from([
        ("a2".to_string(), json!({"name": "RAV4", "category": "SUV"})),
        ("a1".to_string(), json!({"name": "Civic", "category": "Sedan"})),
    ])))
    .unwrap();

    let mirror = wait_until(&mut mirror_rx, |m| m.len() == 2).await;
    assert_eq!(mirror[0].id, "a2");
    assert_eq!(mirror[1].id, "a1");
    assert!(!cache.loading());
    assert!(cache.last_error().is_none());
}

#[tokio::test]
async fn reapplying_the_same_snapshot_changes_nothing() {
    let (cache, tx) = scripted_cache();
    let mut mirror_rx = cache.watch_mirror();
    cache.start_sync().await.unwrap();

    let snapshot = Snapshot::from([
        ("a1".to_string(), json!({"name": "Civic"})),
        ("a2".to_string(), json!({"name": "RAV4"})),
    ]);

    tx.send(Ok(snapshot.clone())).unwrap();
    let first = wait_until(&mut mirror_rx, |m| m.len() == 2).await;

    // Fresh receiver: any loading transition after this point would show up
    // as a change.
    let loading_rx = cache.watch_loading();

    tx.send(Ok(snapshot)).unwrap();
    mirror_rx.changed().await.unwrap();

    assert_eq!(cache.mirror(), first);
    assert!(!cache.loading());
    assert!(!loading_rx.has_changed().unwrap());
}

#[tokio::test]
async fn subscription_error_keeps_the_last_good_mirror() {
    let (cache, tx) = scripted_cache();
    let mut mirror_rx = cache.watch_mirror();
    let mut error_rx = cache.watch_last_error();
    cache.start_sync().await.unwrap();

    tx.send(Ok(Snapshot::from([(
        "a1".to_string(),
        json!({"name": "Civic"}),
    )])))
    .unwrap();
    wait_until(&mut mirror_rx, |m| m.len() == 1).await;

    tx.send(Err(CacheError::Transport("connection reset".into())))
        .unwrap();
    timeout(Duration::from_secs(2), async {
        loop {
            if error_rx.borrow().is_some() {
                break;
            }
            error_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("transport error never surfaced");

    assert_eq!(cache.mirror().len(), 1);
    assert!(matches!(
        cache.last_error(),
        Some(CacheError::Transport(_))
    ));
    assert!(!cache.loading());
}

#[tokio::test]
async fn start_sync_is_idempotent() {
    let remote = Arc::new(MemoryCollection::new());
    let cache = SyncCache::new(remote.clone(), Arc::new(FixedIdentity::anonymous()));
    let mut mirror_rx = cache.watch_mirror();

    cache.start_sync().await.unwrap();
    cache.start_sync().await.unwrap();
    cache.start_sync().await.unwrap();

    remote
        .put(
            "a1",
            &Listing {
                id: "a1".into(),
                name: "Civic".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mirror = wait_until(&mut mirror_rx, |m| m.len() == 1).await;
    assert_eq!(mirror[0].name, "Civic");
}

#[tokio::test]
async fn no_ingestion_after_stop() {
    let remote = Arc::new(MemoryCollection::new());
    let cache = SyncCache::new(remote.clone(), Arc::new(FixedIdentity::anonymous()));
    let mut mirror_rx = cache.watch_mirror();

    cache.start_sync().await.unwrap();
    remote
        .put(
            "a1",
            &Listing {
                id: "a1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    wait_until(&mut mirror_rx, |m| m.len() == 1).await;

    cache.stop_sync().await;
    remote
        .put(
            "a2",
            &Listing {
                id: "a2".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.mirror().len(), 1);
}

#[tokio::test]
async fn restart_after_stop_resumes_ingestion() {
    let remote = Arc::new(MemoryCollection::new());
    let cache = SyncCache::new(remote.clone(), Arc::new(FixedIdentity::anonymous()));
    let mut mirror_rx = cache.watch_mirror();

    cache.start_sync().await.unwrap();
    cache.stop_sync().await;

    remote
        .put(
            "a1",
            &Listing {
                id: "a1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    cache.start_sync().await.unwrap();
    let mirror = wait_until(&mut mirror_rx, |m| m.len() == 1).await;
    assert_eq!(mirror[0].id, "a1");
}

#[tokio::test]
async fn malformed_records_default_instead_of_dropping() {
    let (cache, tx) = scripted_cache();
    let mut mirror_rx = cache.watch_mirror();
    cache.start_sync().await.unwrap();

    tx.send(Ok(Snapshot::from([
        // No fields at all: tolerated, defaults to empty strings.
        ("a1".to_string(), json!({})),
        // Empty key: never inserted into the mirror.
        ("".to_string(), json!({"name": "ghost"})),
    ])))
    .unwrap();

    let mirror = wait_until(&mut mirror_rx, |m| m.len() == 1).await;
    assert_eq!(mirror[0].id, "a1");
    assert_eq!(mirror[0].name, "");
}
