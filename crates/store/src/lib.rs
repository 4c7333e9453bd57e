//! kubedeck store: in-RAM cache of projected objects per kind.
//!
//! Deltas flow through a [`Coalescer`] into a [`WorldBuilder`] owned by the
//! ingest task, which publishes immutable [`World`] snapshots through an
//! `ArcSwap`. [`Store`] reads those snapshots and answers the relationship
//! queries of [`kubedeck_api::Repository`].

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use kubedeck_api::{RelationKey, RepoError, RepoResult, Repository};
use kubedeck_core::{CrdDescriptor, Delta, Item, ObjRef, ResourceKind, StoredObject};
use metrics::{counter, gauge, histogram};
use rustc_hash::FxHashSet;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

mod coalesce;
mod world;

pub use coalesce::Coalescer;
pub use world::{KindState, World, WorldBuilder};

use world::in_namespace;

/// How long a fresh engage waits for the ingest loop to publish its sync marker.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Messages accepted by the ingest loop.
#[derive(Debug, Clone)]
pub enum Ingest {
    Delta(ResourceKind, Delta),
    /// Initial listing of a kind is complete.
    Synced(ResourceKind),
    /// The kind cannot be synced; readers see [`RepoError::SyncFailed`].
    SyncFailed(ResourceKind, String),
    RegisterCrd(CrdDescriptor),
}

/// On-demand data source: started the first time a kind is requested.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Begin delivering objects of `kind` into `sink`, followed by
    /// [`Ingest::Synced`] or [`Ingest::SyncFailed`].
    async fn engage(&self, kind: &ResourceKind, sink: mpsc::Sender<Ingest>) -> anyhow::Result<()>;
}

/// Read handle over the published snapshots.
#[derive(Clone)]
pub struct Store {
    snap: Arc<ArcSwap<World>>,
    epoch_rx: watch::Receiver<u64>,
    tx: mpsc::Sender<Ingest>,
    source: Option<Arc<dyn Source>>,
    engaged: Arc<Mutex<FxHashSet<String>>>,
}

impl Store {
    pub fn current(&self) -> Arc<World> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }
    pub fn sender(&self) -> mpsc::Sender<Ingest> { self.tx.clone() }

    /// Wait until a snapshot with `epoch >= min` is published.
    pub async fn wait_for_epoch(&self, min: u64) -> bool {
        let mut rx = self.epoch_rx.clone();
        loop {
            if *rx.borrow() >= min {
                return true;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow() >= min;
            }
        }
    }

    /// Whether the initial listing of `kind` has been applied, successfully or not.
    fn settled(&self, kind: &ResourceKind) -> bool {
        self.objects(kind).map(|k| k.synced || k.error.is_some()).unwrap_or(false)
    }

    /// Wait for the ingest loop to publish the sync marker of `kind`.
    async fn wait_settled(&self, kind: &ResourceKind) -> bool {
        let mut rx = self.epoch_rx.clone();
        let settle = async {
            loop {
                if self.settled(kind) {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return self.settled(kind);
                }
            }
        };
        tokio::time::timeout(SETTLE_TIMEOUT, settle).await.unwrap_or(false)
    }

    fn objects(&self, kind: &ResourceKind) -> Option<Arc<KindState>> {
        self.snap.load().kind(kind).cloned()
    }

    fn select(&self, kind: &ResourceKind, pred: impl Fn(&StoredObject) -> bool) -> Vec<Item> {
        match self.objects(kind) {
            Some(state) => state.objects.iter().filter(|o| pred(o)).map(|o| Arc::clone(&o.item)).collect(),
            None => Vec::new(),
        }
    }

    fn source_object(&self, key: &RelationKey) -> RepoResult<StoredObject> {
        self.snap
            .load()
            .find(&key.kind, &key.name, key.namespace.as_deref())
            .cloned()
            .ok_or_else(|| RepoError::NotFound(key.to_string()))
    }
}

fn publish(builder: &mut WorldBuilder, snap: &ArcSwap<World>, epoch_tx: &watch::Sender<u64>) {
    let next = builder.freeze();
    let epoch = next.epoch;
    let objects: usize = next.kinds.values().map(|k| k.objects.len()).sum();
    snap.store(next);
    gauge!("store_objects", objects as f64);
    let _ = epoch_tx.send(epoch);
}

fn flush(coalescer: &mut Coalescer, builder: &mut WorldBuilder) -> bool {
    let batch = coalescer.drain_ready();
    if batch.is_empty() {
        return false;
    }
    let started = Instant::now();
    let n = batch.len();
    builder.apply(batch);
    histogram!("store_ingest_batch", n as f64);
    debug!(batch = n, took_ms = %started.elapsed().as_millis(), "store: batch applied");
    true
}

/// Spawn the ingest loop. `source`, when given, is engaged lazily by
/// [`Repository::ensure_loaded`].
pub fn spawn_ingest(cap: usize, source: Option<Arc<dyn Source>>) -> Store {
    let (tx, mut rx) = mpsc::channel::<Ingest>(cap.max(1));
    let snap = Arc::new(ArcSwap::from_pointee(World::default()));
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    let snap_clone = Arc::clone(&snap);

    tokio::spawn(async move {
        let mut coalescer = Coalescer::with_capacity(cap);
        let mut builder = WorldBuilder::new();
        let mut ticker = tokio::time::interval(Duration::from_millis(8));
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    match maybe {
                        Some(Ingest::Delta(kind, d)) => coalescer.push(kind, d),
                        // Markers apply after every delta queued before them.
                        Some(Ingest::Synced(kind)) => {
                            flush(&mut coalescer, &mut builder);
                            builder.mark_synced(&kind);
                            info!(gvk = %kind, "store: synced");
                            publish(&mut builder, &snap_clone, &epoch_tx);
                        }
                        Some(Ingest::SyncFailed(kind, reason)) => {
                            flush(&mut coalescer, &mut builder);
                            warn!(gvk = %kind, error = %reason, "store: sync failed");
                            builder.mark_failed(&kind, &reason);
                            publish(&mut builder, &snap_clone, &epoch_tx);
                        }
                        Some(Ingest::RegisterCrd(crd)) => builder.register_crd(crd),
                        None => {
                            debug!("ingest channel closed; draining and exiting ingest loop");
                            if flush(&mut coalescer, &mut builder) {
                                publish(&mut builder, &snap_clone, &epoch_tx);
                            }
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if flush(&mut coalescer, &mut builder) {
                        publish(&mut builder, &snap_clone, &epoch_tx);
                    }
                }
            }
        }
        if coalescer.dropped() > 0 {
            counter!("store_coalescer_dropped", coalescer.dropped());
        }
        info!("ingest loop stopped");
    });

    Store { snap, epoch_rx, tx, source, engaged: Arc::new(Mutex::new(FxHashSet::default())) }
}

fn engaged_set(m: &Mutex<FxHashSet<String>>) -> std::sync::MutexGuard<'_, FxHashSet<String>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl Repository for Store {
    async fn list_resources(&self, kind: &ResourceKind) -> RepoResult<Vec<Item>> {
        Ok(self.select(kind, |_| true))
    }

    async fn list_by_owner(&self, kind: &ResourceKind, owner: &RelationKey) -> RepoResult<Vec<Item>> {
        let want = ObjRef::new(&owner.kind, &owner.name);
        Ok(self.select(kind, |o| in_namespace(o, owner.namespace.as_deref()) && o.links.owners.contains(&want)))
    }

    async fn list_by_node(&self, kind: &ResourceKind, node: &RelationKey) -> RepoResult<Vec<Item>> {
        Ok(self.select(kind, |o| o.links.node.as_deref() == Some(node.name.as_str())))
    }

    async fn list_by_selector(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        let src = self.source_object(source)?;
        let selector = src.links.selector.unwrap_or_default();
        // An empty selector selects nothing.
        if selector.is_empty() {
            return Ok(Vec::new());
        }
        let ns = src.namespace.clone();
        Ok(self.select(kind, |o| {
            o.namespace == ns && selector.iter().all(|(k, v)| o.labels.get(k) == Some(v))
        }))
    }

    async fn list_by_namespace(&self, kind: &ResourceKind, namespace: &RelationKey) -> RepoResult<Vec<Item>> {
        Ok(self.select(kind, |o| o.namespace.as_deref() == Some(namespace.name.as_str())))
    }

    async fn list_by_volume(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        if source.kind.is_empty() {
            return Err(RepoError::Unsupported(format!("volume source without kind: {}", source.name)));
        }
        let want = ObjRef::new(&source.kind, &source.name);
        Ok(self.select(kind, |o| in_namespace(o, source.namespace.as_deref()) && o.links.volumes.contains(&want)))
    }

    async fn list_by_pvc(&self, kind: &ResourceKind, claim: &RelationKey) -> RepoResult<Vec<Item>> {
        let want = ObjRef::new("PersistentVolumeClaim", &claim.name);
        Ok(self.select(kind, |o| in_namespace(o, claim.namespace.as_deref()) && o.links.volumes.contains(&want)))
    }

    async fn list_by_target_ref(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        let src = self.source_object(source)?;
        let names: FxHashSet<&str> =
            src.links.refs.iter().filter(|r| r.kind == kind.kind).map(|r| r.name.as_str()).collect();
        let ns = src.namespace.clone();
        Ok(self.select(kind, |o| o.namespace == ns && names.contains(o.name.as_str())))
    }

    async fn ensure_loaded(&self, kind: &ResourceKind) -> RepoResult<()> {
        let Some(source) = self.source.as_ref() else {
            return Ok(());
        };
        let fresh = engaged_set(&self.engaged).insert(kind.gvk_key());
        if !fresh {
            return Ok(());
        }
        info!(gvk = %kind, "store: engaging source");
        if let Err(e) = source.engage(kind, self.tx.clone()).await {
            engaged_set(&self.engaged).remove(&kind.gvk_key());
            warn!(gvk = %kind, error = %e, "store: engage failed");
            return Err(RepoError::Internal(format!("{}: {}", kind, e)));
        }
        counter!("store_sources_engaged", 1u64);
        if !self.wait_settled(kind).await {
            debug!(gvk = %kind, "store: source still syncing after engage");
        }
        Ok(())
    }

    fn is_ready(&self, kind: &ResourceKind) -> bool {
        self.objects(kind).map(|k| k.synced).unwrap_or(false)
    }

    fn sync_error(&self, kind: &ResourceKind) -> Option<RepoError> {
        let state = self.objects(kind)?;
        state.error.as_ref().map(|reason| RepoError::SyncFailed { kind: kind.to_string(), reason: reason.clone() })
    }
}
