//! Per-kind object tables and the immutable snapshots readers see.

use std::sync::Arc;

use kubedeck_core::project::{builtin_projector_for, crd_descriptor, meta_from, CrdProjector, GenericProjector, Projector};
use kubedeck_core::{CrdDescriptor, Delta, DeltaKind, ResourceKind, StoredObject, Uid};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// Frozen state of one kind.
#[derive(Debug, Clone)]
pub struct KindState {
    pub kind: ResourceKind,
    /// Ordered by namespace, then name.
    pub objects: Vec<StoredObject>,
    pub synced: bool,
    pub error: Option<String>,
}

/// Immutable snapshot of every kind the store has seen.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub epoch: u64,
    pub kinds: FxHashMap<String, Arc<KindState>>,
}

impl World {
    pub fn kind(&self, kind: &ResourceKind) -> Option<&Arc<KindState>> { self.kinds.get(&kind.gvk_key()) }

    /// Find an object by kind name (any group/version), name and optional namespace.
    pub fn find(&self, kind: &str, name: &str, namespace: Option<&str>) -> Option<&StoredObject> {
        self.kinds
            .values()
            .filter(|k| k.kind.kind == kind)
            .flat_map(|k| k.objects.iter())
            .find(|o| o.name == name && in_namespace(o, namespace))
    }
}

pub(crate) fn in_namespace(o: &StoredObject, namespace: Option<&str>) -> bool {
    match namespace {
        Some(ns) => o.namespace.as_deref() == Some(ns),
        None => true,
    }
}

struct KindTable {
    kind: ResourceKind,
    objects: FxHashMap<Uid, StoredObject>,
    synced: bool,
    error: Option<String>,
}

impl KindTable {
    fn new(kind: ResourceKind) -> Self {
        Self { kind, objects: FxHashMap::default(), synced: false, error: None }
    }

    fn freeze(&self) -> Arc<KindState> {
        let mut objects: Vec<StoredObject> = self.objects.values().cloned().collect();
        objects.sort_by(|a, b| (a.namespace.as_deref(), a.name.as_str()).cmp(&(b.namespace.as_deref(), b.name.as_str())));
        Arc::new(KindState { kind: self.kind.clone(), objects, synced: self.synced, error: self.error.clone() })
    }
}

/// Mutable side of the store, owned by the ingest loop.
pub struct WorldBuilder {
    epoch: u64,
    tables: FxHashMap<String, KindTable>,
    crds: FxHashMap<String, Arc<dyn Projector>>,
    dirty: FxHashSet<String>,
    frozen: FxHashMap<String, Arc<KindState>>,
}

impl Default for WorldBuilder {
    fn default() -> Self { Self::new() }
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            tables: FxHashMap::default(),
            crds: FxHashMap::default(),
            dirty: FxHashSet::default(),
            frozen: FxHashMap::default(),
        }
    }

    pub fn epoch(&self) -> u64 { self.epoch }

    /// Project custom resources of `crd`'s kind through its printer columns.
    pub fn register_crd(&mut self, crd: CrdDescriptor) {
        let key = crd.resource_kind().gvk_key();
        debug!(gvk = %key, columns = crd.printer_columns.len(), "store: crd registered");
        self.crds.insert(key, Arc::new(CrdProjector::new(crd)));
    }

    fn projector_for(&self, kind: &ResourceKind) -> Arc<dyn Projector> {
        if let Some(p) = self.crds.get(&kind.gvk_key()) {
            return Arc::clone(p);
        }
        builtin_projector_for(&kind.kind).unwrap_or_else(|| Arc::new(GenericProjector::new(&kind.kind)))
    }

    fn table(&mut self, kind: &ResourceKind) -> &mut KindTable {
        let key = kind.gvk_key();
        self.dirty.insert(key.clone());
        self.tables.entry(key).or_insert_with(|| KindTable::new(kind.clone()))
    }

    /// Apply a batch of deltas.
    pub fn apply(&mut self, batch: Vec<(ResourceKind, Delta)>) {
        for (kind, d) in batch {
            match d.kind {
                DeltaKind::Applied => {
                    let Some(meta) = meta_from(&d.raw) else {
                        warn!(gvk = %kind, "store: object without metadata.name skipped");
                        continue;
                    };
                    if kind.kind == "CustomResourceDefinition" {
                        if let Some(crd) = crd_descriptor(&d.raw) {
                            self.register_crd(crd);
                        }
                    }
                    let obj = self.projector_for(&kind).project(meta, &d.raw);
                    self.table(&kind).objects.insert(d.uid, obj);
                }
                DeltaKind::Deleted => {
                    self.table(&kind).objects.remove(&d.uid);
                }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
    }

    /// Mark the initial listing of `kind` complete.
    pub fn mark_synced(&mut self, kind: &ResourceKind) {
        let t = self.table(kind);
        t.synced = true;
        t.error = None;
        self.epoch = self.epoch.saturating_add(1);
    }

    /// Record a terminal sync failure for `kind`.
    pub fn mark_failed(&mut self, kind: &ResourceKind, reason: &str) {
        self.table(kind).error = Some(reason.to_string());
        self.epoch = self.epoch.saturating_add(1);
    }

    /// Snapshot the current state; only kinds touched since the last call are rebuilt.
    pub fn freeze(&mut self) -> Arc<World> {
        for key in self.dirty.drain() {
            if let Some(t) = self.tables.get(&key) {
                self.frozen.insert(key, t.freeze());
            }
        }
        Arc::new(World { epoch: self.epoch, kinds: self.frozen.clone() })
    }
}
