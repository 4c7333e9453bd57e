//! kubedeck repository capability.
//!
//! The screen engine never talks to a cluster. It consumes a [`Repository`] that
//! caches objects per kind and answers relationship queries ("pods owned by
//! ReplicaSet X"). Implementations live elsewhere (`kubedeck-store` in-process,
//! [`MockRepository`] for tests).

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use kubedeck_core::{Item, ResourceKind};
use serde::{Deserialize, Serialize};

/// Repository errors, surfaced to the operator as status lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RepoError {
    #[error("{0} is still syncing")]
    NotReady(String),
    #[error("sync failed for {kind}: {reason}")]
    SyncFailed { kind: String, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Relationship a scoped fetch follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    Owner,
    Node,
    Selector,
    Namespace,
    Volume,
    Pvc,
    TargetRef,
}

impl Relation {
    /// Map a filter-context field name onto a relation.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "owner" => Some(Relation::Owner),
            "node" => Some(Relation::Node),
            "selector" => Some(Relation::Selector),
            "namespace" => Some(Relation::Namespace),
            "volume" => Some(Relation::Volume),
            "pvc" => Some(Relation::Pvc),
            "target" => Some(Relation::TargetRef),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Owner => "owner",
            Relation::Node => "node",
            Relation::Selector => "selector",
            Relation::Namespace => "namespace",
            Relation::Volume => "volume",
            Relation::Pvc => "pvc",
            Relation::TargetRef => "target",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The object a relationship starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    /// Kind of the source object (`Deployment`, `Service`, ...); may be empty for
    /// relations that do not need it (node, namespace).
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl RelationKey {
    pub fn new(kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self { kind: kind.to_string(), name: name.to_string(), namespace: namespace.map(|s| s.to_string()) }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Capability the screen engine needs from the resource cache.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// All cached objects of `kind`.
    async fn list_resources(&self, kind: &ResourceKind) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` whose owner references include `owner`.
    async fn list_by_owner(&self, kind: &ResourceKind, owner: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` scheduled on node `node.name`.
    async fn list_by_node(&self, kind: &ResourceKind, node: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` matched by the label selector of `source`.
    async fn list_by_selector(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` in namespace `namespace.name`.
    async fn list_by_namespace(&self, kind: &ResourceKind, namespace: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` mounting `source` (a ConfigMap or Secret) as a volume.
    async fn list_by_volume(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` mounting the claim `claim`.
    async fn list_by_pvc(&self, kind: &ResourceKind, claim: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Objects of `kind` referenced by `source` (scale target, backends, endpoint targets).
    async fn list_by_target_ref(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>>;

    /// Engage an on-demand data source for `kind`. Idempotent.
    async fn ensure_loaded(&self, kind: &ResourceKind) -> RepoResult<()>;

    /// Whether `kind` has completed its initial sync.
    fn is_ready(&self, kind: &ResourceKind) -> bool;

    /// Terminal sync error for `kind`, if any.
    fn sync_error(&self, kind: &ResourceKind) -> Option<RepoError>;
}

// ----------------- Mock implementation -----------------

/// Simple in-memory mock for engine tests. Records every call as
/// `method:gvk[:key]` so tests can assert dispatch.
#[derive(Default)]
pub struct MockRepository {
    pub items: Mutex<HashMap<String, Vec<Item>>>,
    pub related: Mutex<HashMap<(Relation, String), Vec<Item>>>,
    pub not_ready: Mutex<HashSet<String>>,
    pub sync_errors: Mutex<HashMap<String, RepoError>>,
    pub fetch_error: Mutex<Option<RepoError>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockRepository {
    pub fn new() -> Self { Self::default() }

    pub fn set_items(&self, kind: &ResourceKind, items: Vec<Item>) {
        lock(&self.items).insert(kind.gvk_key(), items);
    }

    /// Items returned for `relation` queries whose key name is `name`.
    pub fn set_related(&self, relation: Relation, name: &str, items: Vec<Item>) {
        lock(&self.related).insert((relation, name.to_string()), items);
    }

    pub fn set_ready(&self, kind: &ResourceKind, ready: bool) {
        let mut set = lock(&self.not_ready);
        if ready { set.remove(&kind.gvk_key()); } else { set.insert(kind.gvk_key()); }
    }

    pub fn set_sync_error(&self, kind: &ResourceKind, err: Option<RepoError>) {
        let mut map = lock(&self.sync_errors);
        match err {
            Some(e) => { map.insert(kind.gvk_key(), e); }
            None => { map.remove(&kind.gvk_key()); }
        }
    }

    pub fn set_fetch_error(&self, err: Option<RepoError>) {
        *lock(&self.fetch_error) = err;
    }

    pub fn calls(&self) -> Vec<String> { lock(&self.calls).clone() }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }

    fn related_for(&self, relation: Relation, kind: &ResourceKind, key: &RelationKey) -> RepoResult<Vec<Item>> {
        self.record(format!("{}:{}:{}", relation, kind.gvk_key(), key));
        if let Some(e) = lock(&self.fetch_error).clone() {
            return Err(e);
        }
        Ok(lock(&self.related).get(&(relation, key.name.clone())).cloned().unwrap_or_default())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl Repository for MockRepository {
    async fn list_resources(&self, kind: &ResourceKind) -> RepoResult<Vec<Item>> {
        self.record(format!("list:{}", kind.gvk_key()));
        if let Some(e) = lock(&self.fetch_error).clone() {
            return Err(e);
        }
        Ok(lock(&self.items).get(&kind.gvk_key()).cloned().unwrap_or_default())
    }

    async fn list_by_owner(&self, kind: &ResourceKind, owner: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Owner, kind, owner)
    }

    async fn list_by_node(&self, kind: &ResourceKind, node: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Node, kind, node)
    }

    async fn list_by_selector(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Selector, kind, source)
    }

    async fn list_by_namespace(&self, kind: &ResourceKind, namespace: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Namespace, kind, namespace)
    }

    async fn list_by_volume(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Volume, kind, source)
    }

    async fn list_by_pvc(&self, kind: &ResourceKind, claim: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::Pvc, kind, claim)
    }

    async fn list_by_target_ref(&self, kind: &ResourceKind, source: &RelationKey) -> RepoResult<Vec<Item>> {
        self.related_for(Relation::TargetRef, kind, source)
    }

    async fn ensure_loaded(&self, kind: &ResourceKind) -> RepoResult<()> {
        self.record(format!("ensure:{}", kind.gvk_key()));
        Ok(())
    }

    fn is_ready(&self, kind: &ResourceKind) -> bool {
        !lock(&self.not_ready).contains(&kind.gvk_key())
    }

    fn sync_error(&self, kind: &ResourceKind) -> Option<RepoError> {
        lock(&self.sync_errors).get(&kind.gvk_key()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_field_names_round_trip() {
        for r in [
            Relation::Owner,
            Relation::Node,
            Relation::Selector,
            Relation::Namespace,
            Relation::Volume,
            Relation::Pvc,
            Relation::TargetRef,
        ] {
            assert_eq!(Relation::from_field(r.as_str()), Some(r));
        }
        assert_eq!(Relation::from_field("labels"), None);
    }

    #[tokio::test]
    async fn mock_records_dispatch() {
        let repo = MockRepository::new();
        let pods = ResourceKind::new("", "v1", "Pod", true);
        repo.set_fetch_error(Some(RepoError::Internal("boom".into())));
        let key = RelationKey::new("Deployment", "web", Some("shop"));
        assert!(repo.list_by_owner(&pods, &key).await.is_err());
        repo.set_fetch_error(None);
        assert!(repo.list_resources(&pods).await.expect("list").is_empty());
        assert_eq!(repo.calls(), vec!["owner:v1/Pod:Deployment/shop/web".to_string(), "list:v1/Pod".to_string()]);
    }
}
