//! Fixture-backed data source: serves objects read from a JSON file as if they
//! had been listed from a cluster.

use std::path::Path;

use anyhow::{Context, Result};
use kubedeck_core::project::meta_from;
use kubedeck_core::{Delta, DeltaKind, ResourceKind};
use kubedeck_store::{Ingest, Source};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct FixtureSource {
    objects: Vec<Value>,
}

impl FixtureSource {
    pub fn empty() -> Self { Self { objects: Vec::new() } }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))?;
        let src = Self::parse(&raw).with_context(|| format!("parsing fixture {}", path.display()))?;
        info!(path = %path.display(), objects = src.objects.len(), "fixture: loaded");
        Ok(src)
    }

    /// Accepts a `List` object (`{"items": [...]}`) or a bare array.
    pub fn parse(raw: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(raw)?;
        let objects = match doc {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => anyhow::bail!("expected a List with an items array"),
            },
            _ => anyhow::bail!("expected a List or an array of objects"),
        };
        Ok(Self { objects })
    }

    pub fn len(&self) -> usize { self.objects.len() }

    fn matches(obj: &Value, kind: &ResourceKind) -> bool {
        let api_version = obj.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("");
        let obj_kind = obj.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        obj_kind == kind.kind && group == kind.group && version == kind.version
    }
}

#[async_trait::async_trait]
impl Source for FixtureSource {
    async fn engage(&self, kind: &ResourceKind, sink: mpsc::Sender<Ingest>) -> Result<()> {
        let mut sent = 0usize;
        for obj in self.objects.iter().filter(|o| Self::matches(o, kind)) {
            let Some(meta) = meta_from(obj) else {
                debug!(gvk = %kind, "fixture: object without metadata.name skipped");
                continue;
            };
            let delta = Delta { uid: meta.uid, kind: DeltaKind::Applied, raw: obj.clone() };
            sink.send(Ingest::Delta(kind.clone(), delta)).await.context("ingest channel closed")?;
            sent += 1;
        }
        sink.send(Ingest::Synced(kind.clone())).await.context("ingest channel closed")?;
        info!(gvk = %kind, objects = sent, "fixture: kind served");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubedeck_api::Repository;
    use std::sync::Arc;

    const LIST: &str = r#"{
        "apiVersion": "v1",
        "kind": "List",
        "items": [
            {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web-1", "namespace": "shop"}},
            {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web-2", "namespace": "shop"}},
            {"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web", "namespace": "shop"}},
            {"apiVersion": "v1", "kind": "Pod", "metadata": {"namespace": "shop"}}
        ]
    }"#;

    fn pods() -> ResourceKind { ResourceKind::new("", "v1", "Pod", true) }

    #[tokio::test]
    async fn engage_sends_matching_objects_then_synced() {
        let src = FixtureSource::parse(LIST).expect("parse");
        assert_eq!(src.len(), 4);
        let (tx, mut rx) = mpsc::channel(16);
        src.engage(&pods(), tx).await.expect("engage");
        let mut deltas = 0;
        let mut synced = false;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Ingest::Delta(kind, _) => {
                    assert_eq!(kind, pods());
                    assert!(!synced, "sync marker comes last");
                    deltas += 1;
                }
                Ingest::Synced(kind) => {
                    assert_eq!(kind, pods());
                    synced = true;
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(deltas, 2);
        assert!(synced);
    }

    #[test]
    fn rejects_non_lists() {
        assert!(FixtureSource::parse(r#"{"kind": "Pod"}"#).is_err());
        assert!(FixtureSource::parse("42").is_err());
        assert_eq!(FixtureSource::parse("[]").expect("array").len(), 0);
    }

    #[tokio::test]
    async fn store_serves_fixture_on_demand() {
        let src: Arc<dyn Source> = Arc::new(FixtureSource::parse(LIST).expect("parse"));
        let store = kubedeck_store::spawn_ingest(64, Some(src));
        let deployments = ResourceKind::new("apps", "v1", "Deployment", true);
        assert!(!store.is_ready(&deployments));
        store.ensure_loaded(&deployments).await.expect("engage");
        assert!(store.is_ready(&deployments), "engage returns once the listing is applied");
        let items = store.list_resources(&deployments).await.expect("list");
        assert_eq!(items.len(), 1);
        assert!(store.list_resources(&pods()).await.expect("list").is_empty(), "pods not engaged yet");
    }
}
