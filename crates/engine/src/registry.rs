//! Built-in screens and the navigation graph between them.

use std::collections::BTreeMap;
use std::sync::Arc;

use kubedeck_api::{RepoResult, Repository};
use kubedeck_core::columns::{builtin_columns_for, crd_columns, ColumnSpec};
use kubedeck_core::config::EngineConfig;
use kubedeck_core::{CrdDescriptor, FilterContext, Item, ObjectMeta, ResourceItem, ResourceKind};
use smallvec::smallvec;

use crate::nav::{CustomResources, RelatedScreen, ScaleTarget, SwitchContext};
use crate::spec::{Behavior, Operation, RefreshPolicy, ScreenSpec};

pub const PODS: &str = "pods";
pub const DEPLOYMENTS: &str = "deployments";
pub const STATEFULSETS: &str = "statefulsets";
pub const DAEMONSETS: &str = "daemonsets";
pub const REPLICASETS: &str = "replicasets";
pub const JOBS: &str = "jobs";
pub const CRONJOBS: &str = "cronjobs";
pub const SERVICES: &str = "services";
pub const ENDPOINTS: &str = "endpoints";
pub const INGRESSES: &str = "ingresses";
pub const CONFIGMAPS: &str = "configmaps";
pub const SECRETS: &str = "secrets";
pub const PVCS: &str = "pvcs";
pub const NODES: &str = "nodes";
pub const NAMESPACES: &str = "namespaces";
pub const HPAS: &str = "hpas";
pub const CRDS: &str = "crds";
pub const CONTEXTS: &str = "contexts";

/// `(screen id, title, group, version, kind, namespaced)` of every built-in resource screen.
const BUILTIN: &[(&str, &str, &str, &str, &str, bool)] = &[
    (PODS, "Pods", "", "v1", "Pod", true),
    (DEPLOYMENTS, "Deployments", "apps", "v1", "Deployment", true),
    (STATEFULSETS, "StatefulSets", "apps", "v1", "StatefulSet", true),
    (DAEMONSETS, "DaemonSets", "apps", "v1", "DaemonSet", true),
    (REPLICASETS, "ReplicaSets", "apps", "v1", "ReplicaSet", true),
    (JOBS, "Jobs", "batch", "v1", "Job", true),
    (CRONJOBS, "CronJobs", "batch", "v1", "CronJob", true),
    (SERVICES, "Services", "", "v1", "Service", true),
    (ENDPOINTS, "Endpoints", "", "v1", "Endpoints", true),
    (INGRESSES, "Ingresses", "networking.k8s.io", "v1", "Ingress", true),
    (CONFIGMAPS, "ConfigMaps", "", "v1", "ConfigMap", true),
    (SECRETS, "Secrets", "", "v1", "Secret", true),
    (PVCS, "PersistentVolumeClaims", "", "v1", "PersistentVolumeClaim", true),
    (NODES, "Nodes", "", "v1", "Node", false),
    (NAMESPACES, "Namespaces", "", "v1", "Namespace", false),
    (HPAS, "HorizontalPodAutoscalers", "autoscaling", "v2", "HorizontalPodAutoscaler", true),
    (CRDS, "CustomResourceDefinitions", "apiextensions.k8s.io", "v1", "CustomResourceDefinition", false),
];

/// Resource kind served by a built-in screen.
pub fn builtin_kind(screen_id: &str) -> Option<ResourceKind> {
    BUILTIN
        .iter()
        .find(|(id, ..)| *id == screen_id)
        .map(|(_, _, group, version, kind, namespaced)| ResourceKind::new(group, version, kind, *namespaced))
}

/// Built-in screen listing `kind`.
pub fn screen_for_kind(kind: &str) -> Option<&'static str> {
    BUILTIN.iter().find(|(.., k, _)| *k == kind).map(|(id, ..)| *id)
}

fn describe() -> Operation { Operation::new("describe", "Describe", 'd') }
fn edit() -> Operation { Operation::new("edit", "Edit", 'e') }
fn delete() -> Operation { Operation::new("delete", "Delete", 'x') }

fn builtin_spec(id: &str, title: &str, kind: ResourceKind) -> ScreenSpec {
    let columns = builtin_columns_for(&kind.kind, kind.namespaced);
    let base = ScreenSpec::new(id, title, kind, columns).operation(describe()).operation(edit());
    match id {
        PODS => base
            .search(&["Namespace", "Name", "Status", "Node", "IP"])
            .operation(Operation::new("logs", "Logs", 'l'))
            .operation(Operation::new("shell", "Shell", 's'))
            .operation(delete()),
        DEPLOYMENTS => base
            .navigate(RelatedScreen::owner(REPLICASETS, "Deployment"))
            .operation(Operation::new("restart", "Restart", 'r'))
            .operation(Operation::new("scale", "Scale", 'S')),
        STATEFULSETS => base
            .navigate(RelatedScreen::owner(PODS, "StatefulSet"))
            .operation(Operation::new("restart", "Restart", 'r')),
        DAEMONSETS => base.navigate(RelatedScreen::owner(PODS, "DaemonSet")),
        REPLICASETS => base.navigate(RelatedScreen::owner(PODS, "ReplicaSet")),
        JOBS => base.navigate(RelatedScreen::owner(PODS, "Job")).operation(delete()),
        CRONJOBS => base
            .search(&["Namespace", "Name", "Schedule"])
            .navigate(RelatedScreen::owner(JOBS, "CronJob"))
            .operation(Operation::new("trigger", "Trigger", 't')),
        SERVICES => base.search(&["Namespace", "Name", "Type", "ClusterIP"]).navigate(RelatedScreen::selector(PODS, "Service")),
        ENDPOINTS => base.navigate(RelatedScreen::target_ref(PODS, "Endpoints")),
        INGRESSES => base.search(&["Namespace", "Name", "Hosts"]).navigate(RelatedScreen::target_ref(SERVICES, "Ingress")),
        CONFIGMAPS => base.navigate(RelatedScreen::volume(PODS, "ConfigMap")),
        SECRETS => base.navigate(RelatedScreen::volume(PODS, "Secret")),
        PVCS => base.navigate(RelatedScreen::pvc(PODS)),
        NODES => base
            .search(&["Name", "Status", "Roles"])
            .navigate(RelatedScreen::node(PODS))
            .operation(Operation::new("cordon", "Cordon", 'c')),
        NAMESPACES => base.search(&["Name", "Status"]).navigate(RelatedScreen::namespace(PODS)),
        HPAS => base.search(&["Namespace", "Name", "Reference"]).navigate(ScaleTarget::new(screen_for_kind)),
        CRDS => base
            .search(&["Name", "Group", "CrdKind"])
            .navigate(CustomResources)
            .refresh(RefreshPolicy::every(std::time::Duration::from_secs(30))),
        _ => base,
    }
}

/// Dynamic screen for a custom resource kind.
pub fn crd_spec(crd: &CrdDescriptor) -> ScreenSpec {
    let mut search: Vec<String> = vec!["Namespace".into(), "Name".into()];
    search.extend(crd.printer_columns.iter().filter(|pc| pc.type_hint != "date").map(|pc| format!("Fields.{}", pc.name)));
    let mut spec = ScreenSpec::new(&crd.screen_id(), &crd.kind, crd.resource_kind(), crd_columns(crd))
        .operation(describe())
        .operation(edit());
    spec.search_fields = search;
    spec
}

/// Lists the configured kube contexts instead of cluster objects.
pub struct ContextList {
    contexts: Vec<String>,
    current: Option<String>,
}

impl ContextList {
    pub fn new(contexts: Vec<String>, current: Option<String>) -> Self { Self { contexts, current } }
}

#[async_trait::async_trait]
impl Behavior for ContextList {
    fn uses_repository(&self) -> bool { false }

    async fn fetch(&self, _repo: &dyn Repository, _kind: &ResourceKind, _ctx: Option<&FilterContext>) -> RepoResult<Vec<Item>> {
        Ok(self
            .contexts
            .iter()
            .map(|name| {
                let current = if self.current.as_deref() == Some(name.as_str()) { "*" } else { "" };
                Arc::new(ResourceItem {
                    kind: "Context".into(),
                    meta: ObjectMeta { name: name.clone(), ..Default::default() },
                    columns: smallvec![("Current".to_string(), current.to_string())],
                    extra: Default::default(),
                }) as Item
            })
            .collect())
    }
}

/// The contexts screen, marking `config.current_context`.
pub fn contexts_spec(config: &EngineConfig) -> ScreenSpec {
    let columns = vec![
        ColumnSpec::new("Current", "CURRENT").fixed(7),
        ColumnSpec::new("Name", "NAME").min(20).weight(1),
    ];
    ScreenSpec::new(CONTEXTS, "Contexts", ResourceKind::new("", "v1", "Context", false), columns)
        .search(&["Name"])
        .refresh(RefreshPolicy::disabled())
        .navigate(SwitchContext)
        .behavior(ContextList::new(config.contexts.clone(), config.current_context.clone()))
}

/// Screen specs by id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    specs: BTreeMap<String, Arc<ScreenSpec>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Every built-in resource screen plus the contexts screen.
    pub fn builtin(config: &EngineConfig) -> Self {
        let mut reg = Self::new();
        for (id, title, group, version, kind, namespaced) in BUILTIN {
            reg.insert(builtin_spec(id, title, ResourceKind::new(group, version, kind, *namespaced)));
        }
        reg.insert(contexts_spec(config));
        reg
    }

    pub fn insert(&mut self, spec: ScreenSpec) -> Arc<ScreenSpec> {
        let spec = Arc::new(spec);
        self.specs.insert(spec.id.clone(), Arc::clone(&spec));
        spec
    }

    pub fn get(&self, id: &str) -> Option<Arc<ScreenSpec>> { self.specs.get(id).cloned() }
    pub fn contains(&self, id: &str) -> bool { self.specs.contains_key(id) }
    pub fn ids(&self) -> impl Iterator<Item = &str> { self.specs.keys().map(|s| s.as_str()) }

    /// Register (or replace) the dynamic screen for `crd`.
    pub fn insert_crd(&mut self, crd: &CrdDescriptor) -> Arc<ScreenSpec> { self.insert(crd_spec(crd)) }
}
