//! Navigation handlers: Enter on a row opens a related, pre-filtered screen.
//!
//! Handlers read the selected row through its attribute map only, so the same
//! handler works for any resource shape exposing `namespace` and `name`.

use kubedeck_core::field::{text, to_attribute_map};
use kubedeck_core::{AttrValue, CrdDescriptor, FilterContext, ObjRef, PrinterColumn, Resource};
use tracing::debug;

use crate::{ready, Msg, Task};

/// Maps the selected row to a screen-switch (or other routing) task.
/// `None` leaves Enter a no-op.
pub trait NavigationHandler: Send + Sync {
    fn navigate(&self, selected: &dyn Resource) -> Option<Task>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Needs `namespace` and `name`.
    Namespaced,
    /// `name` alone.
    Cluster,
}

/// Switch to `target` with a filter on `field` = selected name.
#[derive(Debug, Clone)]
pub struct RelatedScreen {
    target: String,
    field: String,
    kind: Option<String>,
    scope: Scope,
}

impl RelatedScreen {
    fn new(target: &str, field: &str, kind: Option<&str>, scope: Scope) -> Self {
        Self { target: target.to_string(), field: field.to_string(), kind: kind.map(|k| k.to_string()), scope }
    }

    /// Objects in `target` owned by the selected `kind`.
    pub fn owner(target: &str, kind: &str) -> Self { Self::new(target, "owner", Some(kind), Scope::Namespaced) }
    /// Pods matched by the selected object's label selector.
    pub fn selector(target: &str, kind: &str) -> Self { Self::new(target, "selector", Some(kind), Scope::Namespaced) }
    pub fn node(target: &str) -> Self { Self::new(target, "node", None, Scope::Cluster) }
    pub fn namespace(target: &str) -> Self { Self::new(target, "namespace", None, Scope::Cluster) }
    /// Pods mounting the selected ConfigMap or Secret.
    pub fn volume(target: &str, kind: &str) -> Self { Self::new(target, "volume", Some(kind), Scope::Namespaced) }
    pub fn pvc(target: &str) -> Self { Self::new(target, "pvc", Some("PersistentVolumeClaim"), Scope::Namespaced) }
    /// Objects in `target` referenced by the selected object.
    pub fn target_ref(target: &str, kind: &str) -> Self { Self::new(target, "target", Some(kind), Scope::Namespaced) }

    pub fn target(&self) -> &str { &self.target }
}

impl NavigationHandler for RelatedScreen {
    fn navigate(&self, selected: &dyn Resource) -> Option<Task> {
        let attrs = to_attribute_map(selected);
        let name = text(&attrs, "name");
        let namespace = text(&attrs, "namespace");
        if name.is_empty() || (self.scope == Scope::Namespaced && namespace.is_empty()) {
            return None;
        }
        let mut ctx = FilterContext::new(&self.field, &name);
        if self.scope == Scope::Namespaced {
            ctx = ctx.with("namespace", &namespace);
        }
        if let Some(kind) = &self.kind {
            ctx = ctx.with("kind", kind);
        }
        debug!(target_screen = %self.target, filter = %ctx, "nav: related screen");
        Some(ready(Msg::ScreenSwitch { screen_id: self.target.clone(), filter: Some(ctx) }))
    }
}

/// HPA rows: follow the `Kind/name` scale-target reference to the screen of
/// that kind.
pub struct ScaleTarget {
    route: fn(&str) -> Option<&'static str>,
}

impl ScaleTarget {
    pub fn new(route: fn(&str) -> Option<&'static str>) -> Self { Self { route } }
}

impl NavigationHandler for ScaleTarget {
    fn navigate(&self, selected: &dyn Resource) -> Option<Task> {
        let attrs = to_attribute_map(selected);
        let name = text(&attrs, "name");
        let namespace = text(&attrs, "namespace");
        let target = ObjRef::parse(&text(&attrs, "reference"))?;
        if name.is_empty() || namespace.is_empty() {
            return None;
        }
        let screen_id = (self.route)(&target.kind)?;
        let ctx = FilterContext::new("target", &name)
            .with("namespace", &namespace)
            .with("kind", "HorizontalPodAutoscaler");
        debug!(target_screen = screen_id, reference = %target, "nav: scale target");
        Some(ready(Msg::ScreenSwitch { screen_id: screen_id.to_string(), filter: Some(ctx) }))
    }
}

/// CRD rows open a screen for the custom resource they define.
pub struct CustomResources;

impl NavigationHandler for CustomResources {
    fn navigate(&self, selected: &dyn Resource) -> Option<Task> {
        let attrs = to_attribute_map(selected);
        let group = text(&attrs, "group");
        let kind = text(&attrs, "crdkind");
        let version = text(&attrs, "version");
        if group.is_empty() || kind.is_empty() || version.is_empty() {
            return None;
        }
        let printer_columns = match attrs.get("printercolumns") {
            Some(AttrValue::List(encoded)) => encoded.iter().filter_map(|s| PrinterColumn::decode(s)).collect(),
            _ => Vec::new(),
        };
        let mut plural = text(&attrs, "plural");
        if plural.is_empty() {
            plural = format!("{}s", kind.to_lowercase());
        }
        let crd = CrdDescriptor {
            group,
            version,
            kind,
            plural,
            namespaced: text(&attrs, "scope") != "Cluster",
            printer_columns,
        };
        debug!(screen = %crd.screen_id(), "nav: dynamic screen");
        Some(ready(Msg::DynamicScreenCreate(crd)))
    }
}

/// Context rows switch the active kube context.
pub struct SwitchContext;

impl NavigationHandler for SwitchContext {
    fn navigate(&self, selected: &dyn Resource) -> Option<Task> {
        let name = text(&to_attribute_map(selected), "name");
        if name.is_empty() {
            return None;
        }
        Some(ready(Msg::ContextSwitch(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubedeck_core::{Attributes, ObjectMeta, ResourceItem};
    use smallvec::SmallVec;

    fn row(kind: &str, ns: Option<&str>, name: &str, cols: &[(&str, &str)]) -> ResourceItem {
        ResourceItem {
            kind: kind.into(),
            meta: ObjectMeta { namespace: ns.map(|s| s.to_string()), name: name.into(), ..Default::default() },
            columns: cols.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<SmallVec<_>>(),
            extra: Attributes::new(),
        }
    }

    fn run(task: Task) -> Msg { futures::executor::block_on(task) }

    fn switch(task: Option<Task>) -> (String, FilterContext) {
        match task.map(run) {
            Some(Msg::ScreenSwitch { screen_id, filter: Some(f) }) => (screen_id, f),
            other => panic!("expected screen switch, got {:?}", other),
        }
    }

    #[test]
    fn owner_handler_carries_namespace_and_kind() {
        let nav = RelatedScreen::owner("replicasets", "Deployment");
        let (screen, ctx) = switch(nav.navigate(&row("Deployment", Some("shop"), "web", &[])));
        assert_eq!(screen, "replicasets");
        assert_eq!(ctx.field, "owner");
        assert_eq!(ctx.value, "web");
        assert_eq!(ctx.namespace(), Some("shop"));
        assert_eq!(ctx.kind(), "Deployment");
    }

    #[test]
    fn blank_fields_are_a_no_op() {
        let nav = RelatedScreen::selector("pods", "Service");
        assert!(nav.navigate(&row("Service", None, "web", &[])).is_none());
        assert!(nav.navigate(&row("Service", Some("shop"), "", &[])).is_none());
    }

    #[test]
    fn cluster_scoped_handlers_need_name_only() {
        let (screen, ctx) = switch(RelatedScreen::node("pods").navigate(&row("Node", None, "node-a", &[])));
        assert_eq!(screen, "pods");
        assert_eq!(ctx.field, "node");
        assert!(ctx.namespace().is_none());
        assert!(ctx.metadata.is_empty());
    }

    #[test]
    fn scale_target_routes_by_reference_kind() {
        fn route(kind: &str) -> Option<&'static str> {
            match kind {
                "Deployment" => Some("deployments"),
                _ => None,
            }
        }
        let nav = ScaleTarget::new(route);
        let hpa = row("HorizontalPodAutoscaler", Some("shop"), "web", &[("Reference", "Deployment/web")]);
        let (screen, ctx) = switch(nav.navigate(&hpa));
        assert_eq!(screen, "deployments");
        assert_eq!(ctx.field, "target");
        assert_eq!(ctx.kind(), "HorizontalPodAutoscaler");

        let odd = row("HorizontalPodAutoscaler", Some("shop"), "web", &[("Reference", "Rollout/web")]);
        assert!(nav.navigate(&odd).is_none());
        let broken = row("HorizontalPodAutoscaler", Some("shop"), "web", &[("Reference", "web")]);
        assert!(nav.navigate(&broken).is_none());
    }

    #[test]
    fn crd_rows_build_descriptors() {
        let mut crd = row(
            "CustomResourceDefinition",
            None,
            "certificates.cert-manager.io",
            &[("Group", "cert-manager.io"), ("CrdKind", "Certificate"), ("Version", "v1"), ("Scope", "Namespaced"), ("Plural", "certificates")],
        );
        let pc = PrinterColumn { name: "Ready".into(), json_path: ".status.ready".into(), type_hint: "string".into() };
        crd.extra.insert("PrinterColumns".into(), AttrValue::List(vec![pc.encode()]));
        match CustomResources.navigate(&crd).map(run) {
            Some(Msg::DynamicScreenCreate(d)) => {
                assert_eq!(d.screen_id(), "certificates.cert-manager.io");
                assert!(d.namespaced);
                assert_eq!(d.printer_columns, vec![pc]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(CustomResources.navigate(&row("CustomResourceDefinition", None, "x", &[])).is_none());
    }

    #[test]
    fn context_rows_switch_context() {
        match SwitchContext.navigate(&row("Context", None, "prod-eu", &[])).map(run) {
            Some(Msg::ContextSwitch(name)) => assert_eq!(name, "prod-eu"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
