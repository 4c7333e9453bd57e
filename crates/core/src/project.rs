//! Projection of raw JSON objects into typed items plus relationship links.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::{
    AttrValue, Attributes, CrdDescriptor, CustomObject, Links, ObjRef, ObjectMeta, PrinterColumn, ResourceItem,
    StoredObject, Uid,
};

/// Projector takes a raw JSON object and yields the stored, display-ready form.
pub trait Projector: Send + Sync {
    fn project(&self, meta: ObjectMeta, raw: &Value) -> StoredObject;
}

/// Parse object metadata; `None` when the object has no name.
pub fn meta_from(raw: &Value) -> Option<ObjectMeta> {
    let meta = raw.get("metadata")?;
    let name = meta.get("name").and_then(|v| v.as_str())?.to_string();
    let namespace = meta.get("namespace").and_then(|v| v.as_str()).map(|s| s.to_string());
    let created = meta
        .get("creationTimestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let labels = string_map(meta.get("labels"));
    let uid = meta
        .get("uid")
        .and_then(|v| v.as_str())
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .map(|u| *u.as_bytes())
        .unwrap_or_else(|| synthetic_uid(namespace.as_deref(), &name));
    Some(ObjectMeta { uid, namespace, name, created, labels })
}

/// Stable uid for objects that carry none (fixtures): FNV-1a over `namespace/name`.
pub fn synthetic_uid(namespace: Option<&str>, name: &str) -> Uid {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in namespace.unwrap_or("").bytes().chain(std::iter::once(b'/')).chain(name.bytes()) {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    let mut uid = [0u8; 16];
    uid[..8].copy_from_slice(&h.to_be_bytes());
    uid[8..].copy_from_slice(&h.rotate_left(29).to_le_bytes());
    uid
}

fn string_map(v: Option<&Value>) -> BTreeMap<String, String> {
    v.and_then(|v| v.as_object())
        .map(|o| o.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

fn str_at<'a>(raw: &'a Value, ptr: &str) -> Option<&'a str> {
    raw.pointer(ptr).and_then(|v| v.as_str())
}

fn u64_at(raw: &Value, ptr: &str) -> u64 {
    raw.pointer(ptr).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn owners_of(raw: &Value) -> SmallVec<[ObjRef; 2]> {
    let mut out = SmallVec::new();
    if let Some(refs) = raw.pointer("/metadata/ownerReferences").and_then(|v| v.as_array()) {
        for r in refs {
            if let (Some(kind), Some(name)) = (r.get("kind").and_then(|v| v.as_str()), r.get("name").and_then(|v| v.as_str())) {
                out.push(ObjRef::new(kind, name));
            }
        }
    }
    out
}

fn lb_addresses(raw: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(arr) = raw.pointer("/status/loadBalancer/ingress").and_then(|v| v.as_array()) {
        for it in arr {
            if let Some(ip) = it.get("ip").and_then(|v| v.as_str()) { out.push(ip.to_string()); }
            else if let Some(h) = it.get("hostname").and_then(|v| v.as_str()) { out.push(h.to_string()); }
        }
    }
    out
}

/// Return a projector for a supported built-in kind.
pub fn builtin_projector_for(kind: &str) -> Option<Arc<dyn Projector>> {
    match kind {
        "Pod" | "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" | "CronJob" | "Service"
        | "Endpoints" | "Ingress" | "ConfigMap" | "Secret" | "PersistentVolumeClaim" | "Node" | "Namespace"
        | "HorizontalPodAutoscaler" | "CustomResourceDefinition" => {
            Some(Arc::new(BuiltinProjector { kind: kind.to_string() }))
        }
        _ => None,
    }
}

type Cols = SmallVec<[(String, String); 8]>;

fn push(out: &mut Cols, key: &str, value: impl Into<String>) {
    out.push((key.to_string(), value.into()));
}

struct BuiltinProjector {
    kind: String,
}

impl BuiltinProjector {
    fn project_pod(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        let mut ready = 0u32;
        let mut total = 0u32;
        let mut restarts = 0u64;
        if let Some(cs) = raw.pointer("/status/containerStatuses").and_then(|v| v.as_array()) {
            total = cs.len() as u32;
            for c in cs {
                if c.get("ready").and_then(|v| v.as_bool()).unwrap_or(false) { ready += 1; }
                restarts += c.get("restartCount").and_then(|v| v.as_u64()).unwrap_or(0);
            }
        }
        push(cols, "Ready", format!("{}/{}", ready, total));
        push(cols, "Restarts", restarts.to_string());
        let phase = str_at(raw, "/status/phase").unwrap_or("");
        let reason = str_at(raw, "/status/reason").unwrap_or("");
        push(cols, "Status", if !reason.is_empty() { reason } else { phase });
        push(cols, "IP", str_at(raw, "/status/podIP").unwrap_or(""));
        let node = str_at(raw, "/spec/nodeName").unwrap_or("");
        push(cols, "Node", node);
        if !node.is_empty() {
            links.node = Some(node.to_string());
        }
        if let Some(vols) = raw.pointer("/spec/volumes").and_then(|v| v.as_array()) {
            for v in vols {
                if let Some(n) = v.pointer("/configMap/name").and_then(|v| v.as_str()) {
                    links.volumes.push(ObjRef::new("ConfigMap", n));
                } else if let Some(n) = v.pointer("/secret/secretName").and_then(|v| v.as_str()) {
                    links.volumes.push(ObjRef::new("Secret", n));
                } else if let Some(n) = v.pointer("/persistentVolumeClaim/claimName").and_then(|v| v.as_str()) {
                    links.volumes.push(ObjRef::new("PersistentVolumeClaim", n));
                }
            }
        }
    }

    fn project_deployment(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        let replicas = u64_at(raw, "/status/replicas");
        push(cols, "Ready", format!("{}/{}", u64_at(raw, "/status/readyReplicas"), replicas));
        push(cols, "UpToDate", u64_at(raw, "/status/updatedReplicas").to_string());
        push(cols, "Available", u64_at(raw, "/status/availableReplicas").to_string());
        links.selector = Some(string_map(raw.pointer("/spec/selector/matchLabels")));
    }

    fn project_statefulset(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        push(cols, "Ready", format!("{}/{}", u64_at(raw, "/status/readyReplicas"), u64_at(raw, "/status/replicas")));
        links.selector = Some(string_map(raw.pointer("/spec/selector/matchLabels")));
    }

    fn project_daemonset(&self, raw: &Value, cols: &mut Cols) {
        push(cols, "Desired", u64_at(raw, "/status/desiredNumberScheduled").to_string());
        push(cols, "Current", u64_at(raw, "/status/currentNumberScheduled").to_string());
        push(cols, "Ready", u64_at(raw, "/status/numberReady").to_string());
        push(cols, "UpToDate", u64_at(raw, "/status/updatedNumberScheduled").to_string());
        push(cols, "Available", u64_at(raw, "/status/numberAvailable").to_string());
    }

    fn project_replicaset(&self, raw: &Value, cols: &mut Cols) {
        push(cols, "Desired", u64_at(raw, "/spec/replicas").to_string());
        push(cols, "Current", u64_at(raw, "/status/replicas").to_string());
        push(cols, "Ready", u64_at(raw, "/status/readyReplicas").to_string());
    }

    fn project_job(&self, raw: &Value, cols: &mut Cols) {
        let desired = raw.pointer("/spec/completions").and_then(|v| v.as_u64()).unwrap_or(1);
        push(cols, "Completions", format!("{}/{}", u64_at(raw, "/status/succeeded"), desired));
        let mut status = String::new();
        if let Some(conds) = raw.pointer("/status/conditions").and_then(|v| v.as_array()) {
            for c in conds {
                let t = c.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let s = c.get("status").and_then(|v| v.as_str()).unwrap_or("");
                if t == "Complete" && s == "True" { status = "Complete".into(); break; }
                if t == "Failed" && s == "True" { status = "Failed".into(); }
            }
        }
        if status.is_empty() {
            let active = u64_at(raw, "/status/active");
            status = if active > 0 { format!("Running ({})", active) } else { "-".into() };
        }
        push(cols, "Status", status);
    }

    fn project_cronjob(&self, raw: &Value, cols: &mut Cols) {
        push(cols, "Schedule", str_at(raw, "/spec/schedule").unwrap_or(""));
        let suspend = raw.pointer("/spec/suspend").and_then(|v| v.as_bool()).unwrap_or(false);
        push(cols, "Suspend", if suspend { "True" } else { "False" });
        let active = raw.pointer("/status/active").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
        push(cols, "Active", active.to_string());
        push(cols, "LastSchedule", str_at(raw, "/status/lastScheduleTime").unwrap_or(""));
    }

    fn project_service(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        push(cols, "Type", str_at(raw, "/spec/type").unwrap_or("ClusterIP"));
        push(cols, "ClusterIP", str_at(raw, "/spec/clusterIP").unwrap_or(""));
        let mut eps: Vec<String> = Vec::new();
        if let Some(arr) = raw.pointer("/spec/externalIPs").and_then(|v| v.as_array()) {
            eps.extend(arr.iter().filter_map(|it| it.as_str().map(|s| s.to_string())));
        }
        if eps.is_empty() {
            eps = lb_addresses(raw);
        }
        push(cols, "ExternalIP", eps.join(","));
        let mut ports: Vec<String> = Vec::new();
        if let Some(arr) = raw.pointer("/spec/ports").and_then(|v| v.as_array()) {
            for p in arr.iter().take(4) {
                let port = p.get("port").and_then(|v| v.as_u64()).unwrap_or(0);
                let proto = p.get("protocol").and_then(|v| v.as_str()).unwrap_or("TCP");
                ports.push(format!("{}/{}", port, proto));
            }
        }
        push(cols, "Ports", ports.join(","));
        links.selector = Some(string_map(raw.pointer("/spec/selector")));
    }

    fn project_endpoints(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        let mut eps: Vec<String> = Vec::new();
        if let Some(subsets) = raw.get("subsets").and_then(|v| v.as_array()) {
            for s in subsets {
                let ports: Vec<u64> = s
                    .get("ports")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|p| p.get("port").and_then(|v| v.as_u64())).collect())
                    .unwrap_or_default();
                for addr in s.get("addresses").and_then(|v| v.as_array()).into_iter().flatten() {
                    let ip = addr.get("ip").and_then(|v| v.as_str()).unwrap_or("");
                    match ports.first() {
                        Some(p) => eps.push(format!("{}:{}", ip, p)),
                        None => eps.push(ip.to_string()),
                    }
                    let target = addr.get("targetRef");
                    if let (Some(kind), Some(name)) = (
                        target.and_then(|t| t.get("kind")).and_then(|v| v.as_str()),
                        target.and_then(|t| t.get("name")).and_then(|v| v.as_str()),
                    ) {
                        links.refs.push(ObjRef::new(kind, name));
                    }
                }
            }
        }
        push(cols, "Endpoints", eps.join(","));
    }

    fn project_ingress(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        push(cols, "Class", str_at(raw, "/spec/ingressClassName").unwrap_or(""));
        let mut hosts: Vec<String> = Vec::new();
        if let Some(name) = str_at(raw, "/spec/defaultBackend/service/name") {
            links.refs.push(ObjRef::new("Service", name));
        }
        if let Some(rules) = raw.pointer("/spec/rules").and_then(|v| v.as_array()) {
            for r in rules {
                if let Some(h) = r.get("host").and_then(|v| v.as_str()) { hosts.push(h.to_string()); }
                for p in r.pointer("/http/paths").and_then(|v| v.as_array()).into_iter().flatten() {
                    if let Some(name) = p.pointer("/backend/service/name").and_then(|v| v.as_str()) {
                        let r = ObjRef::new("Service", name);
                        if !links.refs.contains(&r) { links.refs.push(r); }
                    }
                }
            }
        }
        push(cols, "Hosts", if hosts.is_empty() { "*".to_string() } else { hosts.join(",") });
        push(cols, "Address", lb_addresses(raw).join(","));
        let tls = raw.pointer("/spec/tls").and_then(|v| v.as_array()).map(|a| !a.is_empty()).unwrap_or(false);
        push(cols, "TLS", if tls { "Y" } else { "N" });
    }

    fn project_data_count(&self, raw: &Value, cols: &mut Cols) {
        let count = ["data", "binaryData", "stringData"]
            .iter()
            .filter_map(|k| raw.get(*k).and_then(|v| v.as_object()).map(|o| o.len()))
            .sum::<usize>();
        push(cols, "Data", count.to_string());
        if let Some(t) = raw.get("type").and_then(|v| v.as_str()) {
            push(cols, "Type", t);
        }
    }

    fn project_pvc(&self, raw: &Value, cols: &mut Cols) {
        push(cols, "Status", str_at(raw, "/status/phase").unwrap_or(""));
        push(cols, "Volume", str_at(raw, "/spec/volumeName").unwrap_or(""));
        push(cols, "Capacity", str_at(raw, "/status/capacity/storage").unwrap_or(""));
        let modes: Vec<String> = raw
            .pointer("/spec/accessModes")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|m| m.as_str().map(short_access_mode)).collect())
            .unwrap_or_default();
        push(cols, "AccessModes", modes.join(","));
        push(cols, "StorageClass", str_at(raw, "/spec/storageClassName").unwrap_or(""));
    }

    fn project_node(&self, raw: &Value, cols: &mut Cols) {
        let mut status = "Unknown".to_string();
        if let Some(conds) = raw.pointer("/status/conditions").and_then(|v| v.as_array()) {
            for c in conds {
                if c.get("type").and_then(|v| v.as_str()) == Some("Ready") {
                    status = if c.get("status").and_then(|v| v.as_str()) == Some("True") { "Ready".into() } else { "NotReady".into() };
                    break;
                }
            }
        }
        if raw.pointer("/spec/unschedulable").and_then(|v| v.as_bool()).unwrap_or(false) {
            status.push_str(",SchedulingDisabled");
        }
        push(cols, "Status", status);
        let mut roles: Vec<String> = Vec::new();
        if let Some(lbls) = raw.pointer("/metadata/labels").and_then(|v| v.as_object()) {
            for k in lbls.keys() {
                if let Some(role) = k.strip_prefix("node-role.kubernetes.io/") {
                    roles.push(if role.is_empty() { "node".into() } else { role.to_string() });
                }
            }
        }
        push(cols, "Roles", if roles.is_empty() { "<none>".to_string() } else { roles.join(",") });
        push(cols, "Version", str_at(raw, "/status/nodeInfo/kubeletVersion").unwrap_or(""));
    }

    fn project_hpa(&self, raw: &Value, cols: &mut Cols, links: &mut Links) {
        let kind = str_at(raw, "/spec/scaleTargetRef/kind").unwrap_or("");
        let name = str_at(raw, "/spec/scaleTargetRef/name").unwrap_or("");
        if !kind.is_empty() && !name.is_empty() {
            links.refs.push(ObjRef::new(kind, name));
            push(cols, "Reference", format!("{}/{}", kind, name));
        } else {
            push(cols, "Reference", "");
        }
        let min = raw.pointer("/spec/minReplicas").and_then(|v| v.as_u64()).unwrap_or(1);
        push(cols, "MinPods", min.to_string());
        push(cols, "MaxPods", u64_at(raw, "/spec/maxReplicas").to_string());
        push(cols, "Replicas", u64_at(raw, "/status/currentReplicas").to_string());
    }

    fn project_crd(&self, raw: &Value, cols: &mut Cols, extra: &mut Attributes) {
        let scope = str_at(raw, "/spec/scope").unwrap_or("Namespaced");
        let crd = crd_descriptor(raw);
        let (group, kind, version, plural, printer): (&str, &str, &str, &str, Vec<String>) = match &crd {
            Some(c) => (
                c.group.as_str(),
                c.kind.as_str(),
                c.version.as_str(),
                c.plural.as_str(),
                c.printer_columns.iter().map(|pc| pc.encode()).collect(),
            ),
            None => ("", "", "", "", Vec::new()),
        };
        push(cols, "Group", group);
        push(cols, "CrdKind", kind);
        push(cols, "Version", version);
        push(cols, "Scope", scope);
        push(cols, "Plural", plural);
        extra.insert("PrinterColumns".into(), AttrValue::List(printer));
    }
}

/// Read a CRD object into a screen descriptor. Picks the storage version,
/// then the first served one.
pub fn crd_descriptor(raw: &Value) -> Option<CrdDescriptor> {
    let group = str_at(raw, "/spec/group")?;
    let kind = str_at(raw, "/spec/names/kind")?;
    let plural = str_at(raw, "/spec/names/plural").unwrap_or("");
    let namespaced = str_at(raw, "/spec/scope").unwrap_or("Namespaced") == "Namespaced";
    let versions = raw.pointer("/spec/versions").and_then(|v| v.as_array())?;
    let chosen = versions
        .iter()
        .find(|v| v.get("storage").and_then(|b| b.as_bool()).unwrap_or(false))
        .or_else(|| versions.iter().find(|v| v.get("served").and_then(|b| b.as_bool()).unwrap_or(false)))?;
    let version = chosen.get("name").and_then(|v| v.as_str())?;
    let printer_columns = chosen
        .get("additionalPrinterColumns")
        .and_then(|v| v.as_array())
        .map(|cols| {
            cols.iter()
                .filter_map(|c| {
                    Some(PrinterColumn {
                        name: c.get("name")?.as_str()?.to_string(),
                        json_path: c.get("jsonPath")?.as_str()?.to_string(),
                        type_hint: c.get("type").and_then(|v| v.as_str()).unwrap_or("string").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(CrdDescriptor {
        group: group.to_string(),
        version: version.to_string(),
        kind: kind.to_string(),
        plural: plural.to_string(),
        namespaced,
        printer_columns,
    })
}

fn short_access_mode(m: &str) -> String {
    match m {
        "ReadWriteOnce" => "RWO".into(),
        "ReadOnlyMany" => "ROX".into(),
        "ReadWriteMany" => "RWX".into(),
        "ReadWriteOncePod" => "RWOP".into(),
        other => other.to_string(),
    }
}

impl Projector for BuiltinProjector {
    fn project(&self, meta: ObjectMeta, raw: &Value) -> StoredObject {
        let mut cols = Cols::new();
        let mut links = Links { owners: owners_of(raw), ..Default::default() };
        let mut extra = Attributes::new();
        match self.kind.as_str() {
            "Pod" => self.project_pod(raw, &mut cols, &mut links),
            "Deployment" => self.project_deployment(raw, &mut cols, &mut links),
            "StatefulSet" => self.project_statefulset(raw, &mut cols, &mut links),
            "DaemonSet" => self.project_daemonset(raw, &mut cols),
            "ReplicaSet" => self.project_replicaset(raw, &mut cols),
            "Job" => self.project_job(raw, &mut cols),
            "CronJob" => self.project_cronjob(raw, &mut cols),
            "Service" => self.project_service(raw, &mut cols, &mut links),
            "Endpoints" => self.project_endpoints(raw, &mut cols, &mut links),
            "Ingress" => self.project_ingress(raw, &mut cols, &mut links),
            "ConfigMap" | "Secret" => self.project_data_count(raw, &mut cols),
            "PersistentVolumeClaim" => self.project_pvc(raw, &mut cols),
            "Node" => self.project_node(raw, &mut cols),
            "Namespace" => push(&mut cols, "Status", str_at(raw, "/status/phase").unwrap_or("Active")),
            "HorizontalPodAutoscaler" => self.project_hpa(raw, &mut cols, &mut links),
            "CustomResourceDefinition" => self.project_crd(raw, &mut cols, &mut extra),
            _ => {}
        }
        let item = ResourceItem { kind: self.kind.clone(), meta: meta.clone(), columns: cols, extra };
        stored(meta, links, Arc::new(item))
    }
}

fn stored(meta: ObjectMeta, links: Links, item: crate::Item) -> StoredObject {
    StoredObject { uid: meta.uid, namespace: meta.namespace, name: meta.name, labels: meta.labels, links, item }
}

/// Projects custom resources through their CRD printer columns.
pub struct CrdProjector {
    crd: CrdDescriptor,
}

impl CrdProjector {
    pub fn new(crd: CrdDescriptor) -> Self { Self { crd } }
}

impl Projector for CrdProjector {
    fn project(&self, meta: ObjectMeta, raw: &Value) -> StoredObject {
        let fields = self
            .crd
            .printer_columns
            .iter()
            .map(|pc| (pc.name.clone(), eval_json_path(raw, &pc.json_path).unwrap_or_default()))
            .collect();
        let links = Links { owners: owners_of(raw), ..Default::default() };
        let item = CustomObject { kind: self.crd.kind.clone(), meta: meta.clone(), fields };
        stored(meta, links, Arc::new(item))
    }
}

/// Fallback for kinds with neither a built-in nor a CRD projector: metadata only.
pub struct GenericProjector {
    kind: String,
}

impl GenericProjector {
    pub fn new(kind: &str) -> Self { Self { kind: kind.to_string() } }
}

impl Projector for GenericProjector {
    fn project(&self, meta: ObjectMeta, raw: &Value) -> StoredObject {
        let links = Links { owners: owners_of(raw), ..Default::default() };
        let item = CustomObject { kind: self.kind.clone(), meta: meta.clone(), fields: BTreeMap::new() };
        stored(meta, links, Arc::new(item))
    }
}

static JSON_PATH_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:\.([A-Za-z0-9_\-]+)|\[(\d+)\]|\[\?\(@\.([A-Za-z0-9_\-]+)==['"]([^'"]*)['"]\)\])"#)
        .expect("static json path pattern")
});

/// Evaluate the simple JSONPath subset used by CRD printer columns:
/// `.field`, `[index]` and `[?(@.key=="value")]`.
pub fn eval_json_path(raw: &Value, path: &str) -> Option<String> {
    let mut cur = raw;
    let mut rest = path.trim().trim_start_matches('{').trim_end_matches('}');
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
    }
    while !rest.is_empty() {
        let caps = JSON_PATH_SEGMENT.captures(rest)?;
        let whole = caps.get(0)?;
        if let Some(key) = caps.get(1) {
            cur = cur.get(key.as_str())?;
        } else if let Some(idx) = caps.get(2) {
            cur = cur.get(idx.as_str().parse::<usize>().ok()?)?;
        } else {
            let key = caps.get(3)?.as_str();
            let want = caps.get(4)?.as_str();
            cur = cur.as_array()?.iter().find(|el| el.get(key).and_then(|v| v.as_str()) == Some(want))?;
        }
        rest = &rest[whole.end()..];
    }
    Some(match cur {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(a) => a.iter().map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string())).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    })
}
