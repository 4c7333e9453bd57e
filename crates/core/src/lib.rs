//! kubedeck core types: the resource model every screen reads through.
//!
//! Resources come in two shapes: built-in kinds with first-class attributes
//! ([`ResourceItem`]) and custom resources whose printer-column values live in a
//! generic string map ([`CustomObject`]). Both implement [`Resource`], and
//! [`field::get`] reads either uniformly.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod columns;
pub mod config;
pub mod field;
pub mod project;

pub type Uid = [u8; 16];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeltaKind {
    Applied,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub uid: Uid,
    pub kind: DeltaKind,
    /// Raw object as served by the API (or read from a fixture).
    pub raw: serde_json::Value,
}

/// A served Kubernetes resource kind (incl. CRDs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn new(group: &str, version: &str, kind: &str, namespaced: bool) -> Self {
        Self { group: group.to_string(), version: version.to_string(), kind: kind.to_string(), namespaced }
    }

    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() { format!("{}/{}", self.version, self.kind) } else { format!("{}/{}/{}", self.group, self.version, self.kind) }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gvk_key())
    }
}

/// Value of one resource attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
    List(Vec<String>),
    /// String-keyed map; a dotted path descends into it with a plain key lookup.
    Map(BTreeMap<String, String>),
    /// Structured value; a dotted path resolves the remainder recursively.
    Struct(Attributes),
    /// Anonymous substructure whose fields are promoted to the parent.
    Embedded(Attributes),
}

pub type Attributes = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// The value read for a missing attribute.
    pub fn empty() -> Self { AttrValue::Text(String::new()) }

    pub fn is_blank(&self) -> bool {
        match self {
            AttrValue::Text(s) => s.trim().is_empty(),
            AttrValue::List(v) => v.is_empty(),
            AttrValue::Map(m) => m.is_empty(),
            AttrValue::Struct(a) | AttrValue::Embedded(a) => a.is_empty(),
            AttrValue::Int(_) | AttrValue::Bool(_) | AttrValue::Time(_) => false,
        }
    }

    /// Timestamp view: native times, or text that parses as RFC 3339.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Time(t) => Some(*t),
            AttrValue::Text(s) => DateTime::parse_from_rfc3339(s.trim()).ok().map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(n) => write!(f, "{}", n),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            AttrValue::List(v) => f.write_str(&v.join(",")),
            AttrValue::Map(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                f.write_str(&parts.join(","))
            }
            AttrValue::Struct(a) | AttrValue::Embedded(a) => {
                let parts: Vec<String> = a.values().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

/// Uniform read access over heterogeneous resource shapes.
pub trait Resource: fmt::Debug + Send + Sync {
    /// Attributes keyed by their declared (case-sensitive) names.
    fn attributes(&self) -> Attributes;

    /// Direct lookup of one declared attribute. Fields of embedded substructures
    /// are promoted, so `Name` resolves even when it lives in the object meta.
    fn attribute(&self, name: &str) -> Option<AttrValue> {
        lookup(&self.attributes(), name)
    }
}

/// Shared handle to a resource as held by screens and the repository.
pub type Item = Arc<dyn Resource>;

pub(crate) fn lookup(attrs: &Attributes, name: &str) -> Option<AttrValue> {
    if let Some(v) = attrs.get(name) {
        return Some(v.clone());
    }
    attrs.values().find_map(|v| match v {
        AttrValue::Embedded(inner) => inner.get(name).cloned(),
        _ => None,
    })
}

/// `namespace/name` identity used to find a row again after a refresh.
pub fn stable_key(resource: &dyn Resource) -> String {
    format!("{}/{}", field::get(resource, "Namespace"), field::get(resource, "Name"))
}

/// Metadata shared by every object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMeta {
    pub uid: Uid,
    pub namespace: Option<String>,
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    fn attributes(&self) -> Attributes {
        let mut a = Attributes::new();
        a.insert("Namespace".into(), AttrValue::Text(self.namespace.clone().unwrap_or_default()));
        a.insert("Name".into(), AttrValue::Text(self.name.clone()));
        a.insert("Age".into(), self.created.map(AttrValue::Time).unwrap_or_else(AttrValue::empty));
        a.insert("Labels".into(), AttrValue::Map(self.labels.clone()));
        a
    }

    fn attribute(&self, name: &str) -> Option<AttrValue> {
        match name {
            "Namespace" => Some(AttrValue::Text(self.namespace.clone().unwrap_or_default())),
            "Name" => Some(AttrValue::Text(self.name.clone())),
            "Age" => Some(self.created.map(AttrValue::Time).unwrap_or_else(AttrValue::empty)),
            "Labels" => Some(AttrValue::Map(self.labels.clone())),
            _ => None,
        }
    }
}

/// A built-in kind with its display columns projected as first-class attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceItem {
    pub kind: String,
    pub meta: ObjectMeta,
    /// Projected display values, keyed by attribute name (e.g. `Ready`, `Status`).
    pub columns: SmallVec<[(String, String); 8]>,
    /// Structured attributes that are not plain columns.
    pub extra: Attributes,
}

impl Resource for ResourceItem {
    fn attributes(&self) -> Attributes {
        let mut a = self.extra.clone();
        for (k, v) in &self.columns {
            a.insert(k.clone(), AttrValue::Text(v.clone()));
        }
        a.insert("Kind".into(), AttrValue::Text(self.kind.clone()));
        a.insert("ObjectMeta".into(), AttrValue::Embedded(self.meta.attributes()));
        a
    }

    fn attribute(&self, name: &str) -> Option<AttrValue> {
        if name == "Kind" {
            return Some(AttrValue::Text(self.kind.clone()));
        }
        if name == "ObjectMeta" {
            return Some(AttrValue::Embedded(self.meta.attributes()));
        }
        if let Some((_, v)) = self.columns.iter().find(|(k, _)| k == name) {
            return Some(AttrValue::Text(v.clone()));
        }
        if let Some(v) = self.extra.get(name) {
            return Some(v.clone());
        }
        self.meta.attribute(name)
    }
}

/// A custom resource; printer-column values live in the `Fields` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomObject {
    pub kind: String,
    pub meta: ObjectMeta,
    pub fields: BTreeMap<String, String>,
}

impl Resource for CustomObject {
    fn attributes(&self) -> Attributes {
        let mut a = Attributes::new();
        a.insert("Kind".into(), AttrValue::Text(self.kind.clone()));
        a.insert("ObjectMeta".into(), AttrValue::Embedded(self.meta.attributes()));
        a.insert("Fields".into(), AttrValue::Map(self.fields.clone()));
        a
    }
}

/// Reference to another object by kind and name (`Kind/name`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjRef {
    pub kind: String,
    pub name: String,
}

impl ObjRef {
    pub fn new(kind: &str, name: &str) -> Self {
        Self { kind: kind.to_string(), name: name.to_string() }
    }

    /// Parse `Kind/name`; both halves must be non-empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, name) = s.trim().split_once('/')?;
        if kind.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(kind, name))
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Relationship data extracted at projection time; answers "pods for X" queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    pub owners: SmallVec<[ObjRef; 2]>,
    pub node: Option<String>,
    /// Label selector for kinds that select pods (Service, Deployment, ...).
    pub selector: Option<BTreeMap<String, String>>,
    /// Volume sources mounted by a pod (ConfigMap, Secret, PersistentVolumeClaim).
    pub volumes: SmallVec<[ObjRef; 4]>,
    /// Objects this one points at (scale target, ingress backends, endpoint targets).
    pub refs: SmallVec<[ObjRef; 4]>,
}

/// A projected object as kept by the repository.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub uid: Uid,
    pub namespace: Option<String>,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub links: Links,
    pub item: Item,
}

/// Relationship constraint attached to a screen to scope its fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterContext {
    pub field: String,
    pub value: String,
    pub metadata: BTreeMap<String, String>,
}

impl FilterContext {
    pub fn new(field: &str, value: &str) -> Self {
        Self { field: field.to_string(), value: value.to_string(), metadata: BTreeMap::new() }
    }

    /// Attach a metadata entry; blank values are skipped.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.metadata.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.get("namespace").map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    pub fn kind(&self) -> &str {
        self.metadata.get("kind").map(|s| s.as_str()).unwrap_or("")
    }
}

impl fmt::Display for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.metadata.get("kind") {
            Some(kind) => write!(f, "{} {}/{}", self.field, kind, self.value),
            None => write!(f, "{} {}", self.field, self.value),
        }
    }
}

/// One printer column declared by a CRD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterColumn {
    pub name: String,
    pub json_path: String,
    /// OpenAPI type hint (`string`, `integer`, `date`, ...).
    pub type_hint: String,
}

impl PrinterColumn {
    /// Tab-separated form carried as a list attribute on CRD rows.
    pub fn encode(&self) -> String {
        format!("{}\t{}\t{}", self.name, self.type_hint, self.json_path)
    }

    pub fn decode(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '\t');
        let name = parts.next()?.to_string();
        let type_hint = parts.next()?.to_string();
        let json_path = parts.next()?.to_string();
        if name.is_empty() || json_path.is_empty() {
            return None;
        }
        Some(Self { name, json_path, type_hint })
    }
}

/// Everything needed to build a screen for a custom resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrdDescriptor {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
    pub printer_columns: Vec<PrinterColumn>,
}

impl CrdDescriptor {
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::new(&self.group, &self.version, &self.kind, self.namespaced)
    }

    /// Screen id of the dynamic screen, e.g. `certificates.cert-manager.io`.
    pub fn screen_id(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }
}

pub mod prelude {
    pub use super::{
        AttrValue, Attributes, CrdDescriptor, CustomObject, Delta, DeltaKind, FilterContext, Item, Links,
        ObjRef, ObjectMeta, Resource, ResourceItem, ResourceKind, StoredObject, Uid,
    };
}
