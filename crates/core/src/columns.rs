//! Column specs and the built-in column sets for core Kubernetes kinds.
//!
//! This module provides:
//! - [`ColumnSpec`]: declarative column (field path, sizing, priority, formatter)
//! - Column sets per built-in kind, keyed by `Kind`
//! - Columns for dynamic CRD screens built from printer columns

use chrono::Utc;

use crate::{field, AttrValue, CrdDescriptor, Resource};

/// Pure value -> display string conversion.
pub type Formatter = fn(&AttrValue) -> String;

/// Default width when a column declares neither a minimum nor a fixed width.
pub const DEFAULT_WIDTH: u16 = 20;

#[derive(Clone, Debug)]
pub struct ColumnSpec {
    /// Attribute path, possibly dotted (`Fields.Ready`).
    pub field: String,
    pub title: String,
    pub min_width: u16,
    /// Upper bound for evenly divided (unweighted) columns; 0 = unbounded.
    pub max_width: u16,
    pub weight: u16,
    /// Legacy fixed width; 0 = dynamic.
    pub width: u16,
    /// 1 = always shown; 2 and 3 are dropped first when space runs out.
    pub priority: u8,
    pub formatter: Option<Formatter>,
}

impl ColumnSpec {
    pub fn new(field: &str, title: &str) -> Self {
        Self {
            field: field.to_string(),
            title: title.to_string(),
            min_width: 0,
            max_width: 0,
            weight: 0,
            width: 0,
            priority: 1,
            formatter: None,
        }
    }

    pub fn min(mut self, w: u16) -> Self { self.min_width = w; self }
    pub fn max(mut self, w: u16) -> Self { self.max_width = w; self }
    pub fn weight(mut self, w: u16) -> Self { self.weight = w; self }
    pub fn fixed(mut self, w: u16) -> Self { self.width = w; self }
    pub fn priority(mut self, p: u8) -> Self { self.priority = p; self }
    pub fn format(mut self, f: Formatter) -> Self { self.formatter = Some(f); self }

    pub fn is_required(&self) -> bool { self.priority <= 1 }

    /// Width assumed while deciding visibility.
    pub fn estimated_width(&self, default: u16) -> u16 {
        if self.min_width > 0 {
            self.min_width
        } else if self.width > 0 {
            self.width
        } else {
            default
        }
    }

    /// Display string for this column's cell.
    pub fn render(&self, resource: &dyn Resource) -> String {
        let value = field::get(resource, &self.field);
        match self.formatter {
            Some(f) => f(&value),
            None => value.to_string(),
        }
    }
}

/// Compact age (`42s`, `7m`, `5h`, `3d`, `2y`) of a timestamp value.
pub fn format_age(value: &AttrValue) -> String {
    match value.as_time() {
        Some(t) => humanize_secs((Utc::now() - t).num_seconds().max(0)),
        None => "-".to_string(),
    }
}

pub fn humanize_secs(secs: i64) -> String {
    match secs {
        s if s < 120 => format!("{}s", s),
        s if s < 2 * 3_600 => format!("{}m", s / 60),
        s if s < 2 * 86_400 => format!("{}h", s / 3_600),
        s if s < 730 * 86_400 => format!("{}d", s / 86_400),
        s => format!("{}y", s / (365 * 86_400)),
    }
}

/// `<none>` for blank values.
pub fn format_or_none(value: &AttrValue) -> String {
    if value.is_blank() { "<none>".to_string() } else { value.to_string() }
}

fn namespace() -> ColumnSpec { ColumnSpec::new("Namespace", "NAMESPACE").min(10).weight(1).priority(2) }
fn name() -> ColumnSpec { ColumnSpec::new("Name", "NAME").min(20).max(60).weight(3) }
fn age() -> ColumnSpec { ColumnSpec::new("Age", "AGE").min(6).format(format_age) }
fn col(field: &str, title: &str, min: u16) -> ColumnSpec { ColumnSpec::new(field, title).min(min) }

/// Full column set for a built-in kind, including Name and Age.
/// Unknown kinds get Namespace/Name/Age.
pub fn builtin_columns_for(kind: &str, namespaced: bool) -> Vec<ColumnSpec> {
    let mut cols: Vec<ColumnSpec> = Vec::new();
    if namespaced {
        cols.push(namespace());
    }
    cols.push(name());

    match kind {
        "Pod" => {
            cols.push(col("Ready", "READY", 7));
            cols.push(col("Status", "STATUS", 10).weight(1));
            cols.push(col("Restarts", "RESTARTS", 8).priority(2));
            cols.push(col("IP", "IP", 15).priority(3));
            cols.push(col("Node", "NODE", 16).weight(1).priority(3));
        }
        "Deployment" => {
            cols.push(col("Ready", "READY", 7));
            cols.push(col("UpToDate", "UP-TO-DATE", 10).priority(2));
            cols.push(col("Available", "AVAILABLE", 9).priority(2));
        }
        "StatefulSet" => {
            cols.push(col("Ready", "READY", 7));
        }
        "DaemonSet" => {
            cols.push(col("Desired", "DESIRED", 7));
            cols.push(col("Current", "CURRENT", 7).priority(2));
            cols.push(col("Ready", "READY", 7));
            cols.push(col("UpToDate", "UP-TO-DATE", 10).priority(3));
            cols.push(col("Available", "AVAILABLE", 9).priority(3));
        }
        "ReplicaSet" => {
            cols.push(col("Desired", "DESIRED", 7));
            cols.push(col("Current", "CURRENT", 7).priority(2));
            cols.push(col("Ready", "READY", 7));
        }
        "Job" => {
            cols.push(col("Completions", "COMPLETIONS", 11));
            cols.push(col("Status", "STATUS", 10).weight(1));
        }
        "CronJob" => {
            cols.push(col("Schedule", "SCHEDULE", 12).weight(1));
            cols.push(col("Suspend", "SUSPEND", 7).priority(2));
            cols.push(col("Active", "ACTIVE", 6));
            cols.push(col("LastSchedule", "LAST SCHEDULE", 13).priority(3).format(format_age));
        }
        "Service" => {
            cols.push(col("Type", "TYPE", 12));
            cols.push(col("ClusterIP", "CLUSTER-IP", 15).priority(2));
            cols.push(col("ExternalIP", "EXTERNAL-IP", 15).priority(3).format(format_or_none));
            cols.push(col("Ports", "PORTS", 12).weight(1).priority(2));
        }
        "Endpoints" => {
            cols.push(col("Endpoints", "ENDPOINTS", 20).weight(2).format(format_or_none));
        }
        "Ingress" => {
            cols.push(col("Class", "CLASS", 8).priority(2));
            cols.push(col("Hosts", "HOSTS", 16).weight(2));
            cols.push(col("Address", "ADDRESS", 15).priority(3));
            cols.push(col("TLS", "TLS", 3).priority(3));
        }
        "ConfigMap" => {
            cols.push(col("Data", "DATA", 4));
        }
        "Secret" => {
            cols.push(col("Type", "TYPE", 20).weight(1).priority(2));
            cols.push(col("Data", "DATA", 4));
        }
        "PersistentVolumeClaim" => {
            cols.push(col("Status", "STATUS", 7));
            cols.push(col("Volume", "VOLUME", 16).weight(1).priority(2));
            cols.push(col("Capacity", "CAPACITY", 8));
            cols.push(col("AccessModes", "ACCESS MODES", 12).priority(3));
            cols.push(col("StorageClass", "STORAGECLASS", 12).priority(3));
        }
        "Node" => {
            cols.push(col("Status", "STATUS", 8));
            cols.push(col("Roles", "ROLES", 12).weight(1).priority(2));
            cols.push(col("Version", "VERSION", 10).priority(3));
        }
        "Namespace" => {
            cols.push(col("Status", "STATUS", 8));
        }
        "HorizontalPodAutoscaler" => {
            cols.push(col("Reference", "REFERENCE", 20).weight(2));
            cols.push(col("MinPods", "MINPODS", 7).priority(2));
            cols.push(col("MaxPods", "MAXPODS", 7).priority(2));
            cols.push(col("Replicas", "REPLICAS", 8));
        }
        "CustomResourceDefinition" => {
            cols.push(col("Group", "GROUP", 16).weight(2));
            cols.push(col("CrdKind", "KIND", 12).weight(1).priority(2));
            cols.push(col("Version", "VERSION", 8).priority(2));
            cols.push(col("Scope", "SCOPE", 10).priority(3));
        }
        _ => {}
    }

    cols.push(age());
    cols
}

/// Columns of a dynamic CRD screen: printer columns read from the `Fields` map.
pub fn crd_columns(crd: &CrdDescriptor) -> Vec<ColumnSpec> {
    let mut cols: Vec<ColumnSpec> = Vec::new();
    if crd.namespaced {
        cols.push(namespace());
    }
    cols.push(name());
    for (i, pc) in crd.printer_columns.iter().enumerate() {
        if pc.name.eq_ignore_ascii_case("age") {
            continue;
        }
        let title = pc.name.to_uppercase();
        let min = (title.len() as u16).max(6);
        let mut spec = ColumnSpec::new(&format!("Fields.{}", pc.name), &title).min(min).priority(if i < 2 { 1 } else { 2 });
        if pc.type_hint == "date" {
            spec = spec.format(format_age);
        }
        cols.push(spec);
    }
    cols.push(age());
    cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrinterColumn;
    use chrono::Duration;

    #[test]
    fn every_builtin_set_keeps_name_and_age_required() {
        for kind in ["Pod", "Deployment", "Service", "Node", "Unknown"] {
            let cols = builtin_columns_for(kind, kind != "Node");
            assert!(cols.iter().any(|c| c.field == "Name" && c.is_required()), "{kind}");
            assert_eq!(cols.last().map(|c| c.field.as_str()), Some("Age"));
        }
    }

    #[test]
    fn estimated_width_falls_back() {
        assert_eq!(ColumnSpec::new("A", "A").min(12).fixed(30).estimated_width(20), 12);
        assert_eq!(ColumnSpec::new("A", "A").fixed(30).estimated_width(20), 30);
        assert_eq!(ColumnSpec::new("A", "A").estimated_width(20), 20);
    }

    #[test]
    fn age_formatting() {
        let t = Utc::now() - Duration::minutes(7);
        assert_eq!(format_age(&AttrValue::Time(t)), "7m");
        assert_eq!(format_age(&AttrValue::empty()), "-");
        assert_eq!(humanize_secs(3), "3s");
        assert_eq!(humanize_secs(3 * 86_400), "3d");
    }

    #[test]
    fn crd_columns_read_fields_map() {
        let crd = CrdDescriptor {
            group: "cert-manager.io".into(),
            version: "v1".into(),
            kind: "Certificate".into(),
            plural: "certificates".into(),
            namespaced: true,
            printer_columns: vec![
                PrinterColumn { name: "Ready".into(), json_path: ".status.conditions[?(@.type==\"Ready\")].status".into(), type_hint: "string".into() },
                PrinterColumn { name: "Age".into(), json_path: ".metadata.creationTimestamp".into(), type_hint: "date".into() },
            ],
        };
        let fields: Vec<String> = crd_columns(&crd).into_iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["Namespace", "Name", "Fields.Ready", "Age"]);
    }
}
