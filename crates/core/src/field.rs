//! Field accessor: reads a possibly dotted path out of any [`Resource`].

use std::collections::BTreeMap;

use crate::{lookup, AttrValue, Resource};

/// Resolve `path` against `resource`.
///
/// A plain name is a direct, case-sensitive attribute lookup. `A.B` resolves `A`
/// first; a map value answers `B` as a key lookup, a structured value resolves
/// `B` recursively. Anything missing reads as the empty string.
pub fn get(resource: &dyn Resource, path: &str) -> AttrValue {
    let (head, rest) = split(path);
    let Some(value) = resource.attribute(head) else {
        return AttrValue::empty();
    };
    match rest {
        None => value,
        Some(rest) => descend(value, rest),
    }
}

/// Stringified [`get`].
pub fn get_string(resource: &dyn Resource, path: &str) -> String {
    get(resource, path).to_string()
}

fn split(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn descend(value: AttrValue, path: &str) -> AttrValue {
    match value {
        AttrValue::Map(map) => map.get(path).map(|v| AttrValue::Text(v.clone())).unwrap_or_else(AttrValue::empty),
        AttrValue::Struct(attrs) | AttrValue::Embedded(attrs) => {
            let (head, rest) = split(path);
            match (lookup(&attrs, head), rest) {
                (None, _) => AttrValue::empty(),
                (Some(v), None) => v,
                (Some(v), Some(rest)) => descend(v, rest),
            }
        }
        _ => AttrValue::empty(),
    }
}

/// Flatten a resource into a plain map with lower-cased keys.
///
/// Embedded substructures are promoted one level; a top-level attribute wins
/// over a promoted one with the same name.
pub fn to_attribute_map(resource: &dyn Resource) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    let mut promoted = Vec::new();
    for (k, v) in resource.attributes() {
        match v {
            AttrValue::Embedded(inner) => promoted.extend(inner),
            other => {
                out.insert(k.to_lowercase(), other);
            }
        }
    }
    for (k, v) in promoted {
        out.entry(k.to_lowercase()).or_insert(v);
    }
    out
}

/// Trimmed text of `key` in an attribute map, empty when absent.
pub fn text(map: &BTreeMap<String, AttrValue>, key: &str) -> String {
    map.get(key).map(|v| v.to_string().trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attributes, CustomObject, ObjectMeta, ResourceItem};
    use smallvec::smallvec;

    #[derive(Debug)]
    struct Nested;

    impl Resource for Nested {
        fn attributes(&self) -> Attributes {
            let mut spec = Attributes::new();
            spec.insert("Replicas".into(), AttrValue::Int(3));
            let mut inner = Attributes::new();
            inner.insert("Kind".into(), AttrValue::Text("Deployment".into()));
            spec.insert("Target".into(), AttrValue::Struct(inner));
            let mut a = Attributes::new();
            a.insert("Spec".into(), AttrValue::Struct(spec));
            a.insert("Name".into(), AttrValue::Text("web".into()));
            a
        }
    }

    fn pod() -> ResourceItem {
        ResourceItem {
            kind: "Pod".into(),
            meta: ObjectMeta { namespace: Some("default".into()), name: "api-0".into(), ..Default::default() },
            columns: smallvec![("Ready".to_string(), "1/1".to_string()), ("Status".to_string(), "Running".to_string())],
            extra: Attributes::new(),
        }
    }

    #[test]
    fn direct_and_promoted_lookup() {
        let p = pod();
        assert_eq!(get_string(&p, "Ready"), "1/1");
        assert_eq!(get_string(&p, "Name"), "api-0");
        assert_eq!(get_string(&p, "Namespace"), "default");
        assert_eq!(get_string(&p, "ready"), "", "lookup is case-sensitive");
        assert_eq!(get_string(&p, "Missing"), "");
    }

    #[test]
    fn dotted_path_into_map_and_struct() {
        let mut fields = BTreeMap::new();
        fields.insert("Ready".to_string(), "True".to_string());
        let cr = CustomObject { kind: "Certificate".into(), meta: ObjectMeta::default(), fields };
        assert_eq!(get_string(&cr, "Fields.Ready"), "True");
        assert_eq!(get_string(&cr, "Fields.Secret"), "");

        assert_eq!(get(&Nested, "Spec.Replicas"), AttrValue::Int(3));
        assert_eq!(get_string(&Nested, "Spec.Target.Kind"), "Deployment");
        assert_eq!(get_string(&Nested, "Spec.Target.Name"), "");
        assert_eq!(get_string(&Nested, "Name.Anything"), "");
    }

    #[test]
    fn attribute_map_lowercases_and_promotes() {
        let map = to_attribute_map(&pod());
        assert_eq!(text(&map, "name"), "api-0");
        assert_eq!(text(&map, "namespace"), "default");
        assert_eq!(text(&map, "status"), "Running");
        assert_eq!(text(&map, "kind"), "Pod");
        assert!(!map.contains_key("objectmeta"));
        assert_eq!(text(&map, "absent"), "");
    }
}
