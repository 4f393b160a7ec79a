use crate::path::escape_pointer_segment;

use serde_json::{json, Map, Value};
use spindle_cypher::PathSegment;
use thiserror::Error;

/// Build the RFC-6902 ops for one `SET path = value` pair against one
/// resource document.
///
/// An existing leaf becomes `replace`; a missing leaf becomes `add`,
/// creating missing intermediate maps with empty-object `add`s first.
/// `[*]` expands into one op per element in ascending index order.
pub fn set_ops(doc: &Value, segments: &[PathSegment], value: &Value) -> Vec<Value> {
    let mut ops = Vec::new();
    walk(doc, segments, String::new(), value, &mut ops);
    ops
}

/// The full patch document for a SET over one resource: a `test` on
/// `metadata.resourceVersion` (when present) to surface conflicts,
/// followed by the ops of every pair.
pub fn set_patch(doc: &Value, pairs: &[(Vec<PathSegment>, Value)]) -> Value {
    let mut ops = Vec::new();
    if let Some(rv) = doc.pointer("/metadata/resourceVersion") {
        ops.push(json!({
            "op": "test",
            "path": "/metadata/resourceVersion",
            "value": rv,
        }));
    }
    for (segments, value) in pairs {
        ops.extend(set_ops(doc, segments, value));
    }
    Value::Array(ops)
}

fn walk(current: &Value, segments: &[PathSegment], prefix: String, value: &Value, ops: &mut Vec<Value>) {
    let Some((seg, rest)) = segments.split_first() else {
        return;
    };

    match seg {
        PathSegment::Key(key) => {
            let pointer = format!("{prefix}/{}", escape_pointer_segment(key));
            match current.get(key.as_str()) {
                Some(child) if !rest.is_empty() => walk(child, rest, pointer, value, ops),
                Some(_) => ops.push(json!({"op": "replace", "path": pointer, "value": value})),
                None if current.is_object() => add_missing(rest, pointer, value, ops),
                None => {}
            }
        }
        PathSegment::Index(idx) => {
            if let Some(child) = current.get(idx) {
                let pointer = format!("{prefix}/{idx}");
                if rest.is_empty() {
                    ops.push(json!({"op": "replace", "path": pointer, "value": value}));
                } else {
                    walk(child, rest, pointer, value, ops);
                }
            }
        }
        PathSegment::Wildcard => {
            if let Some(items) = current.as_array() {
                for (idx, child) in items.iter().enumerate() {
                    let pointer = format!("{prefix}/{idx}");
                    if rest.is_empty() {
                        ops.push(json!({"op": "replace", "path": pointer, "value": value}));
                    } else {
                        walk(child, rest, pointer, value, ops);
                    }
                }
            }
        }
    }
}

/// The leaf's parent chain is missing: add empty objects down the
/// remaining key path, then the value. A wildcard or index below a
/// missing map cannot be expanded and drops the op.
fn add_missing(rest: &[PathSegment], pointer: String, value: &Value, ops: &mut Vec<Value>) {
    let mut keys = Vec::new();
    for seg in rest {
        match seg {
            PathSegment::Key(k) => keys.push(k),
            _ => return,
        }
    }
    if keys.is_empty() {
        ops.push(json!({"op": "add", "path": pointer, "value": value}));
        return;
    }
    ops.push(json!({"op": "add", "path": pointer, "value": {}}));
    let mut pointer = pointer;
    for key in &keys[..keys.len() - 1] {
        pointer = format!("{pointer}/{}", escape_pointer_segment(key));
        ops.push(json!({"op": "add", "path": pointer, "value": {}}));
    }
    pointer = format!(
        "{pointer}/{}",
        escape_pointer_segment(keys[keys.len() - 1])
    );
    ops.push(json!({"op": "add", "path": pointer, "value": value}));
}

/// Failure applying a patch document in-process.
#[derive(Debug, Error)]
pub enum PatchApplyError {
    /// A `test` op did not hold.
    #[error("test failed at {path}")]
    Conflict { path: String },
    #[error("invalid patch: {0}")]
    Invalid(String),
}

/// Apply an RFC-6902 patch document (`test`, `add`, `replace`, `remove`)
/// in place. Backs the in-memory provider; the real provider lets the
/// API server apply patches.
pub fn apply_patch(doc: &mut Value, patch: &Value) -> Result<(), PatchApplyError> {
    let ops = patch
        .as_array()
        .ok_or_else(|| PatchApplyError::Invalid("patch is not an array".to_string()))?;

    for op in ops {
        let verb = op
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| PatchApplyError::Invalid("op missing".to_string()))?;
        let path = op
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| PatchApplyError::Invalid("path missing".to_string()))?;

        match verb {
            "test" => {
                let expected = op.get("value").unwrap_or(&Value::Null);
                if doc.pointer(path) != Some(expected) {
                    return Err(PatchApplyError::Conflict {
                        path: path.to_string(),
                    });
                }
            }
            "replace" => {
                let value = op.get("value").cloned().unwrap_or(Value::Null);
                let target = doc.pointer_mut(path).ok_or_else(|| {
                    PatchApplyError::Invalid(format!("replace target missing: {path}"))
                })?;
                *target = value;
            }
            "add" => {
                let value = op.get("value").cloned().unwrap_or(Value::Null);
                let (parent, last) = split_pointer(path)?;
                let target = doc.pointer_mut(parent).ok_or_else(|| {
                    PatchApplyError::Invalid(format!("add parent missing: {parent}"))
                })?;
                match target {
                    Value::Object(map) => {
                        map.insert(unescape_pointer_segment(last), value);
                    }
                    Value::Array(items) => {
                        if last == "-" {
                            items.push(value);
                        } else {
                            let idx: usize = last.parse().map_err(|_| {
                                PatchApplyError::Invalid(format!("bad array index: {last}"))
                            })?;
                            if idx > items.len() {
                                return Err(PatchApplyError::Invalid(format!(
                                    "array index out of bounds: {idx}"
                                )));
                            }
                            items.insert(idx, value);
                        }
                    }
                    _ => {
                        return Err(PatchApplyError::Invalid(format!(
                            "add parent is not a container: {parent}"
                        )))
                    }
                }
            }
            "remove" => {
                let (parent, last) = split_pointer(path)?;
                let target = doc.pointer_mut(parent).ok_or_else(|| {
                    PatchApplyError::Invalid(format!("remove parent missing: {parent}"))
                })?;
                match target {
                    Value::Object(map) => {
                        map.remove(&unescape_pointer_segment(last));
                    }
                    Value::Array(items) => {
                        let idx: usize = last.parse().map_err(|_| {
                            PatchApplyError::Invalid(format!("bad array index: {last}"))
                        })?;
                        if idx < items.len() {
                            items.remove(idx);
                        }
                    }
                    _ => {
                        return Err(PatchApplyError::Invalid(format!(
                            "remove parent is not a container: {parent}"
                        )))
                    }
                }
            }
            other => {
                return Err(PatchApplyError::Invalid(format!("unsupported op: {other}")));
            }
        }
    }
    Ok(())
}

fn split_pointer(path: &str) -> Result<(&str, &str), PatchApplyError> {
    path.rsplit_once('/')
        .ok_or_else(|| PatchApplyError::Invalid(format!("bad pointer: {path}")))
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Build a pretty label for a dry-run patch entry.
pub fn dry_run_entry(kind: &str, name: &str, namespace: Option<&str>, patch: &Value) -> Value {
    let mut entry = Map::new();
    entry.insert("kind".to_string(), json!(kind));
    entry.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        entry.insert("namespace".to_string(), json!(ns));
    }
    entry.insert("patch".to_string(), patch.clone());
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path;

    #[test]
    fn replaces_existing_leaf() {
        let doc = json!({"spec": {"replicas": 1}});
        let ops = set_ops(&doc, &parse_path("spec.replicas"), &json!(3));
        assert_eq!(
            ops,
            vec![json!({"op": "replace", "path": "/spec/replicas", "value": 3})]
        );
    }

    #[test]
    fn adds_missing_leaf() {
        let doc = json!({"metadata": {"labels": {}}});
        let ops = set_ops(&doc, &parse_path("metadata.labels.environment"), &json!("prod"));
        assert_eq!(
            ops,
            vec![json!({"op": "add", "path": "/metadata/labels/environment", "value": "prod"})]
        );
    }

    #[test]
    fn creates_missing_intermediates() {
        let doc = json!({"metadata": {"name": "web"}});
        let ops = set_ops(&doc, &parse_path("metadata.labels.environment"), &json!("prod"));
        assert_eq!(
            ops,
            vec![
                json!({"op": "add", "path": "/metadata/labels", "value": {}}),
                json!({"op": "add", "path": "/metadata/labels/environment", "value": "prod"}),
            ]
        );
    }

    #[test]
    fn wildcard_expands_per_element_in_order() {
        let doc = json!({"spec": {"containers": [{"image": "a"}, {"image": "b"}]}});
        let ops = set_ops(&doc, &parse_path("spec.containers[*].image"), &json!("c"));
        assert_eq!(
            ops,
            vec![
                json!({"op": "replace", "path": "/spec/containers/0/image", "value": "c"}),
                json!({"op": "replace", "path": "/spec/containers/1/image", "value": "c"}),
            ]
        );
    }

    #[test]
    fn escaped_dot_key_builds_escaped_pointer() {
        let doc = json!({"metadata": {"labels": {}}});
        let ops = set_ops(
            &doc,
            &parse_path(r"metadata.labels.app\.kubernetes\.io/name"),
            &json!("web"),
        );
        assert_eq!(
            ops,
            vec![json!({
                "op": "add",
                "path": "/metadata/labels/app.kubernetes.io~1name",
                "value": "web",
            })]
        );
    }

    #[test]
    fn patch_document_carries_resource_version_test() {
        let doc = json!({"metadata": {"resourceVersion": "42"}, "spec": {"replicas": 1}});
        let patch = set_patch(&doc, &[(parse_path("spec.replicas"), json!(2))]);
        let ops = patch.as_array().unwrap();
        assert_eq!(ops[0]["op"], "test");
        assert_eq!(ops[0]["path"], "/metadata/resourceVersion");
        assert_eq!(ops[1]["op"], "replace");
    }

    #[test]
    fn apply_round_trips_set_ops() {
        let mut doc = json!({
            "metadata": {"name": "web", "resourceVersion": "1"},
            "spec": {"replicas": 1},
        });
        let patch = set_patch(
            &doc.clone(),
            &[
                (parse_path("spec.replicas"), json!(3)),
                (parse_path("metadata.labels.environment"), json!("prod")),
            ],
        );
        apply_patch(&mut doc, &patch).unwrap();
        assert_eq!(doc.pointer("/spec/replicas"), Some(&json!(3)));
        assert_eq!(
            doc.pointer("/metadata/labels/environment"),
            Some(&json!("prod"))
        );
    }

    #[test]
    fn apply_detects_conflicts() {
        let mut doc = json!({"metadata": {"resourceVersion": "2"}});
        let patch = json!([
            {"op": "test", "path": "/metadata/resourceVersion", "value": "1"},
        ]);
        let err = apply_patch(&mut doc, &patch).unwrap_err();
        assert!(matches!(err, PatchApplyError::Conflict { .. }));
    }

    #[test]
    fn apply_supports_remove() {
        let mut doc = json!({"metadata": {"labels": {"a": "1", "b": "2"}}});
        let patch = json!([{"op": "remove", "path": "/metadata/labels/a"}]);
        apply_patch(&mut doc, &patch).unwrap();
        assert_eq!(doc.pointer("/metadata/labels"), Some(&json!({"b": "2"})));
    }
}
