use crate::errors::ErrorKind;
use crate::path;
use crate::prelude::*;
use crate::rules::{Comparison, MatchCriterion, RelationshipRule};
use crate::value::{canonical_string, loose_eq};

use serde_json::{Map, Value};

/// Selectors derived from a node's property map, split into a field
/// selector (`name` / `metadata.name`) and label selectors (everything
/// else). Mixing the two is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selectors {
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
    /// The plain resource name when the field selector is a name match.
    pub name: Option<String>,
}

pub fn split_selectors(
    node_name: &str,
    properties: Option<&Map<String, Value>>,
) -> Result<Selectors> {
    let Some(props) = properties else {
        return Ok(Selectors::default());
    };

    let mut name: Option<String> = None;
    let mut labels: Vec<String> = Vec::new();
    for (key, value) in props {
        // Nested values are CREATE bodies, not selectors.
        if value.is_object() || value.is_array() {
            continue;
        }
        if key == "name" || key == "metadata.name" {
            name = Some(canonical_string(value));
        } else {
            labels.push(format!("{key}={}", canonical_string(value)));
        }
    }

    if name.is_some() && !labels.is_empty() {
        return Err(ErrorKind::ConflictingSelectors {
            node: node_name.to_string(),
        }
        .into());
    }

    Ok(Selectors {
        field_selector: name.as_ref().map(|n| format!("metadata.name={n}")),
        label_selector: if labels.is_empty() {
            None
        } else {
            Some(labels.join(","))
        },
        name,
    })
}

/// Pairs `(left_idx, right_idx)` for which the rule holds. `swapped`
/// flips which side the rule's `field_a`/`field_b` criteria read from.
/// Namespaced documents only pair within the same namespace.
pub fn matching_pairs(
    rule: &RelationshipRule,
    swapped: bool,
    left: &[Value],
    right: &[Value],
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (li, l) in left.iter().enumerate() {
        for (ri, r) in right.iter().enumerate() {
            if !same_namespace(l, r) {
                continue;
            }
            let (a, b) = if swapped { (r, l) } else { (l, r) };
            if rule.criteria.iter().all(|c| criterion_match(c, a, b)) {
                pairs.push((li, ri));
            }
        }
    }
    pairs
}

fn same_namespace(a: &Value, b: &Value) -> bool {
    match (
        a.pointer("/metadata/namespace").and_then(Value::as_str),
        b.pointer("/metadata/namespace").and_then(Value::as_str),
    ) {
        (Some(x), Some(y)) => x == y,
        // Cluster-scoped on either side pairs freely.
        _ => true,
    }
}

fn criterion_match(criterion: &MatchCriterion, a: &Value, b: &Value) -> bool {
    match criterion.comparison {
        Comparison::OwnerRefMatch => owner_ref_match(a, b),
        Comparison::HasLabels => has_labels(a, b, criterion),
        Comparison::ContainsAll => contains_all(a, b, criterion),
        Comparison::ExactMatch => {
            let left = path::resolve(a, &path::parse_path(criterion.field_a));
            let right = path::resolve(b, &path::parse_path(criterion.field_b));
            left.iter()
                .any(|x| right.iter().any(|y| loose_eq(x, y)))
        }
        Comparison::StringContains => {
            let left = path::resolve(a, &path::parse_path(criterion.field_a));
            let right = path::resolve(b, &path::parse_path(criterion.field_b));
            left.iter().any(|x| {
                right
                    .iter()
                    .any(|y| canonical_string(x).contains(&canonical_string(y)))
            })
        }
    }
}

/// A's ownerReferences must name B, and when both carry UIDs they must
/// agree.
fn owner_ref_match(a: &Value, b: &Value) -> bool {
    let Some(owner_name) = b.pointer("/metadata/name").and_then(Value::as_str) else {
        return false;
    };
    let owner_uid = b.pointer("/metadata/uid").and_then(Value::as_str);

    let refs = path::resolve(a, &path::parse_path("metadata.ownerReferences[*]"));
    refs.iter().any(|r| {
        let name_ok = r.get("name").and_then(Value::as_str) == Some(owner_name);
        let uid_ok = match (r.get("uid").and_then(Value::as_str), owner_uid) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        };
        name_ok && uid_ok
    })
}

/// A's label map must be a superset of B's selector map. An empty or
/// missing selector selects nothing.
fn has_labels(a: &Value, b: &Value, criterion: &MatchCriterion) -> bool {
    let labels = path::resolve(a, &path::parse_path(criterion.field_a));
    let selector = path::resolve(b, &path::parse_path(criterion.field_b));
    let (Some(Value::Object(labels)), Some(Value::Object(selector))) =
        (labels.first().copied(), selector.first().copied())
    else {
        return false;
    };
    if selector.is_empty() {
        return false;
    }
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|lv| loose_eq(lv, v)))
}

/// Array field on A contains every element of the array field on B.
fn contains_all(a: &Value, b: &Value, criterion: &MatchCriterion) -> bool {
    let left = path::resolve(a, &path::parse_path(criterion.field_a));
    let right = path::resolve(b, &path::parse_path(criterion.field_b));
    let (Some(Value::Array(left)), Some(Value::Array(right))) =
        (left.first().copied(), right.first().copied())
    else {
        return false;
    };
    if right.is_empty() {
        return false;
    }
    right
        .iter()
        .all(|needle| left.iter().any(|hay| loose_eq(hay, needle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{find_rule, RelationshipType};
    use serde_json::json;

    fn deployment(name: &str, uid: &str) -> Value {
        json!({
            "metadata": {"name": name, "namespace": "default", "uid": uid},
            "spec": {"selector": {"matchLabels": {"app": name}}},
        })
    }

    fn replica_set(name: &str, owner: &str, owner_uid: &str) -> Value {
        json!({
            "metadata": {
                "name": name,
                "namespace": "default",
                "uid": format!("{name}-uid"),
                "ownerReferences": [{"kind": "Deployment", "name": owner, "uid": owner_uid}],
            },
        })
    }

    #[test]
    fn split_selectors_name_only() {
        let props = json!({"name": "web"});
        let sel = split_selectors("d", props.as_object()).unwrap();
        assert_eq!(sel.field_selector.as_deref(), Some("metadata.name=web"));
        assert_eq!(sel.label_selector, None);
        assert_eq!(sel.name.as_deref(), Some("web"));
    }

    #[test]
    fn split_selectors_labels_only() {
        let props = json!({"app": "web", "tier": "frontend"});
        let sel = split_selectors("d", props.as_object()).unwrap();
        assert_eq!(sel.field_selector, None);
        assert_eq!(sel.label_selector.as_deref(), Some("app=web,tier=frontend"));
    }

    #[test]
    fn split_selectors_conflict() {
        let props = json!({"name": "web", "app": "web"});
        let err = split_selectors("d", props.as_object()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ConflictingSelectors { .. }));
    }

    #[test]
    fn owner_refs_bind_replica_sets_to_deployments() {
        let (rule, swapped) = find_rule("replicasets", "deployments").unwrap();
        assert_eq!(rule.rel_type, RelationshipType::Owns);

        let replica_sets = vec![
            replica_set("web-1", "web", "uid-web"),
            replica_set("api-1", "api", "uid-api"),
        ];
        let deployments = vec![deployment("web", "uid-web"), deployment("api", "uid-api")];
        let pairs = matching_pairs(rule, swapped, &replica_sets, &deployments);
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn owner_ref_uid_mismatch_rejects() {
        let (rule, swapped) = find_rule("replicasets", "deployments").unwrap();
        let replica_sets = vec![replica_set("web-1", "web", "stale-uid")];
        let deployments = vec![deployment("web", "uid-web")];
        assert!(matching_pairs(rule, swapped, &replica_sets, &deployments).is_empty());
    }

    #[test]
    fn namespaces_partition_matches() {
        let (rule, swapped) = find_rule("replicasets", "deployments").unwrap();
        let mut rs = replica_set("web-1", "web", "uid-web");
        rs["metadata"]["namespace"] = json!("other");
        let deployments = vec![deployment("web", "uid-web")];
        assert!(matching_pairs(rule, swapped, &[rs], &deployments).is_empty());
    }

    #[test]
    fn service_selects_pods_by_label_superset() {
        let (rule, swapped) = find_rule("pods", "services").unwrap();
        let pods = vec![
            json!({"metadata": {"name": "p1", "namespace": "default",
                   "labels": {"app": "web", "extra": "y"}}}),
            json!({"metadata": {"name": "p2", "namespace": "default",
                   "labels": {"app": "api"}}}),
        ];
        let services = vec![json!({
            "metadata": {"name": "web", "namespace": "default"},
            "spec": {"selector": {"app": "web"}},
        })];
        let pairs = matching_pairs(rule, swapped, &pods, &services);
        assert_eq!(pairs, vec![(0, 0)]);
    }

    #[test]
    fn empty_selector_matches_nothing() {
        let (rule, swapped) = find_rule("pods", "services").unwrap();
        let pods = vec![json!({"metadata": {"name": "p", "namespace": "default",
                               "labels": {"app": "web"}}})];
        let services = vec![json!({
            "metadata": {"name": "s", "namespace": "default"},
            "spec": {"selector": {}},
        })];
        assert!(matching_pairs(rule, swapped, &pods, &services).is_empty());
    }

    #[test]
    fn ingress_routes_to_service_by_backend_name() {
        let (rule, swapped) = find_rule("services", "ingresses").unwrap();
        let services = vec![json!({"metadata": {"name": "web", "namespace": "default"}})];
        let ingresses = vec![json!({
            "metadata": {"name": "edge", "namespace": "default"},
            "spec": {"rules": [{"http": {"paths": [
                {"backend": {"service": {"name": "web"}}},
            ]}}]},
        })];
        let pairs = matching_pairs(rule, swapped, &services, &ingresses);
        assert_eq!(pairs, vec![(0, 0)]);
    }

    #[test]
    fn contains_all_requires_every_element() {
        let rule = RelationshipRule {
            kind_a: "a",
            kind_b: "b",
            rel_type: RelationshipType::Owns,
            criteria: vec![MatchCriterion {
                field_a: "spec.finalizers",
                field_b: "spec.required",
                comparison: Comparison::ContainsAll,
            }],
        };
        let left = vec![json!({"spec": {"finalizers": ["x", "y", "z"]}})];
        let superset = vec![json!({"spec": {"required": ["x", "z"]}})];
        assert_eq!(matching_pairs(&rule, false, &left, &superset), vec![(0, 0)]);

        let missing = vec![json!({"spec": {"required": ["x", "w"]}})];
        assert!(matching_pairs(&rule, false, &left, &missing).is_empty());

        let empty = vec![json!({"spec": {"required": []}})];
        assert!(matching_pairs(&rule, false, &left, &empty).is_empty());
    }

    #[test]
    fn string_contains_matches_substrings() {
        let rule = RelationshipRule {
            kind_a: "a",
            kind_b: "b",
            rel_type: RelationshipType::Owns,
            criteria: vec![MatchCriterion {
                field_a: "spec.image",
                field_b: "spec.registry",
                comparison: Comparison::StringContains,
            }],
        };
        let left = vec![json!({"spec": {"image": "registry.local/app:1.0"}})];
        let right = vec![json!({"spec": {"registry": "registry.local"}})];
        assert_eq!(matching_pairs(&rule, false, &left, &right), vec![(0, 0)]);

        let other = vec![json!({"spec": {"registry": "ghcr.io"}})];
        assert!(matching_pairs(&rule, false, &left, &other).is_empty());
    }

    #[test]
    fn pod_mounts_config_map_via_volume() {
        let (rule, swapped) = find_rule("configmaps", "pods").unwrap();
        let config_maps = vec![json!({"metadata": {"name": "app-config", "namespace": "default"}})];
        let pods = vec![json!({
            "metadata": {"name": "p", "namespace": "default"},
            "spec": {"volumes": [{"configMap": {"name": "app-config"}}]},
        })];
        let pairs = matching_pairs(rule, swapped, &config_maps, &pods);
        assert_eq!(pairs, vec![(0, 0)]);
    }
}
