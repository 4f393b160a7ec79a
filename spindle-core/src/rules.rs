use crate::errors::ErrorKind;
use crate::prelude::*;

use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use strum_macros::Display;

/// Edge label carried by a relationship rule and by result-graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Owns,
    Exposes,
    Routes,
    MountsConfigMap,
    MountsSecret,
    UsesServiceAccount,
    ClaimsVolume,
    BoundTo,
    ScheduledOn,
    AppliesTo,
    Scales,
    ServesEndpoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    ExactMatch,
    OwnerRefMatch,
    HasLabels,
    ContainsAll,
    StringContains,
}

/// One field-level condition between an instance of `kind_a` (field_a)
/// and an instance of `kind_b` (field_b). All criteria of a rule must
/// hold for a pair to connect.
#[derive(Debug, Clone)]
pub struct MatchCriterion {
    pub field_a: &'static str,
    pub field_b: &'static str,
    pub comparison: Comparison,
}

/// A declarative edge between two kinds, identified by their plural
/// resource names. By convention `kind_b` is the owning/selecting side,
/// so an arrow `(b)->(a)` follows the rule forward.
#[derive(Debug, Clone)]
pub struct RelationshipRule {
    pub kind_a: &'static str,
    pub kind_b: &'static str,
    pub rel_type: RelationshipType,
    pub criteria: Vec<MatchCriterion>,
}

fn owner_ref(kind_a: &'static str, kind_b: &'static str) -> RelationshipRule {
    RelationshipRule {
        kind_a,
        kind_b,
        rel_type: RelationshipType::Owns,
        criteria: vec![MatchCriterion {
            field_a: "metadata.ownerReferences[*].name",
            field_b: "metadata.name",
            comparison: Comparison::OwnerRefMatch,
        }],
    }
}

static CATALOG: LazyLock<Vec<RelationshipRule>> = LazyLock::new(|| {
    vec![
        owner_ref("replicasets", "deployments"),
        owner_ref("pods", "replicasets"),
        owner_ref("pods", "statefulsets"),
        owner_ref("pods", "daemonsets"),
        owner_ref("pods", "jobs"),
        owner_ref("jobs", "cronjobs"),
        RelationshipRule {
            kind_a: "pods",
            kind_b: "services",
            rel_type: RelationshipType::Exposes,
            criteria: vec![MatchCriterion {
                field_a: "metadata.labels",
                field_b: "spec.selector",
                comparison: Comparison::HasLabels,
            }],
        },
        RelationshipRule {
            kind_a: "services",
            kind_b: "ingresses",
            rel_type: RelationshipType::Routes,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.rules[*].http.paths[*].backend.service.name",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "configmaps",
            kind_b: "pods",
            rel_type: RelationshipType::MountsConfigMap,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.volumes[*].configMap.name",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "secrets",
            kind_b: "pods",
            rel_type: RelationshipType::MountsSecret,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.volumes[*].secret.secretName",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "serviceaccounts",
            kind_b: "pods",
            rel_type: RelationshipType::UsesServiceAccount,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.serviceAccountName",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "persistentvolumeclaims",
            kind_b: "pods",
            rel_type: RelationshipType::ClaimsVolume,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.volumes[*].persistentVolumeClaim.claimName",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "persistentvolumes",
            kind_b: "persistentvolumeclaims",
            rel_type: RelationshipType::BoundTo,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.volumeName",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "nodes",
            kind_b: "pods",
            rel_type: RelationshipType::ScheduledOn,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.nodeName",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "pods",
            kind_b: "networkpolicies",
            rel_type: RelationshipType::AppliesTo,
            criteria: vec![MatchCriterion {
                field_a: "metadata.labels",
                field_b: "spec.podSelector.matchLabels",
                comparison: Comparison::HasLabels,
            }],
        },
        RelationshipRule {
            kind_a: "deployments",
            kind_b: "horizontalpodautoscalers",
            rel_type: RelationshipType::Scales,
            criteria: vec![MatchCriterion {
                field_a: "metadata.name",
                field_b: "spec.scaleTargetRef.name",
                comparison: Comparison::ExactMatch,
            }],
        },
        RelationshipRule {
            kind_a: "endpointslices",
            kind_b: "services",
            rel_type: RelationshipType::ServesEndpoints,
            criteria: vec![MatchCriterion {
                field_a: r"metadata.labels.kubernetes\.io/service-name",
                field_b: "metadata.name",
                comparison: Comparison::ExactMatch,
            }],
        },
    ]
});

pub fn catalog() -> &'static [RelationshipRule] {
    &CATALOG
}

/// Find the rule connecting two kinds (plural resource names). Lookup is
/// symmetric; `swapped` is true when the rule matched as `(b, a)`.
pub fn find_rule(kind_a: &str, kind_b: &str) -> Option<(&'static RelationshipRule, bool)> {
    for rule in catalog() {
        if rule.kind_a == kind_a && rule.kind_b == kind_b {
            return Some((rule, false));
        }
        if rule.kind_a == kind_b && rule.kind_b == kind_a {
            return Some((rule, true));
        }
    }
    None
}

/// Every kind the catalog can connect to `kind`. Drives kindless-node
/// inference.
pub fn neighbor_kinds(kind: &str) -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = catalog()
        .iter()
        .filter_map(|rule| {
            if rule.kind_a == kind {
                Some(rule.kind_b)
            } else if rule.kind_b == kind {
                Some(rule.kind_a)
            } else {
                None
            }
        })
        .collect();
    kinds.sort_unstable();
    kinds.dedup();
    kinds
}

/// Synthesize a new resource for a relationship CREATE
/// (`(existing)->(new:Kind)`) from the source document. Only pairs with a
/// reverse template are supported.
pub fn creation_template(
    source_kind: &str,
    target_kind: &str,
    source: &Value,
    properties: Option<&Map<String, Value>>,
) -> Result<Value> {
    match (source_kind, target_kind) {
        ("deployments", "services") => Ok(service_for_deployment(source, properties)),
        ("services", "ingresses") => Ok(ingress_for_service(source, properties)),
        _ => Err(ErrorKind::NoCreationTemplate {
            kind_a: source_kind.to_string(),
            kind_b: target_kind.to_string(),
        }
        .into()),
    }
}

/// Service selector from the deployment's `spec.selector.matchLabels`,
/// ports from the container ports of its template.
fn service_for_deployment(deployment: &Value, properties: Option<&Map<String, Value>>) -> Value {
    let source_name = deployment
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("unnamed");
    let name = property_name(properties).unwrap_or_else(|| format!("{source_name}-service"));
    let namespace = deployment
        .pointer("/metadata/namespace")
        .cloned()
        .unwrap_or(Value::Null);
    let selector = deployment
        .pointer("/spec/selector/matchLabels")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let mut ports = Vec::new();
    for container in crate::path::resolve(
        deployment,
        &crate::path::parse_path("spec.template.spec.containers[*]"),
    ) {
        for port in crate::path::resolve(container, &crate::path::parse_path("ports[*]")) {
            if let Some(container_port) = port.get("containerPort") {
                ports.push(json!({
                    "port": container_port,
                    "targetPort": container_port,
                    "protocol": port.get("protocol").cloned().unwrap_or(json!("TCP")),
                }));
            }
        }
    }

    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": name,
            "namespace": namespace,
        },
        "spec": {
            "selector": selector,
            "ports": ports,
        },
    })
}

/// Single-rule ingress pointing every path at the service's first port.
fn ingress_for_service(service: &Value, properties: Option<&Map<String, Value>>) -> Value {
    let source_name = service
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("unnamed");
    let name = property_name(properties).unwrap_or_else(|| format!("{source_name}-ingress"));
    let namespace = service
        .pointer("/metadata/namespace")
        .cloned()
        .unwrap_or(Value::Null);
    let port = service
        .pointer("/spec/ports/0/port")
        .cloned()
        .unwrap_or(json!(80));

    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": name,
            "namespace": namespace,
        },
        "spec": {
            "rules": [{
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {
                            "service": {
                                "name": source_name,
                                "port": {"number": port},
                            },
                        },
                    }],
                },
            }],
        },
    })
}

fn property_name(properties: Option<&Map<String, Value>>) -> Option<String> {
    properties?
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}
