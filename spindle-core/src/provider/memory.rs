use crate::errors::ErrorKind;
use crate::mutate::{apply_patch, PatchApplyError};
use crate::prelude::*;
use crate::provider::{ApiResourceEntry, Provider};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fixture-backed provider for tests and offline runs. Documents live in
/// memory keyed by plural resource name; selectors, patches, and deletes
/// behave like the API server's.
#[derive(Default)]
pub struct MemoryProvider {
    resources: Mutex<HashMap<String, Vec<Value>>>,
    contexts: Mutex<HashMap<String, Arc<MemoryProvider>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        MemoryProvider::default()
    }

    /// Insert a document under a plural resource name.
    pub fn insert(&self, resource: &str, doc: Value) {
        self.resources
            .lock()
            .expect("resource store poisoned")
            .entry(resource.to_string())
            .or_default()
            .push(doc);
    }

    /// Register a named context resolvable through `for_context`.
    pub fn add_context(&self, name: &str, provider: Arc<MemoryProvider>) {
        self.contexts
            .lock()
            .expect("context store poisoned")
            .insert(name.to_string(), provider);
    }

    /// Current documents of a resource, for assertions.
    pub fn dump(&self, resource: &str) -> Vec<Value> {
        self.resources
            .lock()
            .expect("resource store poisoned")
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    fn builtin_entries() -> Vec<ApiResourceEntry> {
        fn entry(
            group: &str,
            resource: &str,
            kind: &str,
            singular: &str,
            short_names: &[&str],
            namespaced: bool,
        ) -> ApiResourceEntry {
            ApiResourceEntry {
                group: group.to_string(),
                version: if group == "autoscaling" { "v2" } else { "v1" }.to_string(),
                resource: resource.to_string(),
                kind: kind.to_string(),
                singular: singular.to_string(),
                short_names: short_names.iter().map(|s| s.to_string()).collect(),
                namespaced,
            }
        }
        vec![
            entry("", "pods", "Pod", "pod", &["po"], true),
            entry("", "services", "Service", "service", &["svc"], true),
            entry("", "configmaps", "ConfigMap", "configmap", &["cm"], true),
            entry("", "secrets", "Secret", "secret", &[], true),
            entry("", "serviceaccounts", "ServiceAccount", "serviceaccount", &["sa"], true),
            entry("", "namespaces", "Namespace", "namespace", &["ns"], false),
            entry("", "nodes", "Node", "node", &["no"], false),
            entry(
                "",
                "persistentvolumeclaims",
                "PersistentVolumeClaim",
                "persistentvolumeclaim",
                &["pvc"],
                true,
            ),
            entry(
                "",
                "persistentvolumes",
                "PersistentVolume",
                "persistentvolume",
                &["pv"],
                false,
            ),
            entry("apps", "deployments", "Deployment", "deployment", &["deploy"], true),
            entry("apps", "replicasets", "ReplicaSet", "replicaset", &["rs"], true),
            entry("apps", "statefulsets", "StatefulSet", "statefulset", &["sts"], true),
            entry("apps", "daemonsets", "DaemonSet", "daemonset", &["ds"], true),
            entry("batch", "jobs", "Job", "job", &[], true),
            entry("batch", "cronjobs", "CronJob", "cronjob", &["cj"], true),
            entry(
                "networking.k8s.io",
                "ingresses",
                "Ingress",
                "ingress",
                &["ing"],
                true,
            ),
            entry(
                "networking.k8s.io",
                "networkpolicies",
                "NetworkPolicy",
                "networkpolicy",
                &["netpol"],
                true,
            ),
            entry(
                "autoscaling",
                "horizontalpodautoscalers",
                "HorizontalPodAutoscaler",
                "horizontalpodautoscaler",
                &["hpa"],
                true,
            ),
            entry(
                "discovery.k8s.io",
                "endpointslices",
                "EndpointSlice",
                "endpointslice",
                &[],
                true,
            ),
        ]
    }
}

fn doc_matches(
    doc: &Value,
    field_selector: Option<&str>,
    label_selector: Option<&str>,
    namespace: Option<&str>,
) -> bool {
    if let Some(ns) = namespace {
        let doc_ns = doc.pointer("/metadata/namespace").and_then(Value::as_str);
        if doc_ns.is_some_and(|d| d != ns) {
            return false;
        }
    }
    if let Some(fields) = field_selector {
        for part in fields.split(',') {
            let Some((key, expected)) = part.split_once('=') else {
                return false;
            };
            let pointer = format!("/{}", key.replace('.', "/"));
            let actual = doc.pointer(&pointer).map(crate::value::canonical_string);
            if actual.as_deref() != Some(expected) {
                return false;
            }
        }
    }
    if let Some(labels) = label_selector {
        let doc_labels = doc.pointer("/metadata/labels");
        for part in labels.split(',') {
            let Some((key, expected)) = part.split_once('=') else {
                return false;
            };
            let actual = doc_labels
                .and_then(|l| l.get(key))
                .map(crate::value::canonical_string);
            if actual.as_deref() != Some(expected) {
                return false;
            }
        }
    }
    true
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn api_resources(&self) -> Result<Vec<ApiResourceEntry>> {
        Ok(Self::builtin_entries())
    }

    async fn get_k8s_resources(
        &self,
        entry: &ApiResourceEntry,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Vec<Value>> {
        let store = self.resources.lock().expect("resource store poisoned");
        Ok(store
            .get(&entry.resource)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc_matches(doc, field_selector, label_selector, namespace))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        _namespace: Option<&str>,
        body: Value,
    ) -> Result<()> {
        self.insert(&entry.resource, body);
        Ok(())
    }

    async fn patch_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let mut store = self.resources.lock().expect("resource store poisoned");
        let docs = store.get_mut(&entry.resource).ok_or_else(|| {
            not_found(entry, name, namespace)
        })?;
        let doc = docs
            .iter_mut()
            .find(|doc| {
                doc.pointer("/metadata/name").and_then(Value::as_str) == Some(name)
                    && doc_matches(doc, None, None, namespace)
            })
            .ok_or_else(|| not_found(entry, name, namespace))?;
        apply_patch(doc, patch).map_err(|err| match err {
            PatchApplyError::Conflict { path } => ErrorKind::PatchConflict {
                kind: entry.kind.clone(),
                name: name.to_string(),
                details: format!("test failed at {path}"),
            }
            .into(),
            PatchApplyError::Invalid(details) => ErrorKind::PatchFailed {
                kind: entry.kind.clone(),
                name: name.to_string(),
                details,
            }
            .into(),
        })
    }

    async fn delete_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<()> {
        let mut store = self.resources.lock().expect("resource store poisoned");
        let docs = store
            .get_mut(&entry.resource)
            .ok_or_else(|| not_found(entry, name, namespace))?;
        let before = docs.len();
        docs.retain(|doc| {
            !(doc.pointer("/metadata/name").and_then(Value::as_str) == Some(name)
                && doc_matches(doc, None, None, namespace))
        });
        if docs.len() == before {
            return Err(not_found(entry, name, namespace));
        }
        Ok(())
    }

    async fn get_openapi_resource_specs(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut specs = HashMap::new();
        specs.insert(
            "deployments".to_string(),
            vec![
                "metadata.name".to_string(),
                "metadata.namespace".to_string(),
                "metadata.labels".to_string(),
                "spec.replicas".to_string(),
                "spec.selector.matchLabels".to_string(),
                "spec.template.spec.containers".to_string(),
            ],
        );
        specs.insert(
            "pods".to_string(),
            vec![
                "metadata.name".to_string(),
                "metadata.namespace".to_string(),
                "spec.containers".to_string(),
                "spec.nodeName".to_string(),
                "status.phase".to_string(),
            ],
        );
        Ok(specs)
    }

    fn for_context(&self, context: &str) -> Result<Arc<dyn Provider>> {
        let contexts = self.contexts.lock().expect("context store poisoned");
        contexts
            .get(context)
            .cloned()
            .map(|p| p as Arc<dyn Provider>)
            .ok_or_else(|| ErrorKind::Provider(format!("unknown context `{context}`")).into())
    }
}

fn not_found(
    entry: &ApiResourceEntry,
    name: &str,
    namespace: Option<&str>,
) -> crate::errors::SpindleError {
    ErrorKind::ResourceNotFound {
        kind: entry.kind.clone(),
        name: name.to_string(),
        namespace: namespace.unwrap_or("*").to_string(),
    }
    .into()
}
