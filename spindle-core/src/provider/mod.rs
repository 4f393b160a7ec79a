use crate::prelude::*;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod kube;
pub mod memory;

pub use kube::KubeProvider;
pub use memory::MemoryProvider;

/// Group/Version/Resource triple identifying an API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// One discovered API resource, the unit the kind resolver works over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResourceEntry {
    pub group: String,
    pub version: String,
    /// Plural resource name, lowercase (`deployments`).
    pub resource: String,
    /// CamelCase kind (`Deployment`).
    pub kind: String,
    pub singular: String,
    pub short_names: Vec<String>,
    pub namespaced: bool,
}

impl ApiResourceEntry {
    pub fn gvr(&self) -> Gvr {
        Gvr {
            group: self.group.clone(),
            version: self.version.clone(),
            resource: self.resource.clone(),
        }
    }

    /// `resource.group`, or the bare resource for the core group.
    pub fn fully_qualified(&self) -> String {
        if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        }
    }
}

/// The single boundary the engine depends on. Resources are nested JSON
/// documents in the unstructured Kubernetes representation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Discovery snapshot backing kind resolution.
    async fn api_resources(&self) -> Result<Vec<ApiResourceEntry>>;

    async fn get_k8s_resources(
        &self,
        entry: &ApiResourceEntry,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Vec<Value>>;

    async fn create_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        namespace: Option<&str>,
        body: Value,
    ) -> Result<()>;

    /// Apply an RFC-6902 JSON Patch document.
    async fn patch_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()>;

    async fn delete_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<()>;

    /// Resolve a user kind identifier to its canonical API resource.
    async fn find_gvr(&self, kind: &str) -> Result<ApiResourceEntry> {
        let entries = self.api_resources().await?;
        crate::resolver::resolve_kind(&entries, kind)
    }

    /// Field-path catalog per resource name, for autocomplete.
    async fn get_openapi_resource_specs(&self) -> Result<HashMap<String, Vec<String>>>;

    /// A provider bound to another kubeconfig context.
    fn for_context(&self, context: &str) -> Result<Arc<dyn Provider>>;
}
