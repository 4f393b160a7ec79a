use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::provider::{ApiResourceEntry, Provider};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{
    Api, ApiResource as DynamicApiResource, DeleteParams, DynamicObject, ListParams, Patch,
    PatchParams, PostParams,
};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

/// Provider backed by a live API server: discovery for GVR resolution,
/// dynamic-object CRUD for everything else. The client connects lazily
/// so context-bound clones stay cheap.
pub struct KubeProvider {
    context: Option<String>,
    client: OnceCell<Client>,
    /// Discovery snapshot; invalidated and refreshed on resolution miss.
    entries: RwLock<Option<Vec<ApiResourceEntry>>>,
}

impl KubeProvider {
    pub fn new(context: Option<String>) -> Self {
        KubeProvider {
            context,
            client: OnceCell::new(),
            entries: RwLock::new(None),
        }
    }

    /// Wrap an existing client, e.g. an in-cluster one or a test stub.
    pub fn from_client(client: Client) -> Self {
        KubeProvider {
            context: None,
            client: OnceCell::new_with(Some(client)),
            entries: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let options = KubeConfigOptions {
                    context: self.context.clone(),
                    cluster: None,
                    user: None,
                };
                let config = match Config::from_kubeconfig(&options).await {
                    Ok(config) => {
                        info!(
                            context = ?self.context,
                            cluster_url = %config.cluster_url,
                            "loaded kubeconfig"
                        );
                        config
                    }
                    Err(err) => {
                        info!(
                            context = ?self.context,
                            "kubeconfig unavailable ({err}), falling back to in-cluster config"
                        );
                        Config::incluster().map_err(ErrorKind::from)?
                    }
                };
                Ok::<_, crate::errors::SpindleError>(
                    Client::try_from(config).map_err(ErrorKind::from)?,
                )
            })
            .await
    }

    async fn discover(&self) -> Result<Vec<ApiResourceEntry>> {
        let client = self.client().await?;
        let mut entries = Vec::new();

        let core = client.list_core_api_versions().await?;
        for version in core.versions {
            let list = client.list_core_api_resources(&version).await?;
            collect_entries(&mut entries, "", &version, &list);
        }

        let groups = client.list_api_groups().await?;
        for group in groups.groups {
            let Some(version) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
            else {
                continue;
            };
            let list = client
                .list_api_group_resources(&version.group_version)
                .await?;
            collect_entries(&mut entries, &group.name, &version.version, &list);
        }

        debug!(count = entries.len(), "discovered API resources");
        Ok(entries)
    }

    async fn cached_entries(&self) -> Result<Vec<ApiResourceEntry>> {
        if let Some(entries) = self.entries.read().await.as_ref() {
            return Ok(entries.clone());
        }
        let discovered = self.discover().await?;
        *self.entries.write().await = Some(discovered.clone());
        Ok(discovered)
    }

    async fn dynamic_api(
        &self,
        entry: &ApiResourceEntry,
        namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>> {
        let client = self.client().await?.clone();
        let resource = DynamicApiResource {
            group: entry.group.clone(),
            version: entry.version.clone(),
            api_version: if entry.group.is_empty() {
                entry.version.clone()
            } else {
                format!("{}/{}", entry.group, entry.version)
            },
            kind: entry.kind.clone(),
            plural: entry.resource.clone(),
        };
        Ok(match namespace {
            Some(ns) if entry.namespaced => Api::namespaced_with(client, ns, &resource),
            _ => Api::all_with(client, &resource),
        })
    }
}

fn collect_entries(
    entries: &mut Vec<ApiResourceEntry>,
    group: &str,
    version: &str,
    list: &APIResourceList,
) {
    for resource in &list.resources {
        // Skip subresources like pods/log.
        if resource.name.contains('/') {
            continue;
        }
        let singular = match &resource.singular_name {
            s if s.is_empty() => resource.kind.to_ascii_lowercase(),
            s => s.clone(),
        };
        entries.push(ApiResourceEntry {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.name.clone(),
            kind: resource.kind.clone(),
            singular,
            short_names: resource.short_names.clone().unwrap_or_default(),
            namespaced: resource.namespaced,
        });
    }
}

fn map_api_error(err: kube::Error, entry: &ApiResourceEntry, name: &str, namespace: Option<&str>) -> crate::errors::SpindleError {
    if let kube::Error::Api(ref response) = err {
        match response.code {
            404 => {
                return ErrorKind::ResourceNotFound {
                    kind: entry.kind.clone(),
                    name: name.to_string(),
                    namespace: namespace.unwrap_or("*").to_string(),
                }
                .into()
            }
            409 => {
                return ErrorKind::PatchConflict {
                    kind: entry.kind.clone(),
                    name: name.to_string(),
                    details: response.message.clone(),
                }
                .into()
            }
            _ => {}
        }
    }
    ErrorKind::KubeClient(err).into()
}

#[async_trait]
impl Provider for KubeProvider {
    async fn api_resources(&self) -> Result<Vec<ApiResourceEntry>> {
        self.cached_entries().await
    }

    async fn get_k8s_resources(
        &self,
        entry: &ApiResourceEntry,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Vec<Value>> {
        let api = self.dynamic_api(entry, namespace).await?;
        let mut docs = Vec::new();
        let mut continue_token: Option<String> = None;
        loop {
            let mut params = ListParams::default();
            if let Some(fields) = field_selector {
                params = params.fields(fields);
            }
            if let Some(labels) = label_selector {
                params = params.labels(labels);
            }
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }
            let page = api.list(&params).await?;
            continue_token = page.metadata.continue_.clone();
            for object in page {
                docs.push(serde_json::to_value(object)?);
            }
            if continue_token.is_none() {
                break;
            }
        }
        Ok(docs)
    }

    async fn create_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        namespace: Option<&str>,
        body: Value,
    ) -> Result<()> {
        let api = self.dynamic_api(entry, namespace).await?;
        let object: DynamicObject = serde_json::from_value(body)?;
        api.create(&PostParams::default(), &object)
            .await
            .map_err(|err| map_api_error(err, entry, &object.metadata.name.clone().unwrap_or_default(), namespace))?;
        Ok(())
    }

    async fn patch_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let api = self.dynamic_api(entry, namespace).await?;
        let ops: json_patch::Patch = serde_json::from_value(patch.clone())?;
        api.patch(name, &PatchParams::default(), &Patch::Json::<()>(ops))
            .await
            .map_err(|err| map_api_error(err, entry, name, namespace))?;
        Ok(())
    }

    async fn delete_k8s_resource(
        &self,
        entry: &ApiResourceEntry,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<()> {
        let api = self.dynamic_api(entry, namespace).await?;
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|err| map_api_error(err, entry, name, namespace))?;
        Ok(())
    }

    async fn find_gvr(&self, kind: &str) -> Result<ApiResourceEntry> {
        let entries = self.cached_entries().await?;
        match crate::resolver::resolve_kind(&entries, kind) {
            Ok(entry) => Ok(entry),
            Err(err) if matches!(err.kind(), ErrorKind::InvalidKind(_)) => {
                // The kind may have appeared since the snapshot (a fresh
                // CRD); refresh once and retry.
                let refreshed = self.discover().await?;
                *self.entries.write().await = Some(refreshed.clone());
                crate::resolver::resolve_kind(&refreshed, kind)
            }
            Err(err) => Err(err),
        }
    }

    async fn get_openapi_resource_specs(&self) -> Result<HashMap<String, Vec<String>>> {
        let client = self.client().await?;
        let request = http::Request::get("/openapi/v2")
            .body(Vec::new())
            .map_err(|err| ErrorKind::Provider(err.to_string()))?;
        let document: Value = client.request(request).await?;
        let entries = self.cached_entries().await?;
        Ok(specs_from_openapi(&document, &entries))
    }

    fn for_context(&self, context: &str) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(KubeProvider::new(Some(context.to_string()))))
    }
}

/// Flatten the swagger `definitions` into dotted field paths per plural
/// resource name, following `$ref`s to a bounded depth.
fn specs_from_openapi(
    document: &Value,
    entries: &[ApiResourceEntry],
) -> HashMap<String, Vec<String>> {
    const MAX_DEPTH: usize = 4;

    let mut kind_to_resource: HashMap<&str, &str> = HashMap::new();
    for entry in entries {
        kind_to_resource.insert(&entry.kind, &entry.resource);
    }

    let Some(definitions) = document.get("definitions").and_then(Value::as_object) else {
        return HashMap::new();
    };

    let mut specs: HashMap<String, Vec<String>> = HashMap::new();
    for (name, schema) in definitions {
        let Some(kind) = name.rsplit('.').next() else {
            continue;
        };
        let Some(resource) = kind_to_resource.get(kind) else {
            continue;
        };
        let mut paths = Vec::new();
        collect_field_paths(schema, definitions, String::new(), MAX_DEPTH, &mut paths);
        paths.sort_unstable();
        paths.dedup();
        specs.entry(resource.to_string()).or_insert(paths);
    }
    specs
}

fn collect_field_paths(
    schema: &Value,
    definitions: &serde_json::Map<String, Value>,
    prefix: String,
    depth: usize,
    out: &mut Vec<String>,
) {
    if depth == 0 {
        return;
    }
    let schema = match schema.get("$ref").and_then(Value::as_str) {
        Some(reference) => {
            let key = reference.trim_start_matches("#/definitions/");
            match definitions.get(key) {
                Some(target) => target,
                None => return,
            }
        }
        None => schema,
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (field, child) in properties {
        let path = if prefix.is_empty() {
            field.clone()
        } else {
            format!("{prefix}.{field}")
        };
        out.push(path.clone());
        collect_field_paths(child, definitions, path, depth - 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, Response, StatusCode};
    use kube::client::Body;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::{Arc as StdArc, Mutex};
    use tower::service_fn;

    fn json_response(body: Value) -> Response<Body> {
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string().into_bytes()))
            .expect("response")
    }

    fn test_client(
        responses: StdArc<Mutex<Vec<Response<Body>>>>,
        paths: StdArc<Mutex<Vec<String>>>,
    ) -> Client {
        let service = service_fn(move |req: Request<Body>| {
            let responses = responses.clone();
            let paths = paths.clone();
            async move {
                paths
                    .lock()
                    .expect("lock paths")
                    .push(req.uri().to_string());
                let response = responses.lock().expect("lock responses").remove(0);
                Ok::<_, Infallible>(response)
            }
        });
        Client::new(service, "default")
    }

    fn core_discovery() -> Vec<Response<Body>> {
        vec![
            json_response(json!({"kind": "APIVersions", "versions": ["v1"],
                "serverAddressByClientCIDRs": []})),
            json_response(json!({
                "kind": "APIResourceList",
                "groupVersion": "v1",
                "resources": [
                    {"name": "pods", "singularName": "pod", "namespaced": true,
                     "kind": "Pod", "verbs": ["list"], "shortNames": ["po"]},
                    {"name": "pods/log", "singularName": "", "namespaced": true,
                     "kind": "Pod", "verbs": ["get"]},
                ],
            })),
            json_response(json!({"kind": "APIGroupList", "groups": [{
                "name": "apps",
                "versions": [{"groupVersion": "apps/v1", "version": "v1"}],
                "preferredVersion": {"groupVersion": "apps/v1", "version": "v1"},
            }]})),
            json_response(json!({
                "kind": "APIResourceList",
                "groupVersion": "apps/v1",
                "resources": [
                    {"name": "deployments", "singularName": "deployment", "namespaced": true,
                     "kind": "Deployment", "verbs": ["list"], "shortNames": ["deploy"]},
                ],
            })),
        ]
    }

    #[tokio::test]
    async fn discovery_builds_entries_and_skips_subresources() {
        let responses = StdArc::new(Mutex::new(core_discovery()));
        let paths = StdArc::new(Mutex::new(Vec::new()));
        let provider = KubeProvider::from_client(test_client(responses, paths));

        let entries = provider.api_resources().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.resource == "pods" && e.group.is_empty()));
        let deployment = entries.iter().find(|e| e.resource == "deployments").unwrap();
        assert_eq!(deployment.group, "apps");
        assert_eq!(deployment.short_names, vec!["deploy"]);

        let resolved = provider.find_gvr("deploy").await.unwrap();
        assert_eq!(resolved.kind, "Deployment");
    }

    #[tokio::test]
    async fn list_passes_selectors_and_pages() {
        let mut responses = core_discovery();
        responses.push(json_response(json!({
            "apiVersion": "v1",
            "kind": "PodList",
            "metadata": {},
            "items": [
                {"metadata": {"name": "a", "namespace": "default"}},
            ],
        })));
        let responses = StdArc::new(Mutex::new(responses));
        let paths = StdArc::new(Mutex::new(Vec::new()));
        let provider = KubeProvider::from_client(test_client(responses, paths.clone()));

        let pods = provider.find_gvr("Pod").await.unwrap();
        let docs = provider
            .get_k8s_resources(&pods, None, Some("app=web"), Some("default"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].pointer("/metadata/name"), Some(&json!("a")));

        let seen = paths.lock().expect("lock paths");
        let list_path = seen.last().expect("a list request was made");
        assert!(list_path.contains("/api/v1/namespaces/default/pods"));
        assert!(list_path.contains("labelSelector=app%3Dweb"));
    }

    #[test]
    fn openapi_definitions_flatten_to_field_paths() {
        let document = json!({"definitions": {
            "io.k8s.api.apps.v1.Deployment": {
                "properties": {
                    "metadata": {"properties": {"name": {"type": "string"}}},
                    "spec": {"$ref": "#/definitions/io.k8s.api.apps.v1.DeploymentSpec"},
                },
            },
            "io.k8s.api.apps.v1.DeploymentSpec": {
                "properties": {"replicas": {"type": "integer"}},
            },
        }});
        let entries = vec![ApiResourceEntry {
            group: "apps".to_string(),
            version: "v1".to_string(),
            resource: "deployments".to_string(),
            kind: "Deployment".to_string(),
            singular: "deployment".to_string(),
            short_names: vec![],
            namespaced: true,
        }];
        let specs = specs_from_openapi(&document, &entries);
        let paths = &specs["deployments"];
        assert!(paths.contains(&"metadata.name".to_string()));
        assert!(paths.contains(&"spec.replicas".to_string()));
    }
}
