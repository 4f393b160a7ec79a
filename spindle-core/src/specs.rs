use crate::prelude::*;
use crate::provider::Provider;

use std::collections::HashMap;
use tokio::sync::OnceCell;

/// Field-path catalog per resource name, backing autocomplete and field
/// validation. Loaded lazily from the provider's OpenAPI document and
/// cached for the catalog's lifetime.
#[derive(Debug, Default)]
pub struct ResourceSpecs {
    specs: OnceCell<HashMap<String, Vec<String>>>,
}

impl ResourceSpecs {
    pub fn new() -> Self {
        ResourceSpecs {
            specs: OnceCell::new(),
        }
    }

    pub async fn load(&self, provider: &dyn Provider) -> Result<&HashMap<String, Vec<String>>> {
        self.specs
            .get_or_try_init(|| async {
                let specs = provider.get_openapi_resource_specs().await?;
                Ok::<_, crate::errors::SpindleError>(specs)
            })
            .await
    }

    /// All known field paths for a resource, empty when unknown or not
    /// yet loaded.
    pub fn field_paths(&self, resource: &str) -> &[String] {
        self.specs
            .get()
            .and_then(|specs| specs.get(resource))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Field paths of `resource` starting with `prefix`, for completion.
    pub fn complete(&self, resource: &str, prefix: &str) -> Vec<&str> {
        self.field_paths(resource)
            .iter()
            .filter(|p| p.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    #[tokio::test]
    async fn loads_once_and_completes() {
        let provider = MemoryProvider::new();
        let specs = ResourceSpecs::new();
        specs.load(&provider).await.unwrap();

        let paths = specs.field_paths("deployments");
        assert!(paths.iter().any(|p| p == "spec.replicas"));

        let completions = specs.complete("deployments", "spec.");
        assert!(completions.contains(&"spec.replicas"));
        assert!(!completions.contains(&"metadata.name"));

        assert!(specs.field_paths("unknown").is_empty());
    }
}
