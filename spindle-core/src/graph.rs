use serde::Serialize;
use serde_json::Value;

/// Node/edge graph accumulated during match execution, emitted alongside
/// the result data for visual consumers. Never consulted by evaluation.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: String,
}

impl Graph {
    /// Add a node for a resource document, deduplicated by its
    /// namespace-qualified `kind/name` id. Returns the node id.
    pub fn add_resource(&mut self, kind: &str, doc: &Value) -> String {
        let name = doc
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let namespace = doc
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_string);
        let id = match &namespace {
            Some(ns) => format!("{ns}/{kind}/{name}"),
            None => format!("{kind}/{name}"),
        };
        if !self.nodes.iter().any(|n| n.id == id) {
            self.nodes.push(GraphNode {
                id: id.clone(),
                kind: kind.to_string(),
                name,
                namespace,
            });
        }
        id
    }

    pub fn add_edge(&mut self, from: &str, to: &str, edge_type: &str) {
        if !self
            .edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.edge_type == edge_type)
        {
            self.edges.push(GraphEdge {
                from: from.to_string(),
                to: to.to_string(),
                edge_type: edge_type.to_string(),
            });
        }
    }

    pub fn merge(&mut self, other: Graph) {
        for node in other.nodes {
            if !self.nodes.iter().any(|n| n.id == node.id) {
                self.nodes.push(node);
            }
        }
        for edge in other.edges {
            self.add_edge(&edge.from, &edge.to, &edge.edge_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nodes_deduplicate_by_qualified_id() {
        let mut graph = Graph::default();
        let doc = json!({"metadata": {"name": "web", "namespace": "shop"}});
        let a = graph.add_resource("Deployment", &doc);
        let b = graph.add_resource("Deployment", &doc);
        assert_eq!(a, b);
        assert_eq!(a, "shop/Deployment/web");
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn same_name_other_namespace_is_a_new_node() {
        let mut graph = Graph::default();
        graph.add_resource("Pod", &json!({"metadata": {"name": "p", "namespace": "a"}}));
        graph.add_resource("Pod", &json!({"metadata": {"name": "p", "namespace": "b"}}));
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn cluster_scoped_id_has_no_namespace() {
        let mut graph = Graph::default();
        let id = graph.add_resource("Node", &json!({"metadata": {"name": "worker-1"}}));
        assert_eq!(id, "Node/worker-1");
    }

    #[test]
    fn edges_deduplicate() {
        let mut graph = Graph::default();
        graph.add_edge("a", "b", "OWNS");
        graph.add_edge("a", "b", "OWNS");
        graph.add_edge("a", "b", "EXPOSES");
        assert_eq!(graph.edges.len(), 2);
    }
}
