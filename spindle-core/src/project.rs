use crate::path;
use crate::value::compare_order;

use serde_json::{json, Map, Value};
use spindle_cypher::{Aggregate, PathSegment, ReturnClause, ReturnItem, SortDirection};
use std::collections::HashMap;

/// The per-relationship join product: each tuple maps a variable to an
/// index into that variable's document list. Single-node matches have no
/// tuple stream.
pub type Tuples = Vec<HashMap<String, usize>>;

/// Apply ORDER BY, then SKIP, then LIMIT. With a tuple stream the tuples
/// are ordered and paged and the per-variable lists rebuilt from the
/// surviving tuples; single-node queries order the resource lists
/// directly.
pub fn order_and_page(
    ret: &ReturnClause,
    result_map: &mut HashMap<String, Vec<Value>>,
    tuples: Option<Tuples>,
) {
    match tuples {
        Some(mut tuples) => {
            for order in ret.order_by.iter().rev() {
                let Some((var, segments)) = resolve_order_path(&order.alias, &ret.items, result_map)
                else {
                    continue;
                };
                let docs = result_map.get(&var).cloned().unwrap_or_default();
                tuples.sort_by(|a, b| {
                    let left = a.get(&var).and_then(|i| docs.get(*i));
                    let right = b.get(&var).and_then(|i| docs.get(*i));
                    let ordering = match (
                        left.and_then(|d| path::project(d, &segments)),
                        right.and_then(|d| path::project(d, &segments)),
                    ) {
                        (Some(x), Some(y)) => compare_order(&x, &y),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    };
                    match order.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                });
            }
            page(&mut tuples, ret.skip, ret.limit);

            // Rebuild each variable's list in tuple order, first
            // occurrence wins.
            let vars: Vec<String> = tuples
                .iter()
                .flat_map(|t| t.keys().cloned())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            for var in vars {
                let docs = result_map.get(&var).cloned().unwrap_or_default();
                let mut seen = Vec::new();
                let mut rebuilt = Vec::new();
                for tuple in &tuples {
                    if let Some(idx) = tuple.get(&var) {
                        if !seen.contains(idx) {
                            seen.push(*idx);
                            if let Some(doc) = docs.get(*idx) {
                                rebuilt.push(doc.clone());
                            }
                        }
                    }
                }
                result_map.insert(var, rebuilt);
            }
        }
        None => {
            for order in &ret.order_by {
                let Some((var, segments)) = resolve_order_path(&order.alias, &ret.items, result_map)
                else {
                    continue;
                };
                if let Some(docs) = result_map.get_mut(&var) {
                    docs.sort_by(|a, b| {
                        let ordering = match (
                            path::project(a, &segments),
                            path::project(b, &segments),
                        ) {
                            (Some(x), Some(y)) => compare_order(&x, &y),
                            (Some(_), None) => std::cmp::Ordering::Less,
                            (None, Some(_)) => std::cmp::Ordering::Greater,
                            (None, None) => std::cmp::Ordering::Equal,
                        };
                        match order.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    });
                }
            }
            if ret.skip.is_some() || ret.limit.is_some() {
                let vars: Vec<String> = ret.items.iter().map(|i| i.path.var.clone()).collect();
                for var in vars {
                    if let Some(docs) = result_map.get_mut(&var) {
                        page(docs, ret.skip, ret.limit);
                    }
                }
            }
        }
    }
}

fn page<T>(items: &mut Vec<T>, skip: Option<u64>, limit: Option<u64>) {
    if let Some(skip) = skip {
        let skip = (skip as usize).min(items.len());
        items.drain(..skip);
    }
    if let Some(limit) = limit {
        items.truncate(limit as usize);
    }
}

/// Resolve an ORDER BY alias to `(variable, path)`: by declared alias
/// first, then by treating the alias as a literal dotted path.
fn resolve_order_path(
    alias: &str,
    items: &[ReturnItem],
    result_map: &HashMap<String, Vec<Value>>,
) -> Option<(String, Vec<PathSegment>)> {
    for item in items {
        if item.alias.as_deref() == Some(alias) || item.path.raw == alias {
            return Some((item.path.var.clone(), item.path.segments.clone()));
        }
    }
    let mut segments = path::parse_path(alias);
    if segments.is_empty() {
        return None;
    }
    let PathSegment::Key(var) = segments.remove(0) else {
        return None;
    };
    result_map.contains_key(&var).then_some((var, segments))
}

/// Walk RETURN items against the (already ordered) result map. Every
/// returned variable is present in the output with a list, possibly
/// empty; aggregates land under the `aggregate` key.
pub fn project(ret: &ReturnClause, result_map: &HashMap<String, Vec<Value>>) -> Map<String, Value> {
    let mut data = Map::new();
    let mut aggregates = Map::new();

    let mut vars: Vec<String> = Vec::new();
    for item in &ret.items {
        if !vars.contains(&item.path.var) {
            vars.push(item.path.var.clone());
        }
    }

    for var in &vars {
        let docs = result_map.get(var).cloned().unwrap_or_default();
        let plain_items: Vec<&ReturnItem> = ret
            .items
            .iter()
            .filter(|i| &i.path.var == var && i.aggregate.is_none())
            .collect();

        let mut entries = Vec::new();
        if !plain_items.is_empty() {
            for doc in &docs {
                let mut entry = Map::new();
                for item in &plain_items {
                    project_item(item, doc, &mut entry);
                }
                entries.push(Value::Object(entry));
            }
        }
        data.insert(var.clone(), Value::Array(entries));
    }

    for item in &ret.items {
        let Some(aggregate) = item.aggregate else {
            continue;
        };
        let docs = result_map.get(&item.path.var).cloned().unwrap_or_default();
        let atoms: Vec<Value> = docs
            .iter()
            .flat_map(|doc| {
                path::resolve(doc, &item.path.segments)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        let (key, value) = match aggregate {
            Aggregate::Count => (
                item.alias.clone().unwrap_or_else(|| "count".to_string()),
                json!(atoms.len()),
            ),
            Aggregate::Sum => (
                item.alias.clone().unwrap_or_else(|| "sum".to_string()),
                sum_atoms(&atoms),
            ),
        };
        aggregates.insert(key, value);
    }

    if !aggregates.is_empty() {
        data.insert("aggregate".to_string(), Value::Object(aggregates));
    }
    data
}

fn project_item(item: &ReturnItem, doc: &Value, entry: &mut Map<String, Value>) {
    if item.path.is_bare() {
        // The whole resource, under `$` unless aliased.
        let key = item.alias.clone().unwrap_or_else(|| "$".to_string());
        entry.insert(key, doc.clone());
        return;
    }
    let Some(value) = path::project(doc, &item.path.segments) else {
        return;
    };
    match &item.alias {
        Some(alias) => {
            entry.insert(alias.clone(), value);
        }
        None => path::insert_nested(entry, &item.path.segments, value),
    }
}

/// Pure numerics sum numerically; quantity strings (or any non-numeric
/// atom) preserve the value list so units survive.
fn sum_atoms(atoms: &[Value]) -> Value {
    let all_numeric = atoms.iter().all(|v| v.is_number());
    if all_numeric {
        if atoms.iter().all(|v| v.as_i64().is_some()) {
            let total: i64 = atoms.iter().filter_map(Value::as_i64).sum();
            return json!(total);
        }
        let total: f64 = atoms.iter().filter_map(Value::as_f64).sum();
        return json!(total);
    }
    // Quantity strings and other non-numerics keep their units.
    Value::Array(atoms.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_cypher::Clause;

    fn return_clause(query: &str) -> ReturnClause {
        let expr = spindle_cypher::parse(query).expect("query parses");
        let Clause::Return(r) = expr.clauses.last().unwrap() else {
            panic!("expected RETURN");
        };
        r.clone()
    }

    fn web_deployment() -> Value {
        json!({
            "metadata": {"name": "dep"},
            "spec": {"template": {"spec": {"containers": [
                {"name": "nginx", "image": "nginx:1.19"},
                {"name": "sidecar", "image": "busybox:1.32"},
            ]}}},
        })
    }

    #[test]
    fn bare_variable_returns_resource_under_dollar() {
        let ret = return_clause("MATCH (d:Deployment) RETURN d");
        let mut map = HashMap::new();
        map.insert("d".to_string(), vec![web_deployment()]);
        let data = project(&ret, &map);
        let entries = data["d"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["$"], web_deployment());
    }

    #[test]
    fn aliases_and_wildcards_flatten() {
        let ret = return_clause(
            "MATCH (d:Deployment) RETURN d.metadata.name AS name, d.spec.template.spec.containers[*].name AS containerNames",
        );
        let mut map = HashMap::new();
        map.insert("d".to_string(), vec![web_deployment()]);
        let data = project(&ret, &map);
        assert_eq!(
            data["d"],
            json!([{"name": "dep", "containerNames": ["nginx", "sidecar"]}])
        );
    }

    #[test]
    fn unaliased_paths_nest() {
        let ret = return_clause("MATCH (d:Deployment) RETURN d.metadata.name");
        let mut map = HashMap::new();
        map.insert("d".to_string(), vec![web_deployment()]);
        let data = project(&ret, &map);
        assert_eq!(data["d"], json!([{"metadata": {"name": "dep"}}]));
    }

    #[test]
    fn returned_variable_is_always_present() {
        let ret = return_clause("MATCH (d:Deployment) RETURN d");
        let data = project(&ret, &HashMap::new());
        assert_eq!(data["d"], json!([]));
    }

    #[test]
    fn missing_path_skips_entry_key() {
        let ret = return_clause("MATCH (d:Deployment) RETURN d.status.phase AS phase");
        let mut map = HashMap::new();
        map.insert("d".to_string(), vec![web_deployment()]);
        let data = project(&ret, &map);
        assert_eq!(data["d"], json!([{}]));
    }

    #[test]
    fn count_counts_expanded_atoms() {
        let ret = return_clause(
            "MATCH (d:Deployment) RETURN COUNT {d.spec.template.spec.containers[*].name} AS total",
        );
        let mut map = HashMap::new();
        map.insert("d".to_string(), vec![web_deployment(), web_deployment()]);
        let data = project(&ret, &map);
        assert_eq!(data["aggregate"]["total"], json!(4));
    }

    #[test]
    fn sum_of_pure_numbers() {
        let ret = return_clause("MATCH (d:Deployment) RETURN SUM {d.spec.replicas} AS replicas");
        let mut map = HashMap::new();
        map.insert(
            "d".to_string(),
            vec![json!({"spec": {"replicas": 2}}), json!({"spec": {"replicas": 3}})],
        );
        let data = project(&ret, &map);
        assert_eq!(data["aggregate"]["replicas"], json!(5));
    }

    #[test]
    fn sum_of_quantities_preserves_units() {
        let ret = return_clause(
            "MATCH (p:Pod) RETURN SUM {p.spec.containers[*].resources.requests.memory} AS mem",
        );
        let mut map = HashMap::new();
        map.insert(
            "p".to_string(),
            vec![
                json!({"spec": {"containers": [{"resources": {"requests": {"memory": "128Mi"}}}]}}),
                json!({"spec": {"containers": [{"resources": {"requests": {"memory": "256Mi"}}}]}}),
            ],
        );
        let data = project(&ret, &map);
        assert_eq!(data["aggregate"]["mem"], json!(["128Mi", "256Mi"]));
    }

    #[test]
    fn orders_pages_single_list() {
        let ret = return_clause(
            "MATCH (p:Pod) RETURN p.metadata.name AS name ORDER BY name DESC SKIP 1 LIMIT 2",
        );
        let mut map = HashMap::new();
        map.insert(
            "p".to_string(),
            vec![
                json!({"metadata": {"name": "a"}}),
                json!({"metadata": {"name": "c"}}),
                json!({"metadata": {"name": "b"}}),
                json!({"metadata": {"name": "d"}}),
            ],
        );
        order_and_page(&ret, &mut map, None);
        let data = project(&ret, &map);
        assert_eq!(data["p"], json!([{"name": "c"}, {"name": "b"}]));
    }

    #[test]
    fn orders_by_dotted_path_without_alias() {
        let ret = return_clause("MATCH (p:Pod) RETURN p ORDER BY p.metadata.name");
        let mut map = HashMap::new();
        map.insert(
            "p".to_string(),
            vec![
                json!({"metadata": {"name": "b"}}),
                json!({"metadata": {"name": "a"}}),
            ],
        );
        order_and_page(&ret, &mut map, None);
        let data = project(&ret, &map);
        let names: Vec<&str> = data["p"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["$"]["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn orders_tuple_stream_and_rebuilds_lists() {
        let ret = return_clause(
            "MATCH (d:Deployment)->(p:Pod) RETURN d.metadata.name AS dn, p.metadata.name AS pn ORDER BY pn DESC LIMIT 2",
        );
        let mut map = HashMap::new();
        map.insert(
            "d".to_string(),
            vec![json!({"metadata": {"name": "d1"}}), json!({"metadata": {"name": "d2"}})],
        );
        map.insert(
            "p".to_string(),
            vec![
                json!({"metadata": {"name": "p1"}}),
                json!({"metadata": {"name": "p2"}}),
                json!({"metadata": {"name": "p3"}}),
            ],
        );
        let tuples: Tuples = vec![
            HashMap::from([("d".to_string(), 0), ("p".to_string(), 0)]),
            HashMap::from([("d".to_string(), 0), ("p".to_string(), 1)]),
            HashMap::from([("d".to_string(), 1), ("p".to_string(), 2)]),
        ];
        order_and_page(&ret, &mut map, Some(tuples));
        let data = project(&ret, &map);
        assert_eq!(data["p"], json!([{"pn": "p3"}, {"pn": "p2"}]));
        assert_eq!(data["d"], json!([{"dn": "d2"}, {"dn": "d1"}]));
    }
}
