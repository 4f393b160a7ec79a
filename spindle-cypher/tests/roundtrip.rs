use spindle_cypher::{
    format_expression, parse, Clause, Expression, Filter, NodePattern, Relationship, Span,
};

/// `parse(format(parse(q)))` must equal `parse(q)` modulo whitespace —
/// token positions shift with reformatting, so spans are zeroed before
/// comparing.
fn assert_roundtrip(query: &str) {
    let first = normalize(parse(query).unwrap());
    let formatted = format_expression(&first);
    let second = parse(&formatted)
        .unwrap_or_else(|err| panic!("formatted query failed to reparse: {formatted}: {err}"));
    assert_eq!(first, normalize(second), "round-trip mismatch for {formatted}");

    // The formatter is idempotent over its own output.
    let again = parse(&formatted).unwrap();
    assert_eq!(formatted, format_expression(&again));
}

fn normalize(mut expr: Expression) -> Expression {
    fn node(n: &mut NodePattern) {
        n.span = Span::default();
    }
    fn rel(r: &mut Relationship) {
        r.span = Span::default();
    }
    for clause in &mut expr.clauses {
        match clause {
            Clause::Match(m) => {
                m.span = Span::default();
                m.nodes.iter_mut().for_each(node);
                m.relationships.iter_mut().for_each(rel);
                for filter in &mut m.filters {
                    match filter {
                        Filter::Comparison(c) => c.span = Span::default(),
                        Filter::SubMatch(s) => {
                            s.span = Span::default();
                            s.nodes.iter_mut().for_each(node);
                            s.relationships.iter_mut().for_each(rel);
                        }
                    }
                }
            }
            Clause::Create(c) => {
                c.span = Span::default();
                c.nodes.iter_mut().for_each(node);
                c.relationships.iter_mut().for_each(rel);
            }
            Clause::Set(s) => s.span = Span::default(),
            Clause::Delete(d) => d.span = Span::default(),
            Clause::Return(r) => r.span = Span::default(),
        }
    }
    expr
}

#[test]
fn roundtrips_single_node() {
    assert_roundtrip("MATCH (d:Deployment) RETURN d");
}

#[test]
fn roundtrips_properties_and_filters() {
    assert_roundtrip(
        r#"MATCH (d:Deployment {name: "web"}) WHERE d.spec.replicas >= 2 AND d.metadata.namespace != "kube-system" RETURN d.metadata.name AS name"#,
    );
}

#[test]
fn roundtrips_relationship_chain() {
    assert_roundtrip(
        "MATCH (d:Deployment)->(rs:ReplicaSet)->(p:Pod) RETURN d.metadata.name, p.metadata.name",
    );
}

#[test]
fn roundtrips_typed_relationship() {
    assert_roundtrip("MATCH (d:Deployment)-[r:OWNS]->(rs:ReplicaSet) RETURN d");
}

#[test]
fn roundtrips_left_arrow() {
    assert_roundtrip("MATCH (p:Pod)<-(rs:ReplicaSet) RETURN p");
}

#[test]
fn roundtrips_mixed_pattern_groups() {
    assert_roundtrip("MATCH (c:ConfigMap), (d:Deployment)->(s:Service) RETURN c, d");
}

#[test]
fn roundtrips_node_reference() {
    assert_roundtrip(
        "MATCH (d:Deployment)->(s:Service), (d)->(c:ConfigMap) RETURN d, s, c",
    );
}

#[test]
fn roundtrips_sub_match() {
    assert_roundtrip("MATCH (d:Deployment) WHERE NOT (d)->(:ReplicaSet)->(:Pod) RETURN d");
}

#[test]
fn roundtrips_temporal_filter() {
    assert_roundtrip(
        r#"MATCH (p:Pod) WHERE p.metadata.annotations.test\.timestamp < datetime() - duration("PT1H") RETURN p.metadata.name"#,
    );
}

#[test]
fn roundtrips_escaped_dots() {
    assert_roundtrip(
        r#"MATCH (d:Deployment) WHERE d.metadata.annotations.meta\.helm\.sh/release-name = "web" RETURN d"#,
    );
}

#[test]
fn roundtrips_wildcards_and_indexes() {
    assert_roundtrip(
        r#"MATCH (d:Deployment) WHERE d.spec.template.spec.containers[*].image = "busybox:1.32" RETURN d.spec.template.spec.containers[0].name"#,
    );
}

#[test]
fn roundtrips_aggregates_order_paging() {
    assert_roundtrip(
        "MATCH (p:Pod) RETURN COUNT {p.metadata.name} AS total, SUM {p.spec.containers[*].resources.requests.cpu} AS cpu ORDER BY total DESC SKIP 2 LIMIT 5",
    );
}

#[test]
fn roundtrips_contexts() {
    assert_roundtrip("IN prod, staging MATCH (d:Deployment) RETURN d");
}

#[test]
fn roundtrips_set_delete() {
    assert_roundtrip(
        r#"MATCH (d:Deployment {name: "x"}) SET d.spec.replicas = 3, d.metadata.labels.environment = "prod" RETURN d"#,
    );
    assert_roundtrip(r#"MATCH (p:Pod {name: "doomed"}) DELETE p"#);
}

#[test]
fn roundtrips_create_json_body() {
    assert_roundtrip(
        r#"CREATE (c:ConfigMap {"metadata": {"name": "app-config", "namespace": "default"}, "data": {"key": "value"}})"#,
    );
}

#[test]
fn roundtrips_anonymous_nodes() {
    assert_roundtrip("MATCH (d:Deployment)->(:Service) RETURN d");
}
