use spindle_cypher::{parse, Clause, Direction, ParseError};

#[test]
fn parses_simple_match_return() {
    let expr = parse("MATCH (d:Deployment) RETURN d").unwrap();
    assert_eq!(expr.clauses.len(), 2);
}

#[test]
fn parses_chained_relationships() {
    let expr = parse("MATCH (d:Deployment)->(rs:ReplicaSet)->(p:Pod) RETURN d.metadata.name, p.metadata.name").unwrap();
    let Clause::Match(m) = &expr.clauses[0] else {
        panic!("expected MATCH");
    };
    assert_eq!(m.nodes.len(), 3);
    assert_eq!(m.relationships.len(), 2);
    assert_eq!(m.relationships[0].direction, Direction::Right);
}

#[test]
fn parses_left_and_undirected_arrows() {
    let expr = parse("MATCH (p:Pod)<-(rs:ReplicaSet), (s:Service)--(d:Deployment) RETURN p").unwrap();
    let Clause::Match(m) = &expr.clauses[0] else {
        panic!("expected MATCH");
    };
    assert_eq!(m.relationships[0].direction, Direction::Left);
    assert_eq!(m.relationships[1].direction, Direction::None);
}

#[test]
fn parses_node_properties() {
    let expr = parse(r#"MATCH (d:Deployment {name: "web", app: "store"}) RETURN d"#).unwrap();
    let Clause::Match(m) = &expr.clauses[0] else {
        panic!("expected MATCH");
    };
    let props = m.nodes[0].properties.as_ref().unwrap();
    assert_eq!(props.get("name").unwrap(), "web");
    assert_eq!(props.get("app").unwrap(), "store");
}

#[test]
fn parses_quoted_property_keys() {
    let expr =
        parse(r#"MATCH (d:Deployment {"app.kubernetes.io/name": "web"}) RETURN d"#).unwrap();
    let Clause::Match(m) = &expr.clauses[0] else {
        panic!("expected MATCH");
    };
    let props = m.nodes[0].properties.as_ref().unwrap();
    assert!(props.contains_key("app.kubernetes.io/name"));
}

#[test]
fn parses_fully_qualified_kind() {
    let expr = parse("MATCH (d:deployments.apps) RETURN d").unwrap();
    let Clause::Match(m) = &expr.clauses[0] else {
        panic!("expected MATCH");
    };
    assert_eq!(m.nodes[0].kind, "deployments.apps");
}

#[test]
fn parses_match_set_return() {
    let expr = parse(
        r#"MATCH (d:Deployment {name: "x"}) SET d.spec.replicas = 3 RETURN d"#,
    )
    .unwrap();
    assert!(matches!(expr.clauses[1], Clause::Set(_)));
    assert!(matches!(expr.clauses[2], Clause::Return(_)));
}

#[test]
fn parses_match_delete() {
    let expr = parse(r#"MATCH (p:Pod {name: "doomed"}) DELETE p"#).unwrap();
    let Clause::Delete(d) = &expr.clauses[1] else {
        panic!("expected DELETE");
    };
    assert_eq!(d.node_ids, vec!["p"]);
}

#[test]
fn parses_relationship_create() {
    let expr = parse(r#"MATCH (d:Deployment {name: "web"}) CREATE (d)->(s:Service) RETURN s"#)
        .unwrap();
    let Clause::Create(c) = &expr.clauses[1] else {
        panic!("expected CREATE");
    };
    assert_eq!(c.relationships.len(), 1);
    assert_eq!(c.nodes[0].name, "d");
    assert!(c.nodes[0].is_kindless());
    assert_eq!(c.nodes[1].kind, "Service");
}

#[test]
fn keywords_ignore_case() {
    let a = parse("match (d:Deployment) where d.spec.replicas > 1 return d").unwrap();
    let b = parse("MATCH (d:Deployment) WHERE d.spec.replicas > 1 RETURN d").unwrap();
    assert_eq!(a, b);
}

#[test]
fn rejects_illegal_sigil() {
    let err = parse("MATCH (d:Deployment) WHERE d.spec.replicas ^ 1 RETURN d").unwrap_err();
    assert!(matches!(
        err,
        ParseError::Syntax { .. } | ParseError::Unexpected { .. }
    ));
}

#[test]
fn rejects_unclosed_node() {
    assert!(parse("MATCH (d:Deployment RETURN d").is_err());
}

#[test]
fn errors_carry_position() {
    let err = parse("MATCH (d:Deployment)\nWHERE x.name = 1 RETURN d").unwrap_err();
    let ParseError::UnknownVariable { span, name } = err else {
        panic!("expected unknown variable");
    };
    assert_eq!(name, "x");
    assert_eq!(span.line, 2);
}

#[test]
fn blank_detection() {
    assert!(spindle_cypher::is_blank("// nothing here\n  // more\n"));
    assert!(!spindle_cypher::is_blank("// c\nMATCH (d:Deployment) RETURN d"));
}
