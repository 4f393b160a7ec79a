use crate::ast::*;
use serde_json::Value;

/// Render an [`Expression`] back to canonical query text. Parsing the
/// output yields an AST equal to the input (whitespace and keyword case
/// are normalized).
pub fn format_expression(expr: &Expression) -> String {
    let mut out = String::new();
    if !expr.contexts.is_empty() {
        out.push_str("IN ");
        out.push_str(&expr.contexts.join(", "));
        out.push(' ');
    }
    let clauses: Vec<String> = expr.clauses.iter().map(format_clause).collect();
    out.push_str(&clauses.join(" "));
    out
}

fn format_clause(clause: &Clause) -> String {
    match clause {
        Clause::Match(m) => {
            let mut s = format!("MATCH {}", format_pattern(&m.nodes, &m.relationships));
            if !m.filters.is_empty() {
                let terms: Vec<String> = m.filters.iter().map(format_filter).collect();
                s.push_str(" WHERE ");
                s.push_str(&terms.join(" AND "));
            }
            s
        }
        Clause::Create(c) => format!("CREATE {}", format_pattern(&c.nodes, &c.relationships)),
        Clause::Set(s) => {
            let pairs: Vec<String> = s
                .pairs
                .iter()
                .map(|p| format!("{} = {}", p.path.raw, format_value(&p.value)))
                .collect();
            format!("SET {}", pairs.join(", "))
        }
        Clause::Delete(d) => format!("DELETE {}", d.node_ids.join(", ")),
        Clause::Return(r) => format_return(r),
    }
}

/// Emit pattern items (relationship chains and standalone nodes) ordered
/// by the first arena index they cover, so a reparse rebuilds the same
/// arena.
fn format_pattern(nodes: &[NodePattern], relationships: &[Relationship]) -> String {
    enum Item<'a> {
        Chain(Vec<&'a Relationship>),
        Node(usize),
    }

    let mut items: Vec<(usize, Item)> = Vec::new();
    let mut chain: Vec<&Relationship> = Vec::new();
    for rel in relationships {
        if let Some(last) = chain.last() {
            if last.right != rel.left {
                let first = chain[0].left;
                items.push((first, Item::Chain(std::mem::take(&mut chain))));
            }
        }
        chain.push(rel);
    }
    if !chain.is_empty() {
        let first = chain[0].left;
        items.push((first, Item::Chain(chain)));
    }
    for (idx, _) in nodes.iter().enumerate() {
        let in_rel = relationships
            .iter()
            .any(|rel| rel.left == idx || rel.right == idx);
        if !in_rel {
            items.push((idx, Item::Node(idx)));
        }
    }
    items.sort_by_key(|(first, _)| *first);

    let mut emitted = vec![false; nodes.len()];
    let mut parts = Vec::new();
    for (_, item) in items {
        match item {
            Item::Node(idx) => parts.push(format_node(nodes, idx, &mut emitted)),
            Item::Chain(rels) => {
                let mut s = format_node(nodes, rels[0].left, &mut emitted);
                for rel in rels {
                    s.push_str(&format_rel_op(rel));
                    s.push_str(&format_node(nodes, rel.right, &mut emitted));
                }
                parts.push(s);
            }
        }
    }
    parts.join(", ")
}

/// Full node text on first occurrence, a bare `(name)` reference after.
fn format_node(nodes: &[NodePattern], idx: usize, emitted: &mut [bool]) -> String {
    let node = &nodes[idx];
    if emitted[idx] && !node.anonymous {
        return format!("({})", node.name);
    }
    emitted[idx] = true;
    let mut s = String::from("(");
    if !node.anonymous {
        s.push_str(&node.name);
    }
    if !node.kind.is_empty() {
        s.push(':');
        s.push_str(&node.kind);
    }
    if let Some(props) = &node.properties {
        if !s.ends_with('(') {
            s.push(' ');
        }
        s.push_str(&format_props(props));
    }
    s.push(')');
    s
}

fn format_rel_op(rel: &Relationship) -> String {
    let detail = match (&rel.variable, &rel.rel_type) {
        (None, None) => None,
        (var, ty) => {
            let mut d = String::new();
            if let Some(var) = var {
                d.push_str(var);
            }
            if let Some(ty) = ty {
                d.push(':');
                d.push_str(ty);
            }
            if let Some(props) = &rel.properties {
                d.push(' ');
                d.push_str(&format_props(props));
            }
            Some(d)
        }
    };
    match (rel.direction, detail) {
        (Direction::Right, None) => "->".to_string(),
        (Direction::Left, None) => "<-".to_string(),
        (Direction::None, None) => "--".to_string(),
        (Direction::Right, Some(d)) => format!("-[{d}]->"),
        (Direction::Left, Some(d)) => format!("<-[{d}]-"),
        // An undirected typed relationship has no dedicated arrow; fall
        // back to the right-pointing form.
        (Direction::None, Some(d)) => format!("-[{d}]->"),
    }
}

fn format_props(props: &serde_json::Map<String, Value>) -> String {
    let pairs: Vec<String> = props
        .iter()
        .map(|(k, v)| format!("{}: {}", format_key(k), format_value(v)))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn format_key(key: &str) -> String {
    let bare = key
        .chars()
        .enumerate()
        .all(|(i, c)| {
            if i == 0 {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/')
            }
        })
        && crate::token::keyword_from_str(key).is_none();
    if bare {
        key.to_string()
    } else {
        format_value(&Value::String(key.to_string()))
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Object(map) => format_props(map),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn format_filter(filter: &Filter) -> String {
    match filter {
        Filter::Comparison(c) => {
            let value = match &c.value {
                FilterValue::Literal(v) => format_value(v),
                FilterValue::Temporal(t) => format_temporal(t),
            };
            let body = format!("{} {} {}", c.path.raw, c.op, value);
            if c.negated {
                format!("NOT {body}")
            } else {
                body
            }
        }
        Filter::SubMatch(s) => {
            let body = format_pattern(&s.nodes, &s.relationships);
            if s.negated {
                format!("NOT {body}")
            } else {
                body
            }
        }
    }
}

fn format_temporal(t: &TemporalExpr) -> String {
    match &t.offset {
        None => "datetime()".to_string(),
        Some(offset) => {
            let sign = match offset.sign {
                TemporalSign::Plus => '+',
                TemporalSign::Minus => '-',
            };
            format!("datetime() {sign} duration(\"{}\")", offset.duration)
        }
    }
}

fn format_return(r: &ReturnClause) -> String {
    let items: Vec<String> = r
        .items
        .iter()
        .map(|item| {
            let mut s = match item.aggregate {
                Some(Aggregate::Count) => format!("COUNT {{{}}}", item.path.raw),
                Some(Aggregate::Sum) => format!("SUM {{{}}}", item.path.raw),
                None => item.path.raw.clone(),
            };
            if let Some(alias) = &item.alias {
                s.push_str(" AS ");
                s.push_str(alias);
            }
            s
        })
        .collect();
    let mut out = format!("RETURN {}", items.join(", "));
    if !r.order_by.is_empty() {
        let orders: Vec<String> = r
            .order_by
            .iter()
            .map(|o| match o.direction {
                SortDirection::Asc => format!("{} ASC", o.alias),
                SortDirection::Desc => format!("{} DESC", o.alias),
            })
            .collect();
        out.push_str(" ORDER BY ");
        out.push_str(&orders.join(", "));
    }
    if let Some(skip) = r.skip {
        out.push_str(&format!(" SKIP {skip}"));
    }
    if let Some(limit) = r.limit {
        out.push_str(&format!(" LIMIT {limit}"));
    }
    out
}
