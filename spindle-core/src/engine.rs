use crate::errors::ErrorKind;
use crate::graph::Graph;
use crate::join;
use crate::mutate;
use crate::plan;
use crate::prelude::*;
use crate::project::{self, Tuples};
use crate::provider::{ApiResourceEntry, Provider};

use serde_json::{Map, Value};
use spindle_cypher::{
    Clause, CreateClause, DeleteClause, Expression, Filter, MatchClause, NodePattern,
    Relationship, ReturnClause, SetClause,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of one `execute` call: one `data` key per returned variable
/// (plus `aggregate` and, under dry-run, `patches`), and the node/edge
/// graph built while matching.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub data: Map<String, Value>,
    pub graph: Graph,
}

/// Executes parsed statements against a [`Provider`]. Holds no mutable
/// state; every call builds its own [`ExecutionContext`], so concurrent
/// `execute` calls are independent.
pub struct QueryExecutor {
    provider: Arc<dyn Provider>,
    dry_run: bool,
}

/// Per-call state threaded through the pipeline.
struct ExecutionContext {
    namespace: Option<String>,
    dry_run: bool,
    provider: Arc<dyn Provider>,
    /// Variable name -> bound documents.
    result_map: HashMap<String, Vec<Value>>,
    /// Variable name -> resolved API resource.
    entries: HashMap<String, ApiResourceEntry>,
    /// Fetch cache keyed by (namespace, resource, selectors).
    cache: HashMap<(String, String, String), Vec<Value>>,
    graph: Graph,
    /// Join product over relationship-bound variables, for ORDER/paging.
    tuples: Option<Tuples>,
    /// Dry-run mutation records.
    patches: Vec<Value>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ErrorKind::Canceled.into());
        }
        Ok(())
    }
}

impl QueryExecutor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        QueryExecutor {
            provider,
            dry_run: false,
        }
    }

    /// Suppress all provider writes; patches surface in the result under
    /// `patches` instead.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run a statement against `namespace` (`*` or empty for all
    /// namespaces). An `IN ctx1, ctx2` prefix runs the statement once per
    /// context and concatenates the results.
    pub async fn execute(&self, expr: &Expression, namespace: &str) -> Result<QueryResult> {
        self.execute_cancellable(expr, namespace, CancellationToken::new())
            .await
    }

    pub async fn execute_cancellable(
        &self,
        expr: &Expression,
        namespace: &str,
        cancel: CancellationToken,
    ) -> Result<QueryResult> {
        if expr.contexts.is_empty() {
            return self
                .run_statement(self.provider.clone(), expr, namespace, cancel)
                .await;
        }

        let mut merged = QueryResult::default();
        for context in &expr.contexts {
            let provider = self.provider.for_context(context)?;
            let result = self
                .run_statement(provider, expr, namespace, cancel.clone())
                .await?;
            merge_results(&mut merged, result);
        }
        Ok(merged)
    }

    async fn run_statement(
        &self,
        provider: Arc<dyn Provider>,
        expr: &Expression,
        namespace: &str,
        cancel: CancellationToken,
    ) -> Result<QueryResult> {
        let namespace = match namespace.trim() {
            "" | "*" => None,
            ns => Some(ns.to_string()),
        };
        let mut ctx = ExecutionContext {
            namespace,
            dry_run: self.dry_run,
            provider,
            result_map: HashMap::new(),
            entries: HashMap::new(),
            cache: HashMap::new(),
            graph: Graph::default(),
            tuples: None,
            patches: Vec::new(),
            cancel,
        };

        let mut return_clause: Option<&ReturnClause> = None;
        for clause in &expr.clauses {
            ctx.check_cancelled()?;
            match clause {
                Clause::Match(m) => exec_match(&mut ctx, m).await?,
                Clause::Create(c) => exec_create(&mut ctx, c).await?,
                Clause::Set(s) => exec_set(&mut ctx, s).await?,
                Clause::Delete(d) => exec_delete(&mut ctx, d).await?,
                Clause::Return(r) => return_clause = Some(r),
            }
        }

        let mut data = match return_clause {
            Some(ret) => {
                let tuples = ctx.tuples.take();
                project::order_and_page(ret, &mut ctx.result_map, tuples);
                project::project(ret, &ctx.result_map)
            }
            None => Map::new(),
        };
        if !ctx.patches.is_empty() {
            data.insert("patches".to_string(), Value::Array(ctx.patches.clone()));
        }

        Ok(QueryResult {
            data,
            graph: ctx.graph,
        })
    }
}

fn merge_results(merged: &mut QueryResult, next: QueryResult) {
    for (key, value) in next.data {
        match merged.data.entry(key) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            serde_json::map::Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Array(existing), Value::Array(incoming)) => existing.extend(incoming),
                (Value::Object(existing), Value::Object(incoming)) => existing.extend(incoming),
                (current, value) => *current = value,
            },
        }
    }
    merged.graph.merge(next.graph);
}

// ── MATCH ──────────────────────────────────────────────────────────────

async fn exec_match(ctx: &mut ExecutionContext, clause: &MatchClause) -> Result<()> {
    resolve_node_entries(ctx, &clause.nodes, &clause.relationships).await?;

    // Fetch every pattern node, applying its selectors and any WHERE
    // comparisons scoped to it.
    for node in &clause.nodes {
        let docs = fetch_node(ctx, node).await?;
        let docs = apply_comparisons(&clause.filters, &node.name, docs)?;
        ctx.result_map.insert(node.name.clone(), docs);
    }

    run_relationship_passes(ctx, clause).await?;

    // Sub-match predicates prune their reference variable, after which
    // the relationship intersection has to settle again.
    let mut pruned = false;
    for filter in &clause.filters {
        let Filter::SubMatch(sub) = filter else {
            continue;
        };
        let docs = ctx.result_map.get(&sub.reference).cloned().unwrap_or_default();
        let mut retained = Vec::new();
        for doc in docs {
            let holds = sub_match_holds(ctx, &doc, sub).await?;
            if holds != sub.negated {
                retained.push(doc);
            }
        }
        ctx.result_map.insert(sub.reference.clone(), retained);
        pruned = true;
    }
    if pruned {
        run_relationship_passes(ctx, clause).await?;
    }

    record_graph(ctx, clause);
    ctx.tuples = build_tuples(ctx, clause);
    Ok(())
}

/// Resolve each arena node to an API resource, inferring kinds for
/// kindless nodes from the rule catalog.
async fn resolve_node_entries(
    ctx: &mut ExecutionContext,
    nodes: &[NodePattern],
    relationships: &[Relationship],
) -> Result<()> {
    let mut kinds: Vec<Option<String>> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.is_kindless() {
            // Cross-clause references (sub-matches, CREATE) inherit the
            // entry bound by the defining clause.
            match ctx.entries.get(&node.name) {
                Some(entry) => kinds.push(Some(entry.resource.clone())),
                None => kinds.push(None),
            }
        } else {
            ctx.check_cancelled()?;
            let entry = ctx.provider.find_gvr(&node.kind).await?;
            kinds.push(Some(entry.resource.clone()));
            ctx.entries.insert(node.name.clone(), entry);
        }
    }

    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    plan::infer_kindless(&mut kinds, &names, relationships)?;

    for (node, kind) in nodes.iter().zip(kinds) {
        if !ctx.entries.contains_key(&node.name) {
            let plural = kind.expect("inference leaves no node unbound");
            let entry = ctx.provider.find_gvr(&plural).await?;
            debug!(node = %node.name, resource = %entry.resource, "bound kindless node");
            ctx.entries.insert(node.name.clone(), entry);
        }
    }
    Ok(())
}

async fn fetch_node(ctx: &mut ExecutionContext, node: &NodePattern) -> Result<Vec<Value>> {
    // A node already bound by an earlier clause keeps its binding.
    if let Some(existing) = ctx.result_map.get(&node.name) {
        if node.properties.is_none() {
            return Ok(existing.clone());
        }
    }
    let entry = ctx.entries[&node.name].clone();
    let selectors = join::split_selectors(&node.name, node.properties.as_ref())?;
    fetch_resources(ctx, &entry, &selectors).await
}

async fn fetch_resources(
    ctx: &mut ExecutionContext,
    entry: &ApiResourceEntry,
    selectors: &join::Selectors,
) -> Result<Vec<Value>> {
    let namespace = if entry.namespaced {
        ctx.namespace.clone()
    } else {
        None
    };
    let cache_key = (
        namespace.clone().unwrap_or_else(|| "*".to_string()),
        entry.resource.clone(),
        format!(
            "{}|{}",
            selectors.field_selector.as_deref().unwrap_or(""),
            selectors.label_selector.as_deref().unwrap_or("")
        ),
    );
    if let Some(cached) = ctx.cache.get(&cache_key) {
        return Ok(cached.clone());
    }

    ctx.check_cancelled()?;
    let docs = ctx
        .provider
        .get_k8s_resources(
            entry,
            selectors.field_selector.as_deref(),
            selectors.label_selector.as_deref(),
            namespace.as_deref(),
        )
        .await?;
    ctx.cache.insert(cache_key, docs.clone());
    Ok(docs)
}

/// Keep only documents passing every WHERE comparison rooted at `var`.
fn apply_comparisons(filters: &[Filter], var: &str, docs: Vec<Value>) -> Result<Vec<Value>> {
    let mut retained = docs;
    for filter in filters {
        let Filter::Comparison(c) = filter else {
            continue;
        };
        if c.path.var != var {
            continue;
        }
        let mut passing = Vec::new();
        for doc in retained {
            if crate::filter::evaluate_comparison(&doc, c)? {
                passing.push(doc);
            }
        }
        retained = passing;
    }
    Ok(retained)
}

/// Intersect relationship endpoints until a fixpoint, bounded at
/// `2 × |relationships|` passes. An endpoint emptying out empties every
/// variable of the clause.
async fn run_relationship_passes(ctx: &mut ExecutionContext, clause: &MatchClause) -> Result<()> {
    if clause.relationships.is_empty() {
        return Ok(());
    }
    let max_passes = 2 * clause.relationships.len();
    for _ in 0..max_passes {
        let mut changed = false;
        for rel in &clause.relationships {
            let left_name = &clause.nodes[rel.left].name;
            let right_name = &clause.nodes[rel.right].name;
            let (rule, swapped) = rule_for(ctx, left_name, right_name)?;

            let left_docs = ctx.result_map.get(left_name).cloned().unwrap_or_default();
            let right_docs = ctx.result_map.get(right_name).cloned().unwrap_or_default();
            let pairs = join::matching_pairs(rule, swapped, &left_docs, &right_docs);

            if pairs.is_empty() {
                // Intersection semantics: one dead edge empties the match.
                for node in &clause.nodes {
                    ctx.result_map.insert(node.name.clone(), Vec::new());
                }
                return Ok(());
            }

            let keep_left: Vec<Value> = retain_indices(&left_docs, pairs.iter().map(|p| p.0));
            let keep_right: Vec<Value> = retain_indices(&right_docs, pairs.iter().map(|p| p.1));
            changed |= keep_left.len() != left_docs.len() || keep_right.len() != right_docs.len();
            ctx.result_map.insert(left_name.clone(), keep_left);
            ctx.result_map.insert(right_name.clone(), keep_right);
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

fn rule_for(
    ctx: &ExecutionContext,
    left: &str,
    right: &str,
) -> Result<(&'static crate::rules::RelationshipRule, bool)> {
    let left_entry = &ctx.entries[left];
    let right_entry = &ctx.entries[right];
    crate::rules::find_rule(&left_entry.resource, &right_entry.resource).ok_or_else(|| {
        ErrorKind::NoRelationshipRule {
            kind_a: left_entry.kind.clone(),
            kind_b: right_entry.kind.clone(),
        }
        .into()
    })
}

fn retain_indices(docs: &[Value], indices: impl Iterator<Item = usize>) -> Vec<Value> {
    let mut seen = Vec::new();
    for idx in indices {
        if !seen.contains(&idx) {
            seen.push(idx);
        }
    }
    seen.sort_unstable();
    seen.into_iter().filter_map(|i| docs.get(i).cloned()).collect()
}

/// Evaluate a sub-match pattern rooted at one candidate document of the
/// reference variable. True when every relationship of the pattern can
/// be satisfied.
async fn sub_match_holds(
    ctx: &mut ExecutionContext,
    doc: &Value,
    sub: &spindle_cypher::SubMatchFilter,
) -> Result<bool> {
    // Resolve local arena kinds; the reference inherits the outer entry.
    let mut kinds: Vec<Option<String>> = Vec::with_capacity(sub.nodes.len());
    let mut local_entries: HashMap<String, ApiResourceEntry> = HashMap::new();
    for node in &sub.nodes {
        if node.name == sub.reference {
            let entry = ctx.entries[&sub.reference].clone();
            kinds.push(Some(entry.resource.clone()));
            local_entries.insert(node.name.clone(), entry);
        } else if node.is_kindless() {
            kinds.push(None);
        } else {
            let entry = ctx.provider.find_gvr(&node.kind).await?;
            kinds.push(Some(entry.resource.clone()));
            local_entries.insert(node.name.clone(), entry);
        }
    }
    let names: Vec<String> = sub.nodes.iter().map(|n| n.name.clone()).collect();
    plan::infer_kindless(&mut kinds, &names, &sub.relationships)?;
    for (node, kind) in sub.nodes.iter().zip(&kinds) {
        if !local_entries.contains_key(&node.name) {
            let plural = kind.clone().expect("inference leaves no node unbound");
            let entry = ctx.provider.find_gvr(&plural).await?;
            local_entries.insert(node.name.clone(), entry);
        }
    }

    // Bind the reference to the single candidate; fetch the rest.
    let mut lists: HashMap<String, Vec<Value>> = HashMap::new();
    lists.insert(sub.reference.clone(), vec![doc.clone()]);
    for node in &sub.nodes {
        if node.name == sub.reference {
            continue;
        }
        let entry = local_entries[&node.name].clone();
        let selectors = join::split_selectors(&node.name, node.properties.as_ref())?;
        let docs = fetch_resources(ctx, &entry, &selectors).await?;
        lists.insert(node.name.clone(), docs);
    }

    let max_passes = 2 * sub.relationships.len().max(1);
    for _ in 0..max_passes {
        let mut changed = false;
        for rel in &sub.relationships {
            let left_name = &sub.nodes[rel.left].name;
            let right_name = &sub.nodes[rel.right].name;
            let left_entry = &local_entries[left_name];
            let right_entry = &local_entries[right_name];
            let (rule, swapped) =
                crate::rules::find_rule(&left_entry.resource, &right_entry.resource).ok_or_else(
                    || ErrorKind::NoRelationshipRule {
                        kind_a: left_entry.kind.clone(),
                        kind_b: right_entry.kind.clone(),
                    },
                )?;
            let left_docs = lists[left_name].clone();
            let right_docs = lists[right_name].clone();
            let pairs = join::matching_pairs(rule, swapped, &left_docs, &right_docs);
            if pairs.is_empty() {
                return Ok(false);
            }
            let keep_left = retain_indices(&left_docs, pairs.iter().map(|p| p.0));
            let keep_right = retain_indices(&right_docs, pairs.iter().map(|p| p.1));
            changed |= keep_left.len() != left_docs.len() || keep_right.len() != right_docs.len();
            lists.insert(left_name.clone(), keep_left);
            lists.insert(right_name.clone(), keep_right);
        }
        if !changed {
            break;
        }
    }
    Ok(true)
}

fn record_graph(ctx: &mut ExecutionContext, clause: &MatchClause) {
    for node in &clause.nodes {
        let entry = &ctx.entries[&node.name];
        let kind = entry.kind.clone();
        if let Some(docs) = ctx.result_map.get(&node.name) {
            let docs = docs.clone();
            for doc in &docs {
                ctx.graph.add_resource(&kind, doc);
            }
        }
    }
    for rel in &clause.relationships {
        let left_name = clause.nodes[rel.left].name.clone();
        let right_name = clause.nodes[rel.right].name.clone();
        let Ok((rule, swapped)) = rule_for(ctx, &left_name, &right_name) else {
            continue;
        };
        let left_entry = ctx.entries[&left_name].clone();
        let right_entry = ctx.entries[&right_name].clone();
        let left_docs = ctx.result_map.get(&left_name).cloned().unwrap_or_default();
        let right_docs = ctx.result_map.get(&right_name).cloned().unwrap_or_default();
        for (li, ri) in join::matching_pairs(rule, swapped, &left_docs, &right_docs) {
            let from = ctx.graph.add_resource(&left_entry.kind, &left_docs[li]);
            let to = ctx.graph.add_resource(&right_entry.kind, &right_docs[ri]);
            ctx.graph.add_edge(&from, &to, &rule.rel_type.to_string());
        }
    }
}

/// Join the per-relationship pair sets into a tuple stream over all
/// relationship-bound variables, for ORDER BY / SKIP / LIMIT.
fn build_tuples(ctx: &ExecutionContext, clause: &MatchClause) -> Option<Tuples> {
    if clause.relationships.is_empty() {
        return None;
    }
    let mut tuples: Tuples = Vec::new();
    let mut first = true;

    for rel in &clause.relationships {
        let left_name = clause.nodes[rel.left].name.clone();
        let right_name = clause.nodes[rel.right].name.clone();
        let (rule, swapped) = crate::rules::find_rule(
            &ctx.entries[&left_name].resource,
            &ctx.entries[&right_name].resource,
        )?;
        let left_docs = ctx.result_map.get(&left_name)?;
        let right_docs = ctx.result_map.get(&right_name)?;
        let pairs = join::matching_pairs(rule, swapped, left_docs, right_docs);

        if first {
            tuples = pairs
                .into_iter()
                .map(|(l, r)| {
                    HashMap::from([(left_name.clone(), l), (right_name.clone(), r)])
                })
                .collect();
            first = false;
            continue;
        }

        let mut extended = Vec::new();
        for tuple in &tuples {
            let known_left = tuple.get(&left_name);
            let known_right = tuple.get(&right_name);
            for (l, r) in &pairs {
                let left_ok = known_left.is_none_or(|i| i == l);
                let right_ok = known_right.is_none_or(|i| i == r);
                if left_ok && right_ok {
                    let mut next = tuple.clone();
                    next.insert(left_name.clone(), *l);
                    next.insert(right_name.clone(), *r);
                    extended.push(next);
                }
            }
        }
        tuples = extended;
    }
    Some(tuples)
}

// ── CREATE / SET / DELETE ──────────────────────────────────────────────

async fn exec_create(ctx: &mut ExecutionContext, clause: &CreateClause) -> Result<()> {
    let mut failures = Vec::new();

    // Standalone nodes carry a full JSON body in their properties.
    for (idx, node) in clause.nodes.iter().enumerate() {
        let in_relationship = clause
            .relationships
            .iter()
            .any(|rel| rel.left == idx || rel.right == idx);
        if in_relationship {
            continue;
        }
        let entry = match ctx.entries.get(&node.name) {
            Some(entry) => entry.clone(),
            None => {
                let entry = ctx.provider.find_gvr(&node.kind).await?;
                ctx.entries.insert(node.name.clone(), entry.clone());
                entry
            }
        };
        let body = build_create_body(ctx, &entry, node)?;
        create_one(ctx, &entry, node, body, &mut failures).await?;
    }

    // Relationship form: synthesize the new resource from the source
    // document via the catalog's reverse template. The bound side is the
    // source regardless of arrow direction.
    for rel in &clause.relationships {
        let (source, target) = if ctx.result_map.contains_key(&clause.nodes[rel.left].name) {
            (&clause.nodes[rel.left], &clause.nodes[rel.right])
        } else {
            (&clause.nodes[rel.right], &clause.nodes[rel.left])
        };
        let source_entry = ctx
            .entries
            .get(&source.name)
            .cloned()
            .ok_or_else(|| ErrorKind::Provider(format!("unbound variable `{}`", source.name)))?;
        let target_entry = match ctx.entries.get(&target.name) {
            Some(entry) => entry.clone(),
            None => {
                let entry = ctx.provider.find_gvr(&target.kind).await?;
                ctx.entries.insert(target.name.clone(), entry.clone());
                entry
            }
        };
        let sources = ctx.result_map.get(&source.name).cloned().unwrap_or_default();
        for doc in &sources {
            let body = crate::rules::creation_template(
                &source_entry.resource,
                &target_entry.resource,
                doc,
                target.properties.as_ref(),
            )?;
            create_one(ctx, &target_entry, target, body, &mut failures).await?;
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ErrorKind::MutationFailures { failures }.into())
    }
}

fn build_create_body(
    ctx: &ExecutionContext,
    entry: &ApiResourceEntry,
    node: &NodePattern,
) -> Result<Value> {
    let props = node.properties.clone().unwrap_or_default();
    let mut body = Value::Object(props);
    if body.pointer("/apiVersion").is_none() {
        let api_version = if entry.group.is_empty() {
            entry.version.clone()
        } else {
            format!("{}/{}", entry.group, entry.version)
        };
        body["apiVersion"] = Value::String(api_version);
    }
    if body.pointer("/kind").is_none() {
        body["kind"] = Value::String(entry.kind.clone());
    }
    if entry.namespaced && body.pointer("/metadata/namespace").is_none() {
        let namespace = ctx.namespace.clone().unwrap_or_else(|| "default".to_string());
        if body.get("metadata").is_none() {
            body["metadata"] = Value::Object(Map::new());
        }
        body["metadata"]["namespace"] = Value::String(namespace);
    }
    Ok(body)
}

async fn create_one(
    ctx: &mut ExecutionContext,
    entry: &ApiResourceEntry,
    node: &NodePattern,
    body: Value,
    failures: &mut Vec<String>,
) -> Result<()> {
    ctx.check_cancelled()?;
    let name = body
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let namespace = body
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .map(str::to_string);

    if ctx.dry_run {
        ctx.patches
            .push(mutate::dry_run_entry(&entry.kind, &name, namespace.as_deref(), &body));
    } else if let Err(err) = ctx
        .provider
        .create_k8s_resource(entry, namespace.as_deref(), body.clone())
        .await
    {
        failures.push(format!("create {} `{name}`: {err}", entry.kind));
        return Ok(());
    }

    ctx.result_map.entry(node.name.clone()).or_default().push(body);
    Ok(())
}

async fn exec_set(ctx: &mut ExecutionContext, clause: &SetClause) -> Result<()> {
    // Group pairs per variable so each resource gets one patch document.
    let mut by_var: HashMap<String, Vec<(Vec<spindle_cypher::PathSegment>, Value)>> =
        HashMap::new();
    for pair in &clause.pairs {
        by_var
            .entry(pair.path.var.clone())
            .or_default()
            .push((pair.path.segments.clone(), pair.value.clone()));
    }

    let mut failures = Vec::new();
    for (var, pairs) in by_var {
        let entry = ctx
            .entries
            .get(&var)
            .cloned()
            .ok_or_else(|| ErrorKind::Provider(format!("unbound variable `{var}`")))?;
        let docs = ctx.result_map.get(&var).cloned().unwrap_or_default();
        let mut updated = Vec::with_capacity(docs.len());

        for mut doc in docs {
            ctx.check_cancelled()?;
            let patch = mutate::set_patch(&doc, &pairs);
            let name = doc
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let namespace = doc
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .map(str::to_string);

            if ctx.dry_run {
                ctx.patches.push(mutate::dry_run_entry(
                    &entry.kind,
                    &name,
                    namespace.as_deref(),
                    &patch,
                ));
                updated.push(doc);
                continue;
            }
            if let Err(err) = ctx
                .provider
                .patch_k8s_resource(&entry, &name, namespace.as_deref(), &patch)
                .await
            {
                failures.push(format!("patch {} `{name}`: {err}", entry.kind));
                updated.push(doc);
                continue;
            }

            // Reflect the mutation locally so a following RETURN sees it.
            if mutate::apply_patch(&mut doc, &patch).is_err() {
                debug!(name, "local patch replay failed");
            }
            updated.push(doc);
        }
        ctx.result_map.insert(var, updated);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ErrorKind::MutationFailures { failures }.into())
    }
}

async fn exec_delete(ctx: &mut ExecutionContext, clause: &DeleteClause) -> Result<()> {
    let mut failures = Vec::new();
    for var in &clause.node_ids {
        let entry = ctx
            .entries
            .get(var)
            .cloned()
            .ok_or_else(|| ErrorKind::Provider(format!("unbound variable `{var}`")))?;
        let docs = ctx.result_map.get(var).cloned().unwrap_or_default();
        for doc in &docs {
            ctx.check_cancelled()?;
            let name = doc
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let namespace = doc
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .map(str::to_string);
            if ctx.dry_run {
                ctx.patches.push(mutate::dry_run_entry(
                    &entry.kind,
                    &name,
                    namespace.as_deref(),
                    &Value::String("delete".to_string()),
                ));
                continue;
            }
            if let Err(err) = ctx
                .provider
                .delete_k8s_resource(&entry, &name, namespace.as_deref())
                .await
            {
                failures.push(format!("delete {} `{name}`: {err}", entry.kind));
            }
        }
        ctx.result_map.insert(var.clone(), Vec::new());
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ErrorKind::MutationFailures { failures }.into())
    }
}
