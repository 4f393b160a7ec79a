use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::rules;

use spindle_cypher::Relationship;

/// Bind kinds for kindless pattern nodes by intersecting the rule
/// catalog's neighbor sets over all adjacent nodes of known kind.
///
/// `kinds` holds the plural resource name per arena node, `None` for
/// kindless nodes; bound entries are filled in place. Iteration is
/// bounded at `2 × |relationships|` passes and stops early once a pass
/// binds nothing. Ambiguity is only an error once the passes are
/// exhausted, since a later binding can shrink a candidate set.
pub fn infer_kindless(
    kinds: &mut [Option<String>],
    names: &[String],
    relationships: &[Relationship],
) -> Result<()> {
    let max_passes = 2 * relationships.len().max(1);

    for _ in 0..max_passes {
        let mut changed = false;
        for idx in 0..kinds.len() {
            if kinds[idx].is_some() {
                continue;
            }
            match candidates_for(idx, kinds, relationships) {
                Some(set) if set.len() == 1 => {
                    kinds[idx] = Some(set[0].to_string());
                    changed = true;
                }
                Some(set) if set.is_empty() => {
                    return Err(ErrorKind::UnresolvedKindlessChain(names[idx].clone()).into());
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }

    for (idx, kind) in kinds.iter().enumerate() {
        if kind.is_some() {
            continue;
        }
        return match candidates_for(idx, kinds, relationships) {
            Some(set) if set.len() > 1 => Err(ErrorKind::AmbiguousKindlessNode {
                node: names[idx].clone(),
                candidates: set.iter().map(|s| s.to_string()).collect(),
            }
            .into()),
            _ => Err(ErrorKind::UnresolvedKindlessChain(names[idx].clone()).into()),
        };
    }
    Ok(())
}

/// Intersection of neighbor sets over all bound neighbors of one node;
/// `None` when no neighbor is bound yet.
fn candidates_for(
    idx: usize,
    kinds: &[Option<String>],
    relationships: &[Relationship],
) -> Option<Vec<&'static str>> {
    let mut candidates: Option<Vec<&'static str>> = None;
    for rel in relationships {
        let neighbor = if rel.left == idx {
            rel.right
        } else if rel.right == idx {
            rel.left
        } else {
            continue;
        };
        let Some(neighbor_kind) = &kinds[neighbor] else {
            continue;
        };
        let reachable = rules::neighbor_kinds(neighbor_kind);
        candidates = Some(match candidates {
            None => reachable,
            Some(existing) => existing
                .into_iter()
                .filter(|k| reachable.contains(k))
                .collect(),
        });
    }
    candidates
}
