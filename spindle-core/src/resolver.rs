use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::provider::ApiResourceEntry;

/// Resolve a user-supplied kind identifier against a discovery snapshot.
///
/// Matching tiers, most to least preferred: exact kind, case-insensitive
/// kind, plural resource name, short names, singular forms, fully
/// qualified `resource.group`. Several hits at the same tier mean the
/// identifier is ambiguous (typically CRDs sharing a kind across groups).
pub fn resolve_kind(entries: &[ApiResourceEntry], input: &str) -> Result<ApiResourceEntry> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ErrorKind::InvalidKind(input.to_string()).into());
    }
    let lower = input.to_ascii_lowercase();

    let tiers: [&dyn Fn(&ApiResourceEntry) -> bool; 6] = [
        &|e| e.kind == input,
        &|e| e.kind.eq_ignore_ascii_case(input),
        &|e| e.resource == lower,
        &|e| e.short_names.iter().any(|s| s.eq_ignore_ascii_case(input)),
        &|e| {
            e.singular == lower
                || format!("{lower}s") == e.resource
                || format!("{lower}es") == e.resource
        },
        &|e| e.fully_qualified() == lower,
    ];

    for tier in tiers {
        let matches: Vec<&ApiResourceEntry> = entries.iter().filter(|e| tier(e)).collect();
        match matches.as_slice() {
            [] => continue,
            [single] => return Ok((*single).clone()),
            many => {
                // Same resource reported in several versions is not an
                // ambiguity; distinct group/resource pairs are.
                let mut candidates: Vec<String> =
                    many.iter().map(|e| e.fully_qualified()).collect();
                candidates.sort_unstable();
                candidates.dedup();
                if candidates.len() == 1 {
                    return Ok(many[0].clone());
                }
                return Err(ErrorKind::AmbiguousKind {
                    kind: input.to_string(),
                    candidates,
                }
                .into());
            }
        }
    }

    Err(ErrorKind::InvalidKind(input.to_string()).into())
}
