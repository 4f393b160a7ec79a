use serde_json::{Map, Value};
use spindle_cypher::PathSegment;

/// Parse a dotted field path (`metadata.ownerReferences[*].name`) into
/// segments. `\.` is a literal dot inside a key; `[n]` and `[*]` index
/// arrays. Used for rule criteria fields, which are plain strings.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    let flush = |current: &mut String, segments: &mut Vec<PathSegment>| {
        if !current.is_empty() {
            segments.push(PathSegment::Key(std::mem::take(current)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                current.push('.');
            }
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut idx = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    idx.push(c);
                }
                if idx == "*" {
                    segments.push(PathSegment::Wildcard);
                } else if let Ok(n) = idx.parse::<usize>() {
                    segments.push(PathSegment::Index(n));
                }
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

/// Resolve a path against a document, returning every atom it reaches.
/// `[*]` fans out over array elements; a missing step yields nothing.
pub fn resolve<'a>(doc: &'a Value, segments: &[PathSegment]) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for seg in segments {
        let mut next = Vec::new();
        for value in current {
            match seg {
                PathSegment::Key(key) => {
                    if let Some(v) = value.get(key.as_str()) {
                        next.push(v);
                    }
                }
                PathSegment::Index(idx) => {
                    if let Some(v) = value.get(idx) {
                        next.push(v);
                    }
                }
                PathSegment::Wildcard => {
                    if let Some(items) = value.as_array() {
                        next.extend(items.iter());
                    }
                }
            }
        }
        current = next;
    }
    current
}

/// Resolve a path for projection: a single value for wildcard-free paths,
/// the flattened list of values when the path fans out. `None` when the
/// path reaches nothing.
pub fn project(doc: &Value, segments: &[PathSegment]) -> Option<Value> {
    let fans_out = segments.iter().any(|s| matches!(s, PathSegment::Wildcard));
    let atoms = resolve(doc, segments);
    if fans_out {
        // An existing-but-empty array still projects as an empty list.
        let base: Vec<&PathSegment> = segments
            .iter()
            .take_while(|s| !matches!(s, PathSegment::Wildcard))
            .collect();
        let base_segs: Vec<PathSegment> = base.into_iter().cloned().collect();
        if atoms.is_empty() && resolve(doc, &base_segs).is_empty() {
            return None;
        }
        Some(Value::Array(atoms.into_iter().cloned().collect()))
    } else {
        atoms.first().map(|v| (*v).clone())
    }
}

/// Insert `value` into an output object at the path's nested key
/// position, creating intermediate objects. Index and wildcard segments
/// do not nest; the value is attached at the innermost key level.
pub fn insert_nested(target: &mut Map<String, Value>, segments: &[PathSegment], value: Value) {
    let keys: Vec<&str> = segments
        .iter()
        .filter_map(|seg| match seg {
            PathSegment::Key(k) => Some(k.as_str()),
            _ => None,
        })
        .collect();
    if keys.is_empty() {
        return;
    }
    let mut current = target;
    for key in &keys[..keys.len() - 1] {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry
            .as_object_mut()
            .expect("entry was just ensured to be an object");
    }
    current.insert(keys[keys.len() - 1].to_string(), value);
}

/// RFC-6901 escaping for one pointer step.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_and_escaped_paths() {
        assert_eq!(
            parse_path("metadata.name"),
            vec![
                PathSegment::Key("metadata".into()),
                PathSegment::Key("name".into())
            ]
        );
        assert_eq!(
            parse_path(r"metadata.annotations.meta\.helm\.sh/name"),
            vec![
                PathSegment::Key("metadata".into()),
                PathSegment::Key("annotations".into()),
                PathSegment::Key("meta.helm.sh/name".into())
            ]
        );
        assert_eq!(
            parse_path("spec.containers[*].image"),
            vec![
                PathSegment::Key("spec".into()),
                PathSegment::Key("containers".into()),
                PathSegment::Wildcard,
                PathSegment::Key("image".into())
            ]
        );
        assert_eq!(
            parse_path("spec.containers[1]"),
            vec![
                PathSegment::Key("spec".into()),
                PathSegment::Key("containers".into()),
                PathSegment::Index(1)
            ]
        );
    }

    #[test]
    fn resolves_wildcards() {
        let doc = json!({"spec": {"containers": [
            {"image": "nginx:1.19"},
            {"image": "busybox:1.32"}
        ]}});
        let atoms = resolve(&doc, &parse_path("spec.containers[*].image"));
        assert_eq!(atoms, vec![&json!("nginx:1.19"), &json!("busybox:1.32")]);
    }

    #[test]
    fn resolves_escaped_dot_keys() {
        let doc = json!({"metadata": {"annotations": {"meta.helm.sh/name": "web"}}});
        let atoms = resolve(&doc, &parse_path(r"metadata.annotations.meta\.helm\.sh/name"));
        assert_eq!(atoms, vec![&json!("web")]);
    }

    #[test]
    fn missing_path_resolves_empty() {
        let doc = json!({"metadata": {}});
        assert!(resolve(&doc, &parse_path("metadata.labels.app")).is_empty());
    }

    #[test]
    fn projects_single_and_fanned_values() {
        let doc = json!({"spec": {"containers": [{"name": "a"}, {"name": "b"}]}});
        assert_eq!(
            project(&doc, &parse_path("spec.containers[*].name")),
            Some(json!(["a", "b"]))
        );
        assert_eq!(
            project(&doc, &parse_path("spec.containers[0].name")),
            Some(json!("a"))
        );
        assert_eq!(project(&doc, &parse_path("spec.missing")), None);
    }

    #[test]
    fn projects_empty_array_as_empty_list() {
        let doc = json!({"spec": {"containers": []}});
        assert_eq!(
            project(&doc, &parse_path("spec.containers[*].name")),
            Some(json!([]))
        );
    }

    #[test]
    fn inserts_nested_values() {
        let mut out = Map::new();
        insert_nested(&mut out, &parse_path("metadata.name"), json!("web"));
        insert_nested(&mut out, &parse_path("metadata.labels.app"), json!("store"));
        assert_eq!(
            Value::Object(out),
            json!({"metadata": {"name": "web", "labels": {"app": "store"}}})
        );
    }

    #[test]
    fn escapes_pointer_segments() {
        assert_eq!(escape_pointer_segment("a/b"), "a~1b");
        assert_eq!(escape_pointer_segment("a~b"), "a~0b");
    }
}
