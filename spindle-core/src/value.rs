use serde_json::Value;
use std::cmp::Ordering;

/// Canonical string form used by CONTAINS, `=~`, and graph labels:
/// strings render bare, everything else as compact JSON.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose equality: numbers compare numerically across integer/float,
/// numeric strings coerce when the other side is a number, everything
/// else falls back to strict JSON equality.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x == y;
    }
    a == b
}

/// Ordering for `> < >= <=`. Numeric when both sides coerce to numbers;
/// otherwise lexical over canonical strings, which keeps quantity-like
/// strings (`100m`, `128Mi`) and RFC-3339 timestamps comparable.
pub fn compare_order(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    canonical_string(a).cmp(&canonical_string(b))
}

/// Number, or a string that is purely numeric.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

const QUANTITY_SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "K", "M", "G", "T", "P", "E",
];

/// A Kubernetes quantity string: a number followed by a known unit
/// suffix. Pure numbers are not quantities here; they sum numerically.
pub fn is_quantity(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let s = s.trim();
    QUANTITY_SUFFIXES.iter().any(|suffix| {
        s.strip_suffix(suffix)
            .is_some_and(|num| !num.is_empty() && num.parse::<f64>().is_ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_eq_coerces_numbers() {
        assert!(loose_eq(&json!(3), &json!(3.0)));
        assert!(loose_eq(&json!("3"), &json!(3)));
        assert!(!loose_eq(&json!("3x"), &json!(3)));
        assert!(loose_eq(&json!("a"), &json!("a")));
    }

    #[test]
    fn orders_numerics_and_strings() {
        assert_eq!(compare_order(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_order(&json!("2"), &json!(10)), Ordering::Less);
        // Non-numeric strings compare lexically.
        assert_eq!(compare_order(&json!("100m"), &json!("20m")), Ordering::Less);
    }

    #[test]
    fn detects_quantities() {
        assert!(is_quantity(&json!("100m")));
        assert!(is_quantity(&json!("128Mi")));
        assert!(is_quantity(&json!("1Gi")));
        assert!(!is_quantity(&json!("100")));
        assert!(!is_quantity(&json!("busybox")));
        assert!(!is_quantity(&json!(100)));
    }
}
