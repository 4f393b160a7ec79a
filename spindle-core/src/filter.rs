use crate::errors::ErrorKind;
use crate::prelude::*;
use crate::value::{canonical_string, compare_order, loose_eq};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use spindle_cypher::{ComparisonFilter, FilterValue, Operator, TemporalSign};
use std::cmp::Ordering;

/// Evaluate one comparison predicate against a resource document.
///
/// Paths containing `[*]` use existential semantics: the predicate holds
/// if any element satisfies it. `NOT` negates the result afterwards,
/// which by De Morgan is the universal quantifier over the negated
/// predicate.
pub fn evaluate_comparison(doc: &Value, filter: &ComparisonFilter) -> Result<bool> {
    let atoms = crate::path::resolve(doc, &filter.path.segments);
    let rhs = materialize_rhs(&filter.value)?;

    let mut matched = false;
    for atom in atoms {
        if satisfies(atom, filter.op, &rhs)? {
            matched = true;
            break;
        }
    }

    Ok(if filter.negated { !matched } else { matched })
}

/// The right-hand side with temporal expressions evaluated to a concrete
/// UTC instant.
enum Rhs {
    Literal(Value),
    Instant(DateTime<Utc>),
}

fn materialize_rhs(value: &FilterValue) -> Result<Rhs> {
    match value {
        FilterValue::Literal(v) => Ok(Rhs::Literal(v.clone())),
        FilterValue::Temporal(t) => {
            let mut instant = Utc::now();
            if let Some(offset) = &t.offset {
                let duration = parse_iso8601_duration(&offset.duration)?;
                instant = match offset.sign {
                    TemporalSign::Plus => instant + duration,
                    TemporalSign::Minus => instant - duration,
                };
            }
            Ok(Rhs::Instant(instant))
        }
    }
}

fn satisfies(atom: &Value, op: Operator, rhs: &Rhs) -> Result<bool> {
    match rhs {
        Rhs::Instant(instant) => {
            // RFC-3339 resource strings compare chronologically; anything
            // unparsable never matches.
            let Value::String(s) = atom else {
                return Ok(false);
            };
            let Ok(parsed) = DateTime::parse_from_rfc3339(s) else {
                return Ok(false);
            };
            let ordering = parsed.with_timezone(&Utc).cmp(instant);
            Ok(ordering_matches(op, ordering))
        }
        Rhs::Literal(value) => match op {
            Operator::Eq => Ok(loose_eq(atom, value)),
            Operator::NotEq => Ok(!loose_eq(atom, value)),
            Operator::Gt | Operator::Lt | Operator::GtEq | Operator::LtEq => {
                Ok(ordering_matches(op, compare_order(atom, value)))
            }
            Operator::Contains => {
                Ok(canonical_string(atom).contains(&canonical_string(value)))
            }
            Operator::Regex => {
                let pattern = Regex::new(&canonical_string(value))
                    .map_err(ErrorKind::InvalidRegex)?;
                Ok(pattern.is_match(&canonical_string(atom)))
            }
        },
    }
}

fn ordering_matches(op: Operator, ordering: Ordering) -> bool {
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::NotEq => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Lt => ordering == Ordering::Less,
        Operator::GtEq => ordering != Ordering::Less,
        Operator::LtEq => ordering != Ordering::Greater,
        Operator::Contains | Operator::Regex => false,
    }
}

/// Parse an ISO-8601 duration (`PT1H`, `P1DT2H30M`, `P2W`). Years and
/// months use the 365/30-day civil approximations.
pub fn parse_iso8601_duration(text: &str) -> Result<Duration> {
    let invalid =
        || -> crate::errors::SpindleError { ErrorKind::InvalidDuration(text.to_string()).into() };

    let rest = text.strip_prefix('P').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = Duration::zero();
    let mut parse_units = |part: &str, in_time: bool| -> Result<()> {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                continue;
            }
            let n: f64 = number.parse().map_err(|_| invalid())?;
            number.clear();
            let seconds = match (c, in_time) {
                ('Y', false) => n * 365.0 * 86_400.0,
                ('M', false) => n * 30.0 * 86_400.0,
                ('W', false) => n * 7.0 * 86_400.0,
                ('D', false) => n * 86_400.0,
                ('H', true) => n * 3_600.0,
                ('M', true) => n * 60.0,
                ('S', true) => n,
                _ => return Err(invalid()),
            };
            total += Duration::milliseconds((seconds * 1000.0) as i64);
        }
        if !number.is_empty() {
            return Err(invalid());
        }
        Ok(())
    };

    parse_units(date_part, false)?;
    parse_units(time_part, true)?;
    Ok(total)
}
