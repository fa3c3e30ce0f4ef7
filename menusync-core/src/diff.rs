//! Semantic changeset computation for updates.

use menusync_types::fields::Fields;
use serde_json::Value;
use std::collections::BTreeSet;

/// The set of incoming fields whose values differ from the existing
/// record. Fields present only on the existing record are not reported;
/// a partial payload does not un-set what it omits.
pub fn semantic_diff(existing: &Fields, incoming: &Fields) -> BTreeSet<String> {
    incoming
        .keys()
        .filter(|key| !semantically_equal(existing.get(*key), incoming.get(*key)))
        .cloned()
        .collect()
}

/// Field-level semantic equality: absent, null, and the empty array are
/// all equal (optional arrays), and integer-valued floats equal integers.
pub fn semantically_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (Norm::Empty, Norm::Empty) => true,
        (Norm::Int(x), Norm::Int(y)) => x == y,
        (Norm::Value(x), Norm::Value(y)) => x == y,
        _ => false,
    }
}

enum Norm<'a> {
    Empty,
    Int(i64),
    Value(&'a Value),
}

fn normalize(value: Option<&Value>) -> Norm<'_> {
    match value {
        None | Some(Value::Null) => Norm::Empty,
        Some(Value::Array(items)) if items.is_empty() => Norm::Empty,
        Some(v @ Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Norm::Int(i)
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    Norm::Int(f as i64)
                } else {
                    Norm::Value(v)
                }
            } else {
                Norm::Value(v)
            }
        }
        Some(v) => Norm::Value(v),
    }
}
