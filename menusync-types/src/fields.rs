//! The shared field-bag representation for payloads, records, and patches.
//!
//! A `BTreeMap` keeps iteration and serialization order deterministic, which
//! the replay packs and the changed-key diffs rely on.

use serde_json::Value;
use std::collections::BTreeMap;

/// A normalized field bag: payloads, existing records, and patches all use
/// this shape.
pub type Fields = BTreeMap<String, Value>;

/// A rule's output patch. Keys must be a subset of the rule's declared
/// `writes`.
pub type Patch = Fields;

/// Returns the string value for `key`, if present and a string.
pub fn str_of<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Returns the trimmed string value for `key` when it is non-blank.
pub fn non_blank_str<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    match str_of(fields, key) {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        None => None,
    }
}

/// Returns the string elements of an array value for `key`.
///
/// Non-string elements and blank strings are dropped.
pub fn str_list(fields: &Fields, key: &str) -> Vec<String> {
    match fields.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Returns an integer value for `key`, accepting integral floats.
pub fn int_of(fields: &Fields, key: &str) -> Option<i64> {
    match fields.get(key) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            }
        }
        _ => None,
    }
}

/// A value is blank when it is null, an empty or whitespace-only string, or
/// an empty array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Fields {
        let mut f = Fields::new();
        f.insert("name".to_string(), json!("Blue Dream"));
        f.insert("padded".to_string(), json!("  spaced  "));
        f.insert("blank".to_string(), json!("   "));
        f.insert("price_cents".to_string(), json!(1200));
        f.insert("price_float".to_string(), json!(1200.0));
        f.insert("tags".to_string(), json!(["indica", " ", 3, "sativa"]));
        f
    }

    #[test]
    fn non_blank_str_trims_and_rejects_blank() {
        let f = sample();
        assert_eq!(non_blank_str(&f, "padded"), Some("spaced"));
        assert_eq!(non_blank_str(&f, "blank"), None);
        assert_eq!(non_blank_str(&f, "missing"), None);
    }

    #[test]
    fn str_list_drops_non_strings_and_blanks() {
        let f = sample();
        assert_eq!(str_list(&f, "tags"), vec!["indica", "sativa"]);
        assert!(str_list(&f, "name").is_empty());
    }

    #[test]
    fn int_of_accepts_integral_floats() {
        let f = sample();
        assert_eq!(int_of(&f, "price_cents"), Some(1200));
        assert_eq!(int_of(&f, "price_float"), Some(1200));
        assert_eq!(int_of(&f, "name"), None);
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }
}
