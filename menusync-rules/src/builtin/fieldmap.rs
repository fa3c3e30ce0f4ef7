//! Vendor-to-canonical field mapping with type coercion.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::meta::RuleMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Renames vendor fields to canonical names and coerces value shapes:
/// prices to integer cents, tags to a string list, statuses to lowercase.
/// Skipped for tombstoned payloads; a record being destroyed is not
/// normalized.
pub struct FieldMapRule {
    meta: RuleMeta,
    map: BTreeMap<String, String>,
}

impl FieldMapRule {
    pub const NAME: &'static str = "field_map";

    /// The default Treez mapping.
    fn default_map() -> BTreeMap<String, String> {
        [
            ("external_id", "external_id"),
            ("name", "name"),
            ("brand", "brand_name"),
            ("strain", "strain_name"),
            ("tags", "tag_names"),
            ("price_cents", "price_cents"),
            ("status", "status"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
    }

    pub fn new(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let map = match spec.params.get("map") {
            Some(_) => spec
                .str_map_param("map")
                .ok_or_else(|| ConfigError::InvalidParams {
                    class: "FieldMapRule".to_string(),
                    message: "`map` must be an object of string to string".to_string(),
                })?,
            None => Self::default_map(),
        };

        let meta = spec.decorate(
            RuleMeta::new(Self::NAME)
                .reads(map.keys().cloned())
                .writes(map.values().cloned()),
        );
        Ok(Self { meta, map })
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)?))
    }

    fn coerce(canonical: &str, value: &Value) -> Option<Value> {
        match canonical {
            "price_cents" => coerce_int(value).map(|n| json!(n)),
            "tag_names" => value.as_array().map(|items| {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                json!(names)
            }),
            "status" => value.as_str().map(|s| json!(s.trim().to_lowercase())),
            _ => match value {
                Value::String(s) => Some(json!(s.trim())),
                other => Some(other.clone()),
            },
        }
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

impl Rule for FieldMapRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        !ctx.tombstoned
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        for (vendor, canonical) in &self.map {
            let value = match ctx.payload.get(vendor) {
                Some(v) if !menusync_types::fields::is_blank(v) => v,
                _ => continue,
            };
            if let Some(coerced) = Self::coerce(canonical, value) {
                patch.insert(canonical.clone(), coerced);
            }
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use menusync_types::fields::Fields;
    use menusync_types::flags::FlagSnapshot;
    use menusync_types::item::ChangedKeys;
    use menusync_types::lookups::LookupMaps;

    fn ctx<'a>(
        payload: &'a Fields,
        flags: &'a FlagSnapshot,
        lookups: &'a LookupMaps,
        tombstoned: bool,
    ) -> EvalContext<'a> {
        EvalContext {
            payload,
            existing: None,
            changed_keys: ChangedKeys::All,
            flags,
            lookups,
            now: chrono::Utc::now(),
            tombstoned,
        }
    }

    #[test]
    fn maps_and_coerces_treez_fields() {
        let mut payload = Fields::new();
        payload.insert("external_id".to_string(), json!("X1"));
        payload.insert("name".to_string(), json!("  Blue Dream "));
        payload.insert("brand".to_string(), json!("Acme"));
        payload.insert("tags".to_string(), json!(["Indica", "  "]));
        payload.insert("price_cents".to_string(), json!("1200"));
        payload.insert("status".to_string(), json!(" ACTIVE "));

        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();
        let rule = FieldMapRule::new(&RuleSpec::default()).unwrap();
        let c = ctx(&payload, &flags, &lookups, false);

        assert!(rule.applies(&c));
        let patch = rule.apply(&c).unwrap();
        assert_eq!(patch.get("name"), Some(&json!("Blue Dream")));
        assert_eq!(patch.get("brand_name"), Some(&json!("Acme")));
        assert_eq!(patch.get("tag_names"), Some(&json!(["Indica"])));
        assert_eq!(patch.get("price_cents"), Some(&json!(1200)));
        assert_eq!(patch.get("status"), Some(&json!("active")));
        assert!(!patch.contains_key("brand"));
    }

    #[test]
    fn skips_tombstoned_payloads() {
        let payload = Fields::new();
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();
        let rule = FieldMapRule::new(&RuleSpec::default()).unwrap();
        assert!(!rule.applies(&ctx(&payload, &flags, &lookups, true)));
    }

    #[test]
    fn custom_map_param_overrides_default() {
        let mut spec = RuleSpec::default();
        spec.params
            .insert("map".to_string(), json!({"sku": "external_id"}));
        let rule = FieldMapRule::new(&spec).unwrap();
        assert!(rule.meta().reads.contains("sku"));
        assert!(rule.meta().writes.contains("external_id"));
        assert!(!rule.meta().reads.contains("brand"));
    }

    #[test]
    fn malformed_map_param_fails() {
        let mut spec = RuleSpec::default();
        spec.params.insert("map".to_string(), json!({"sku": 3}));
        assert!(matches!(
            FieldMapRule::new(&spec),
            Err(ConfigError::InvalidParams { .. })
        ));
    }
}
