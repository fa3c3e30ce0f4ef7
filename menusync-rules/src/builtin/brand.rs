//! Brand name resolution against the preloaded lookup map.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

/// Resolves `brand_name` to a canonical `brand_id`. Unresolved names drop
/// the write; the brand reference is optional and is never nulled.
pub struct BrandNameRule {
    meta: RuleMeta,
}

impl BrandNameRule {
    pub const NAME: &'static str = "brand_name_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .reads(["brand_name"])
                    .writes(["brand_id"]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for BrandNameRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.changed("brand_name") && ctx.payload_str("brand_name").is_some()
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        if let Some(name) = ctx.payload_str("brand_name") {
            if let Some(record) = ctx.lookups.brand(name) {
                patch.insert("brand_id".to_string(), json!(record.id));
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
    use menusync_types::lookups::{BrandRecord, LookupMaps};

    fn payload_with_brand(name: &str) -> Fields {
        let mut f = Fields::new();
        f.insert("brand_name".to_string(), json!(name));
        f
    }

    #[test]
    fn resolves_known_brand() {
        let payload = payload_with_brand("Acme");
        let flags = FlagSnapshot::empty();
        let mut lookups = LookupMaps::default();
        lookups
            .brands
            .insert("Acme".to_string(), BrandRecord { id: 42 });

        let rule = BrandNameRule::new(&RuleSpec::default());
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::All,
            flags: &flags,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(rule.applies(&ctx));
        let patch = rule.apply(&ctx).unwrap();
        assert_eq!(patch.get("brand_id"), Some(&json!(42)));
    }

    #[test]
    fn unresolved_brand_drops_the_write() {
        let payload = payload_with_brand("Unknown");
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();

        let rule = BrandNameRule::new(&RuleSpec::default());
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::from_keys(["brand_name"]),
            flags: &flags,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(rule.applies(&ctx));
        assert!(rule.apply(&ctx).unwrap().is_empty());
    }

    #[test]
    fn unchanged_brand_does_not_apply() {
        let payload = payload_with_brand("Acme");
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();

        let rule = BrandNameRule::new(&RuleSpec::default());
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::from_keys(["price_cents"]),
            flags: &flags,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(!rule.applies(&ctx));
    }
}
