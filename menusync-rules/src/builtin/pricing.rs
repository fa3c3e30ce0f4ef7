//! Flag-gated price normalization.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

pub const PRICING_FLAG: &str = "pricing_normalization";

/// Rounds fractional cent values and drops non-positive prices from the
/// change set, behind the `pricing_normalization` flag.
pub struct PriceNormalizeRule {
    meta: RuleMeta,
}

impl PriceNormalizeRule {
    pub const NAME: &'static str = "price_normalize_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .reads(["price_cents"])
                    .writes(["price_cents"])
                    .flags([PRICING_FLAG]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for PriceNormalizeRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.flag_on(PRICING_FLAG)
            && ctx.changed("price_cents")
            && ctx.payload.contains_key("price_cents")
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        let rounded = match ctx.payload.get("price_cents") {
            Some(value) => match value.as_i64() {
                Some(n) => Some(n),
                None => value.as_f64().map(|f| f.round() as i64),
            },
            None => None,
        };
        if let Some(cents) = rounded {
            if cents > 0 {
                patch.insert("price_cents".to_string(), json!(cents));
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
    use std::collections::BTreeMap;

    fn flags(on: bool) -> FlagSnapshot {
        FlagSnapshot::new(BTreeMap::from([(PRICING_FLAG.to_string(), on)]))
    }

    fn price_payload(value: serde_json::Value) -> Fields {
        let mut f = Fields::new();
        f.insert("price_cents".to_string(), value);
        f
    }

    #[test]
    fn gated_off_by_flag() {
        let payload = price_payload(json!(1200));
        let off = flags(false);
        let lookups = LookupMaps::default();
        let rule = PriceNormalizeRule::new(&RuleSpec::default());
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::All,
            flags: &off,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(!rule.applies(&ctx));
    }

    #[test]
    fn rounds_fractional_and_drops_non_positive() {
        let on = flags(true);
        let lookups = LookupMaps::default();
        let rule = PriceNormalizeRule::new(&RuleSpec::default());

        let payload = price_payload(json!(1199.6));
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::All,
            flags: &on,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(rule.applies(&ctx));
        assert_eq!(
            rule.apply(&ctx).unwrap().get("price_cents"),
            Some(&json!(1200))
        );

        let payload = price_payload(json!(-5));
        let ctx = EvalContext {
            payload: &payload,
            existing: None,
            changed_keys: ChangedKeys::All,
            flags: &on,
            lookups: &lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        };
        assert!(rule.apply(&ctx).unwrap().is_empty());
    }

    #[test]
    fn declares_its_flag_in_meta() {
        let rule = PriceNormalizeRule::new(&RuleSpec::default());
        assert!(rule.meta().flags.contains(PRICING_FLAG));
    }
}
