//! Scalar field carry-over and create-mode defaults.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::{self, Patch};
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_SCALARS: &[&str] = &["external_id", "name", "price_cents", "status"];

/// Copies changed scalar fields from the mapped payload into the change
/// set. Creates carry the `All` sentinel, so every present field copies;
/// updates copy only what actually changed.
pub struct ScalarFieldsRule {
    meta: RuleMeta,
    fields: Vec<String>,
}

impl ScalarFieldsRule {
    pub const NAME: &'static str = "scalar_fields_rule";

    pub fn new(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let fields = match spec.params.get("fields") {
            Some(_) => spec
                .str_list_param("fields")
                .ok_or_else(|| ConfigError::InvalidParams {
                    class: "ScalarFieldsRule".to_string(),
                    message: "`fields` must be a list of strings".to_string(),
                })?,
            None => DEFAULT_SCALARS.iter().map(|s| s.to_string()).collect(),
        };

        let meta = spec.decorate(
            RuleMeta::new(Self::NAME)
                .reads(fields.iter().cloned())
                .writes(fields.iter().cloned()),
        );
        Ok(Self { meta, fields })
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)?))
    }
}

impl Rule for ScalarFieldsRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        self.fields
            .iter()
            .any(|f| ctx.changed(f) && ctx.payload.get(f).map(|v| !fields::is_blank(v)).unwrap_or(false))
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        for field in &self.fields {
            if !ctx.changed(field) {
                continue;
            }
            if let Some(value) = ctx.payload.get(field) {
                if !fields::is_blank(value) {
                    patch.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(patch)
    }
}

/// Create-mode default: an item arriving without a status is active.
pub struct DefaultStatusRule {
    meta: RuleMeta,
}

impl DefaultStatusRule {
    pub const NAME: &'static str = "default_status_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(RuleMeta::new(Self::NAME).writes(["status"])),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for DefaultStatusRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.payload_str("status").is_none()
    }

    fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        patch.insert("status".to_string(), json!("active"));
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
        changed_keys: ChangedKeys,
    ) -> EvalContext<'a> {
        EvalContext {
            payload,
            existing: None,
            changed_keys,
            flags,
            lookups,
            now: chrono::Utc::now(),
            tombstoned: false,
        }
    }

    #[test]
    fn create_copies_every_present_scalar() {
        let mut payload = Fields::new();
        payload.insert("external_id".to_string(), json!("X1"));
        payload.insert("name".to_string(), json!("Blue Dream"));
        payload.insert("price_cents".to_string(), json!(1200));
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();

        let rule = ScalarFieldsRule::new(&RuleSpec::default()).unwrap();
        let c = ctx(&payload, &flags, &lookups, ChangedKeys::All);
        let patch = rule.apply(&c).unwrap();
        assert_eq!(patch.len(), 3);
        assert_eq!(patch.get("name"), Some(&json!("Blue Dream")));
    }

    #[test]
    fn update_copies_only_changed_scalars() {
        let mut payload = Fields::new();
        payload.insert("name".to_string(), json!("Blue Dream"));
        payload.insert("price_cents".to_string(), json!(1500));
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();

        let rule = ScalarFieldsRule::new(&RuleSpec::default()).unwrap();
        let c = ctx(
            &payload,
            &flags,
            &lookups,
            ChangedKeys::from_keys(["price_cents"]),
        );
        let patch = rule.apply(&c).unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("price_cents"), Some(&json!(1500)));
    }

    #[test]
    fn default_status_applies_only_when_absent() {
        let blank = Fields::new();
        let flags = FlagSnapshot::empty();
        let lookups = LookupMaps::default();
        let rule = DefaultStatusRule::new(&RuleSpec::default());

        let c = ctx(&blank, &flags, &lookups, ChangedKeys::All);
        assert!(rule.applies(&c));
        assert_eq!(rule.apply(&c).unwrap().get("status"), Some(&json!("active")));

        let mut with_status = Fields::new();
        with_status.insert("status".to_string(), json!("inactive"));
        let c = ctx(&with_status, &flags, &lookups, ChangedKeys::All);
        assert!(!rule.applies(&c));
    }
}
