//! Strain name resolution against the preloaded lookup map.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

/// Resolves `strain_name` to a canonical `strain_id`; unresolved names
/// drop the write.
pub struct StrainNameRule {
    meta: RuleMeta,
}

impl StrainNameRule {
    pub const NAME: &'static str = "strain_name_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .reads(["strain_name"])
                    .writes(["strain_id"]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for StrainNameRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.changed("strain_name") && ctx.payload_str("strain_name").is_some()
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let mut patch = Patch::new();
        if let Some(name) = ctx.payload_str("strain_name") {
            if let Some(id) = ctx.lookups.strain_id(name) {
                patch.insert("strain_id".to_string(), json!(id));
            }
        }
        Ok(patch)
    }
}
