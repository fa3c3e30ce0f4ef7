//! Tag name resolution against the preloaded lookup map.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

/// Resolves `tag_names` to canonical `tag_ids`. Unresolved names are
/// dropped from the list; when nothing resolves the write is dropped
/// entirely.
pub struct TagNamesRule {
    meta: RuleMeta,
}

impl TagNamesRule {
    pub const NAME: &'static str = "tag_names_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .reads(["tag_names"])
                    .writes(["tag_ids"]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for TagNamesRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.changed("tag_names") && !ctx.payload_list("tag_names").is_empty()
    }

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        let ids: Vec<i64> = ctx
            .payload_list("tag_names")
            .iter()
            .filter_map(|name| ctx.lookups.tag(name).map(|t| t.id))
            .collect();

        let mut patch = Patch::new();
        if !ids.is_empty() {
            patch.insert("tag_ids".to_string(), json!(ids));
        }
        Ok(patch)
    }
}
