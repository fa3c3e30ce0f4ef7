//! Action classification: create, update, or destroy.
//!
//! The three rules are mutually exclusive over (existing presence,
//! tombstone) and share the `action` key, so they carry explicit ordering
//! edges to satisfy the compile-time conflict check.

use crate::config::ConfigError;
use crate::registry::RuleSpec;
use crate::rule::{EvalContext, Rule, RuleError};
use menusync_types::fields::Patch;
use menusync_types::item::Action;
use menusync_types::meta::RuleMeta;
use serde_json::json;
use std::sync::Arc;

fn action_patch(action: Action) -> Patch {
    let mut patch = Patch::new();
    patch.insert("action".to_string(), json!(action.as_str()));
    patch
}

/// No existing record and no tombstone: the item is new.
pub struct CreateActionRule {
    meta: RuleMeta,
}

impl CreateActionRule {
    pub const NAME: &'static str = "create_action_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(RuleMeta::new(Self::NAME).writes(["action"])),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for CreateActionRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.existing.is_none() && !ctx.tombstoned
    }

    fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        Ok(action_patch(Action::Create))
    }
}

/// An existing record and no tombstone: reconcile in place.
pub struct UpdateActionRule {
    meta: RuleMeta,
}

impl UpdateActionRule {
    pub const NAME: &'static str = "update_action_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .writes(["action"])
                    .after([CreateActionRule::NAME]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for UpdateActionRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.existing.is_some() && !ctx.tombstoned
    }

    fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        Ok(action_patch(Action::Update))
    }
}

/// An existing record with an explicit tombstone: soft delete. Tombstones
/// are never inferred.
pub struct DestroyActionRule {
    meta: RuleMeta,
}

impl DestroyActionRule {
    pub const NAME: &'static str = "destroy_action_rule";

    pub fn new(spec: &RuleSpec) -> Self {
        Self {
            meta: spec.decorate(
                RuleMeta::new(Self::NAME)
                    .writes(["action"])
                    .after([UpdateActionRule::NAME]),
            ),
        }
    }

    pub fn factory(spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        Ok(Arc::new(Self::new(spec)))
    }
}

impl Rule for DestroyActionRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.existing.is_some() && ctx.tombstoned
    }

    fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        Ok(action_patch(Action::Destroy))
    }
}
