//! The builtin rule library: external-transformer rules (field mapping and
//! action classification) and canonical create/update rules.

use crate::registry::RuleRegistry;

mod actions;
mod brand;
mod defaults;
mod fieldmap;
mod pricing;
mod strain;
mod tags;

pub use actions::{CreateActionRule, DestroyActionRule, UpdateActionRule};
pub use brand::BrandNameRule;
pub use defaults::{DefaultStatusRule, ScalarFieldsRule};
pub use fieldmap::FieldMapRule;
pub use pricing::PriceNormalizeRule;
pub use strain::StrainNameRule;
pub use tags::TagNamesRule;

pub(crate) fn register_builtins(registry: &mut RuleRegistry) {
    registry.register("FieldMapRule", FieldMapRule::factory);
    registry.register("CreateActionRule", CreateActionRule::factory);
    registry.register("UpdateActionRule", UpdateActionRule::factory);
    registry.register("DestroyActionRule", DestroyActionRule::factory);
    registry.register("BrandNameRule", BrandNameRule::factory);
    registry.register("StrainNameRule", StrainNameRule::factory);
    registry.register("TagNamesRule", TagNamesRule::factory);
    registry.register("ScalarFieldsRule", ScalarFieldsRule::factory);
    registry.register("DefaultStatusRule", DefaultStatusRule::factory);
    registry.register("PriceNormalizeRule", PriceNormalizeRule::factory);
}
