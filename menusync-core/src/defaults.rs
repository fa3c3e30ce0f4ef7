//! Default ruleset configuration documents for the Treez source.
//!
//! These mirror what a deployment would ship as YAML; operators override
//! them with their own documents through the pipeline builder.

use menusync_rules::config::{OrderingOverrides, RuleEntry, RulesetDoc};
use std::collections::BTreeMap;

fn entry(class: &str, priority: i32) -> RuleEntry {
    RuleEntry {
        class: class.to_string(),
        enabled: true,
        priority,
        params: BTreeMap::new(),
        overrides: OrderingOverrides::default(),
    }
}

fn entry_after(class: &str, priority: i32, after: &[&str]) -> RuleEntry {
    let mut e = entry(class, priority);
    e.overrides.after = after.iter().map(|s| s.to_string()).collect();
    e
}

/// Field normalization plus action classification.
pub fn external_transformer_doc() -> RulesetDoc {
    RulesetDoc {
        version: "2025-06-01".to_string(),
        ruleset: "treez_external".to_string(),
        rules: vec![
            entry("FieldMapRule", 0),
            entry("CreateActionRule", 10),
            entry("UpdateActionRule", 11),
            entry("DestroyActionRule", 12),
        ],
    }
}

/// Create-mode canonical transform: aggressive defaults, unconditional
/// builds.
pub fn create_ruleset_doc() -> RulesetDoc {
    RulesetDoc {
        version: "2025-06-01".to_string(),
        ruleset: "canonical_create".to_string(),
        rules: vec![
            entry("ScalarFieldsRule", 10),
            entry_after("DefaultStatusRule", 20, &["scalar_fields_rule"]),
            entry("BrandNameRule", 30),
            entry("StrainNameRule", 31),
            entry("TagNamesRule", 32),
            entry_after("PriceNormalizeRule", 40, &["scalar_fields_rule"]),
        ],
    }
}

/// Update-mode canonical transform: conservative, changed-key gated, one
/// writer per key.
pub fn update_ruleset_doc() -> RulesetDoc {
    RulesetDoc {
        version: "2025-06-01".to_string(),
        ruleset: "canonical_update".to_string(),
        rules: vec![
            entry("ScalarFieldsRule", 10),
            entry("BrandNameRule", 30),
            entry("StrainNameRule", 31),
            entry("TagNamesRule", 32),
        ],
    }
}
