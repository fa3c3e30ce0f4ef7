//! The ruleset configuration document (YAML) and its loader.

use crate::compile::{compile, CompileError, CompileOptions};
use crate::registry::{RuleRegistry, RuleSpec};
use crate::rule::Rule;
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule class `{class}`")]
    UnknownClass { class: String },

    #[error("invalid params for `{class}`: {message}")]
    InvalidParams { class: String, message: String },

    #[error("ruleset document parse error: {message}")]
    Parse { message: String },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// One ruleset configuration document, typically one per action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetDoc {
    pub version: String,
    pub ruleset: String,

    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    pub class: String,

    #[serde(default = "enabled_default")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub params: BTreeMap<String, Value>,

    #[serde(default)]
    pub overrides: OrderingOverrides,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderingOverrides {
    #[serde(default)]
    pub before: Vec<String>,

    #[serde(default)]
    pub after: Vec<String>,
}

pub fn parse_ruleset_doc(yaml: &str) -> Result<RulesetDoc, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })
}

/// Resolves every enabled entry through the registry and compiles the
/// result. Disabled entries are skipped; unknown classes fail.
pub fn load_ruleset(
    doc: &RulesetDoc,
    registry: &RuleRegistry,
    options: CompileOptions,
) -> Result<RuleSet, ConfigError> {
    let mut rules: Vec<Arc<dyn Rule>> = Vec::new();

    for entry in &doc.rules {
        if !entry.enabled {
            debug!(class = %entry.class, ruleset = %doc.ruleset, "skipping disabled rule");
            continue;
        }
        let spec = RuleSpec {
            priority: entry.priority,
            params: entry.params.clone(),
            before: entry.overrides.before.clone(),
            after: entry.overrides.after.clone(),
        };
        rules.push(registry.resolve(&entry.class, &spec)?);
    }

    debug!(
        ruleset = %doc.ruleset,
        version = %doc.version,
        rules = rules.len(),
        "compiling ruleset document"
    );
    Ok(compile(rules, doc.version.clone(), options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
version: "2025-06-01"
ruleset: "canonical_create"
rules:
  - class: "ScalarFieldsRule"
    priority: 10
  - class: "DefaultStatusRule"
    priority: 20
  - class: "BrandNameRule"
    priority: 30
  - class: "StrainNameRule"
    enabled: false
"#;

    #[test]
    fn parses_and_loads_a_document() {
        let doc = parse_ruleset_doc(DOC).unwrap();
        assert_eq!(doc.ruleset, "canonical_create");
        assert_eq!(doc.rules.len(), 4);
        assert!(!doc.rules[3].enabled);

        let registry = RuleRegistry::builtin();
        let ruleset = load_ruleset(&doc, &registry, CompileOptions::default()).unwrap();
        assert_eq!(ruleset.version(), "2025-06-01");
        // Disabled StrainNameRule is absent from the compiled order.
        assert_eq!(ruleset.len(), 3);
        assert!(ruleset.rule("strain_name_rule").is_none());
    }

    #[test]
    fn unknown_class_fails_loading() {
        let doc = parse_ruleset_doc(
            r#"
version: "1"
ruleset: "broken"
rules:
  - class: "NoSuchRule"
"#,
        )
        .unwrap();
        let err = load_ruleset(&doc, &RuleRegistry::builtin(), CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClass { .. }));
    }

    #[test]
    fn malformed_yaml_fails_parsing() {
        assert!(matches!(
            parse_ruleset_doc("version: [unclosed"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn overrides_extend_ordering_sets() {
        let doc = parse_ruleset_doc(
            r#"
version: "1"
ruleset: "ordered"
rules:
  - class: "ScalarFieldsRule"
    priority: 1
  - class: "DefaultStatusRule"
    priority: 2
    overrides:
      after: ["scalar_fields_rule"]
"#,
        )
        .unwrap();
        let ruleset =
            load_ruleset(&doc, &RuleRegistry::builtin(), CompileOptions::default()).unwrap();
        let rule = ruleset.rule("default_status_rule").unwrap();
        assert!(rule.meta().after.contains("scalar_fields_rule"));
    }
}
