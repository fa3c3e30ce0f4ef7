//! Compile-time-registered mapping from rule class names to factories.
//!
//! The ruleset configuration document references rules by class name; the
//! loader resolves them here. Unknown classes fail loading.

use crate::builtin;
use crate::config::ConfigError;
use crate::rule::Rule;
use menusync_types::meta::RuleMeta;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Instantiation inputs for one configured rule: priority, free-form
/// params, and ordering overrides from the document.
#[derive(Debug, Clone, Default)]
pub struct RuleSpec {
    pub priority: i32,
    pub params: BTreeMap<String, Value>,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl RuleSpec {
    /// Applies the configured priority and ordering overrides to a rule's
    /// base metadata.
    pub fn decorate(&self, meta: RuleMeta) -> RuleMeta {
        meta.priority(self.priority)
            .before(self.before.iter().cloned())
            .after(self.after.iter().cloned())
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    /// A `{string: string}` object param, e.g. a field mapping.
    pub fn str_map_param(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let object = self.params.get(key)?.as_object()?;
        let mut out = BTreeMap::new();
        for (k, v) in object {
            out.insert(k.clone(), v.as_str()?.to_string());
        }
        Some(out)
    }

    pub fn str_list_param(&self, key: &str) -> Option<Vec<String>> {
        let items = self.params.get(key)?.as_array()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(item.as_str()?.to_string());
        }
        Some(out)
    }
}

pub type RuleFactory = fn(&RuleSpec) -> Result<Arc<dyn Rule>, ConfigError>;

/// Class-name registry. No runtime reflection: every class is registered
/// up front, and resolution is a plain map lookup.
pub struct RuleRegistry {
    factories: BTreeMap<String, RuleFactory>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The registry with every builtin rule class registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, class: impl Into<String>, factory: RuleFactory) {
        self.factories.insert(class.into(), factory);
    }

    pub fn resolve(&self, class: &str, spec: &RuleSpec) -> Result<Arc<dyn Rule>, ConfigError> {
        match self.factories.get(class) {
            Some(factory) => factory(spec),
            None => Err(ConfigError::UnknownClass {
                class: class.to_string(),
            }),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Metadata for every class that instantiates under a default spec.
    /// Used for listing; classes requiring params are skipped.
    pub fn describe(&self) -> Vec<(String, RuleMeta)> {
        let spec = RuleSpec::default();
        let mut out = Vec::new();
        for (class, factory) in &self.factories {
            if let Ok(rule) = factory(&spec) {
                out.push((class.clone(), rule.meta().clone()));
            }
        }
        out
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_known_classes() {
        let registry = RuleRegistry::builtin();
        let spec = RuleSpec::default();
        assert!(registry.resolve("BrandNameRule", &spec).is_ok());
        assert!(registry.resolve("FieldMapRule", &spec).is_ok());
    }

    #[test]
    fn unknown_class_fails() {
        let registry = RuleRegistry::builtin();
        let err = registry
            .resolve("PhantomRule", &RuleSpec::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClass { .. }));
    }

    #[test]
    fn describe_lists_every_builtin() {
        let registry = RuleRegistry::builtin();
        let described = registry.describe();
        assert_eq!(described.len(), registry.classes().count());
    }
}
