//! The menusync rule engine: the rule contract, the ruleset compiler, the
//! class registry, the ruleset configuration-document loader, validation
//! contracts, and the builtin rule library.
//!
//! A ruleset is compiled once (ordering, conflict and cycle checks) and
//! then evaluated deterministically over immutable per-item contexts.

pub mod builtin;
pub mod compile;
pub mod config;
pub mod contracts;
pub mod registry;
pub mod rule;
pub mod ruleset;

pub use compile::{compile, CompileError, CompileOptions, WriteConflictPair};
pub use config::{load_ruleset, parse_ruleset_doc, ConfigError, RuleEntry, RulesetDoc};
pub use contracts::{canonical_menu_item_contract, treez_raw_contract, Contract, SchemaContract};
pub use registry::{RuleRegistry, RuleSpec};
pub use rule::{EvalContext, Rule, RuleError};
pub use ruleset::{EvalError, Evaluation, RuleSet};
