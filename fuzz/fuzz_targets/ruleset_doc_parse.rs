#![no_main]

//! Fuzz target for ruleset configuration-document parsing and loading.

use libfuzzer_sys::fuzz_target;
use menusync_rules::{load_ruleset, parse_ruleset_doc, CompileOptions, RuleRegistry};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // YAML parse of the document - should never panic.
    let Ok(doc) = parse_ruleset_doc(s) else {
        return;
    };

    // Resolve and compile whatever parsed. Unknown classes, bad params,
    // conflicts, and cycles must surface as errors, not panics.
    let registry = RuleRegistry::builtin();
    let options = CompileOptions::default()
        .flag_manifest(["pricing_normalization"]);
    let _ = load_ruleset(&doc, &registry, options);
});
