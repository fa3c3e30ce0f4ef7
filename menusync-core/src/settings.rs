//! Clap-free settings for the batch pipeline.

use menusync_types::meta::MergePolicy;
use std::collections::BTreeSet;

/// Batch-invariant configuration handed to the pipeline builder.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub env: String,
    pub app_version: String,
    pub git_sha: String,

    /// The closed set of flag names the batch snapshots and rules may
    /// declare.
    pub flag_manifest: BTreeSet<String>,

    /// Fields whose updates bypass model-level hooks. An update whose
    /// change set lies entirely inside this set takes the silent
    /// persistence path.
    pub silent_keys: BTreeSet<String>,

    // Merge policies per compiled ruleset.
    pub external_policy: MergePolicy,
    pub create_policy: MergePolicy,
    pub update_policy: MergePolicy,

    /// Synthesize writer-before-reader edges during compilation.
    pub synthesize_data_edges: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: "unknown".to_string(),
            flag_manifest: ["pricing_normalization".to_string()].into_iter().collect(),
            silent_keys: ["price_cents".to_string()].into_iter().collect(),
            external_policy: MergePolicy::ErrorOnConflict,
            create_policy: MergePolicy::LastWins,
            update_policy: MergePolicy::ErrorOnConflict,
            synthesize_data_edges: false,
        }
    }
}
