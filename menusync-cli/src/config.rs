//! File configuration for the CLI, merged under command-line flags.

use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use menusync_core::PipelineSettings;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Optional YAML config file. Every field falls back to the pipeline
/// defaults; command-line flags override both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub env: Option<String>,

    #[serde(default)]
    pub source_id: Option<String>,

    #[serde(default)]
    pub git_sha: Option<String>,

    /// Flag values served by the static backend; the key set doubles as
    /// the default flag manifest.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,

    #[serde(default)]
    pub silent_keys: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
        serde_yaml::from_str(&contents).with_context(|| format!("parse config {path}"))
    }

    /// Settings with this file's overrides applied, then `env_override`
    /// from the command line on top.
    pub fn settings(&self, env_override: Option<&str>) -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        if let Some(env) = &self.env {
            settings.env = env.clone();
        }
        if let Some(env) = env_override {
            settings.env = env.to_string();
        }
        if let Some(git_sha) = &self.git_sha {
            settings.git_sha = git_sha.clone();
        }
        if !self.flags.is_empty() {
            settings.flag_manifest = self.flags.keys().cloned().collect();
        }
        if let Some(silent_keys) = &self.silent_keys {
            settings.silent_keys = silent_keys.iter().cloned().collect();
        }
        settings
    }
}
