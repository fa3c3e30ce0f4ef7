//! Batch-fatal and construction-time error types.
//!
//! Item-scoped failures never appear here: they are recovered locally into
//! the item's violations and a terminal `rejected` status.

use menusync_rules::{CompileError, ConfigError};
use thiserror::Error;

/// Pipeline construction failures. The pipeline refuses to accept work
/// when any ruleset fails to compile.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("pipeline builder is missing {what}")]
    Missing { what: &'static str },
}

/// Batch-fatal failures: the batch aborts before (or without) processing
/// items.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("flag snapshot failed: {0:#}")]
    Flags(anyhow::Error),

    #[error("reference preload failed: {0:#}")]
    Preload(anyhow::Error),

    #[error("existing-record resolution failed: {0:#}")]
    Resolve(anyhow::Error),

    #[error("replay pack write failed for {key}: {source:#}")]
    Artifact {
        key: String,
        source: anyhow::Error,
    },

    #[error("replay pack serialization failed for {external_id}: {message}")]
    PackEncode {
        external_id: String,
        message: String,
    },
}
