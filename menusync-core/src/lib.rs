//! The menusync batch core.
//!
//! Entry points are I/O-agnostic: flag backends, reference stores, catalog
//! persistence, and artifact storage are all reached through the port
//! traits in [`ports`]. The pipeline freezes time, flags, and lookups once
//! per batch and then runs each item through the processor state machine.

pub mod adapters;
pub mod context;
pub mod defaults;
pub mod diff;
pub mod errors;
pub mod flags;
pub mod pipeline;
pub mod ports;
pub mod preload;
pub mod processor;
pub mod settings;

pub use context::{BatchContext, ItemContext};
pub use errors::{BatchError, BuildError};
pub use pipeline::{BatchOutcome, Pipeline, PipelineBuilder};
pub use ports::{ArtifactStore, CatalogStore, FlagBackend, PutOutcome, ReferenceSource};
pub use processor::{ActionRulesets, Processor, SourceSpec};
pub use settings::PipelineSettings;
