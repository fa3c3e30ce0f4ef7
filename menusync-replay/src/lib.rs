//! Replay pack loading and deterministic re-execution.
//!
//! A pack is self-contained: the runner rebuilds the evaluation context
//! from recorded values only and re-executes the recorded rule order,
//! reporting any divergence from what the pipeline originally produced.

pub mod load;
pub mod runner;

pub use load::{load_pack, parse_pack, scan_packs, LoadedPack, PackLoadError};
pub use runner::{ReplayReport, ReplayStep, Replayer};
