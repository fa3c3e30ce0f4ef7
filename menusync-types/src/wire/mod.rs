//! Wire-level (schema-exact) representations of persisted artifacts.

pub mod pack_v1;

pub use pack_v1::PackV1;

/// Errors emitted while converting between internal and wire models.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("unknown status `{status}` in pack for {external_id}")]
    UnknownStatus {
        status: String,
        external_id: String,
    },

    #[error("unsupported pack_version {version}")]
    UnsupportedVersion { version: i64 },
}
