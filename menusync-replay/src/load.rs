//! Versioned pack loading and artifact-directory scanning.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::glob;
use menusync_types::pack::ReplayPack;
use menusync_types::wire::PackV1;
use thiserror::Error;
use tracing::debug;

/// One scanned pack file, parse result included. Scanning is tolerant:
/// unreadable or malformed files are carried as errors rather than
/// aborting the scan.
#[derive(Debug, Clone)]
pub struct LoadedPack {
    pub path: Utf8PathBuf,
    pub pack: Result<ReplayPack, PackLoadError>,
}

#[derive(Debug, Error, Clone)]
pub enum PackLoadError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("json parse error: {message}")]
    Json { message: String },

    #[error("wire error: {message}")]
    Wire { message: String },
}

/// Parses one pack document, switching behavior on `pack_version`.
pub fn parse_pack(json: &str) -> Result<ReplayPack, PackLoadError> {
    let wire: PackV1 = serde_json::from_str(json).map_err(|e| PackLoadError::Json {
        message: e.to_string(),
    })?;
    ReplayPack::try_from(wire).map_err(|e| PackLoadError::Wire {
        message: e.to_string(),
    })
}

pub fn load_pack(path: &Utf8Path) -> LoadedPack {
    let pack = match fs::read_to_string(path) {
        Ok(contents) => parse_pack(&contents),
        Err(e) => Err(PackLoadError::Io {
            message: e.to_string(),
        }),
    };
    LoadedPack {
        path: path.to_owned(),
        pack,
    }
}

/// Scans `root` recursively for pack documents, in deterministic path
/// order.
pub fn scan_packs(root: &Utf8Path) -> anyhow::Result<Vec<LoadedPack>> {
    let pattern = root.join("**").join("*.json");
    debug!(pattern = %pattern, "scanning for replay packs");

    let mut out = Vec::new();
    for entry in glob(pattern.as_str())? {
        let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
        let utf8_path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| anyhow::anyhow!("non-utf8 path: {}", p.display()))?;
        out.push(load_pack(&utf8_path));
    }

    // Deterministic order matters.
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
