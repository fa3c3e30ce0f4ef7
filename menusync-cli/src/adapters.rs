//! File-backed port implementations for the CLI.

use anyhow::{bail, Context};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs_err as fs;
use menusync_core::ports::{ArtifactStore, CatalogStore, PutOutcome, ReferenceSource};
use menusync_types::fields::Fields;
use menusync_types::lookups::{BrandRecord, TagRecord};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::sync::Mutex;
use tracing::debug;

/// Reference data loaded once from a JSON document:
/// `{"brands": {"Acme": 42}, "strains": {...}, "tags": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonReferenceSource {
    #[serde(default)]
    brands: BTreeMap<String, i64>,

    #[serde(default)]
    strains: BTreeMap<String, i64>,

    #[serde(default)]
    tags: BTreeMap<String, i64>,
}

impl JsonReferenceSource {
    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read references {path}"))?;
        serde_json::from_str(&contents).with_context(|| format!("parse references {path}"))
    }
}

impl ReferenceSource for JsonReferenceSource {
    fn brands_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, BrandRecord>> {
        Ok(self
            .brands
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, id)| (name.clone(), BrandRecord { id: *id }))
            .collect())
    }

    fn strain_ids_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, i64>> {
        Ok(self
            .strains
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn tags_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, TagRecord>> {
        Ok(self
            .tags
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, id)| (name.clone(), TagRecord { id: *id }))
            .collect())
    }
}

/// Catalog persistence over a JSON state file keyed by
/// `source_id/external_id`. The whole state is rewritten after each
/// mutation; adequate for batch-tool usage.
pub struct JsonCatalogStore {
    path: Utf8PathBuf,
    records: Mutex<BTreeMap<String, Fields>>,
}

impl JsonCatalogStore {
    pub fn open(path: &Utf8Path) -> anyhow::Result<Self> {
        let records = if path.exists() {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read catalog {path}"))?;
            serde_json::from_str(&contents).with_context(|| format!("parse catalog {path}"))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_owned(),
            records: Mutex::new(records),
        })
    }

    fn key(source_id: &str, external_id: &str) -> String {
        format!("{source_id}/{external_id}")
    }

    fn persist(&self, records: &BTreeMap<String, Fields>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(records).context("serialize catalog")?;
        fs::write(&self.path, contents).with_context(|| format!("write catalog {}", self.path))?;
        Ok(())
    }
}

impl CatalogStore for JsonCatalogStore {
    fn find_existing(
        &self,
        source_id: &str,
        external_ids: &[String],
    ) -> anyhow::Result<BTreeMap<String, Fields>> {
        let records = self.records.lock().unwrap();
        Ok(external_ids
            .iter()
            .filter_map(|id| {
                records
                    .get(&Self::key(source_id, id))
                    .map(|record| (id.clone(), record.clone()))
            })
            .collect())
    }

    fn insert(&self, source_id: &str, external_id: &str, changes: &Fields) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        let key = Self::key(source_id, external_id);
        if records.contains_key(&key) {
            bail!("unique constraint violation on {external_id}");
        }
        records.insert(key, changes.clone());
        self.persist(&records)
    }

    fn update(
        &self,
        source_id: &str,
        external_id: &str,
        changes: &Fields,
        silent: bool,
    ) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        let key = Self::key(source_id, external_id);
        let record = match records.get_mut(&key) {
            Some(record) => record,
            None => bail!("no record for {external_id}"),
        };
        for (field, value) in changes {
            record.insert(field.clone(), value.clone());
        }
        if !silent {
            record.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }
        debug!(external_id, silent, "updated catalog record");
        self.persist(&records)
    }

    fn soft_delete(
        &self,
        source_id: &str,
        external_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        let key = Self::key(source_id, external_id);
        let record = match records.get_mut(&key) {
            Some(record) => record,
            None => bail!("no record for {external_id}"),
        };
        record.insert("deleted_at".to_string(), json!(now.to_rfc3339()));
        record.insert("deleted_reason".to_string(), json!(reason));
        self.persist(&records)
    }
}

/// Write-once artifact storage on the local filesystem. `create_new`
/// gives put-if-absent semantics; an existing object is never rewritten.
pub struct FsArtifactStore {
    root: Utf8PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put_if_absent(&self, key: &str, bytes: &[u8]) -> anyhow::Result<PutOutcome> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {path}"))?;
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);
        match file {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(bytes)
                    .with_context(|| format!("write pack {path}"))?;
                Ok(PutOutcome::Written)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyExists),
            Err(err) => Err(err).with_context(|| format!("open pack {path}")),
        }
    }
}
