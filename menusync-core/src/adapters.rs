//! In-memory port implementations for embedding and testing.

use crate::ports::{ArtifactStore, CatalogStore, FlagBackend, PutOutcome, ReferenceSource};
use anyhow::bail;
use chrono::{DateTime, Utc};
use menusync_types::fields::Fields;
use menusync_types::lookups::{BrandRecord, TagRecord};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Flag backend over a fixed map. Flags the map does not name read as
/// off; a failing instance simulates a backend outage.
pub struct StaticFlagBackend {
    values: BTreeMap<String, bool>,
    fail: bool,
}

impl StaticFlagBackend {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            values: BTreeMap::new(),
            fail: true,
        }
    }
}

impl FlagBackend for StaticFlagBackend {
    fn enabled(&self, flag: &str, _actor: &str) -> anyhow::Result<bool> {
        if self.fail {
            bail!("flag backend unavailable");
        }
        Ok(self.values.get(flag).copied().unwrap_or(false))
    }
}

/// Reference source over fixed maps, counting bulk queries.
pub struct InMemoryReferenceSource {
    brands: BTreeMap<String, BrandRecord>,
    strains: BTreeMap<String, i64>,
    tags: BTreeMap<String, TagRecord>,
    fail: bool,
    queries: AtomicUsize,
}

impl InMemoryReferenceSource {
    pub fn new<B, S, T>(brands: B, strains: S, tags: T) -> Self
    where
        B: IntoIterator<Item = (&'static str, BrandRecord)>,
        S: IntoIterator<Item = (&'static str, i64)>,
        T: IntoIterator<Item = (&'static str, TagRecord)>,
    {
        Self {
            brands: brands
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            strains: strains
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            tags: tags.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            fail: false,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new([], [], [])
    }

    pub fn failing() -> Self {
        let mut source = Self::empty();
        source.fail = true;
        source
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn tick(&self) -> anyhow::Result<()> {
        if self.fail {
            bail!("reference backend unavailable");
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ReferenceSource for InMemoryReferenceSource {
    fn brands_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, BrandRecord>> {
        self.tick()?;
        Ok(self
            .brands
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, rec)| (name.clone(), *rec))
            .collect())
    }

    fn strain_ids_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, i64>> {
        self.tick()?;
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
        self.tick()?;
        Ok(self
            .tags
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, rec)| (name.clone(), *rec))
            .collect())
    }
}

/// Store operations recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Insert { external_id: String },
    Update { external_id: String, silent: bool },
    SoftDelete { external_id: String, reason: String },
}

/// Catalog store over a keyed map, with per-operation recording. Inserts
/// collide on existing keys the way a unique constraint would.
pub struct InMemoryCatalogStore {
    records: Mutex<BTreeMap<(String, String), Fields>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn seeded<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str, Fields)>,
    {
        let store = Self::new();
        {
            let mut map = store.records.lock().unwrap();
            for (source_id, external_id, record) in records {
                map.insert((source_id.to_string(), external_id.to_string()), record);
            }
        }
        store
    }

    pub fn record(&self, source_id: &str, external_id: &str) -> Option<Fields> {
        self.records
            .lock()
            .unwrap()
            .get(&(source_id.to_string(), external_id.to_string()))
            .cloned()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryCatalogStore {
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
                    .get(&(source_id.to_string(), id.clone()))
                    .map(|record| (id.clone(), record.clone()))
            })
            .collect())
    }

    fn insert(&self, source_id: &str, external_id: &str, changes: &Fields) -> anyhow::Result<()> {
        let key = (source_id.to_string(), external_id.to_string());
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            bail!("unique constraint violation on {external_id}");
        }
        records.insert(key, changes.clone());
        self.ops.lock().unwrap().push(StoreOp::Insert {
            external_id: external_id.to_string(),
        });
        Ok(())
    }

    fn update(
        &self,
        source_id: &str,
        external_id: &str,
        changes: &Fields,
        silent: bool,
    ) -> anyhow::Result<()> {
        let key = (source_id.to_string(), external_id.to_string());
        let mut records = self.records.lock().unwrap();
        let record = match records.get_mut(&key) {
            Some(record) => record,
            None => bail!("no record for {external_id}"),
        };
        for (field, value) in changes {
            record.insert(field.clone(), value.clone());
        }
        self.ops.lock().unwrap().push(StoreOp::Update {
            external_id: external_id.to_string(),
            silent,
        });
        Ok(())
    }

    fn soft_delete(
        &self,
        source_id: &str,
        external_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let key = (source_id.to_string(), external_id.to_string());
        let mut records = self.records.lock().unwrap();
        let record = match records.get_mut(&key) {
            Some(record) => record,
            None => bail!("no record for {external_id}"),
        };
        record.insert("deleted_at".to_string(), json!(now.to_rfc3339()));
        record.insert("deleted_reason".to_string(), json!(reason));
        self.ops.lock().unwrap().push(StoreOp::SoftDelete {
            external_id: external_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }
}

/// Write-once artifact store over a keyed map.
pub struct InMemoryArtifactStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put_if_absent(&self, key: &str, bytes: &[u8]) -> anyhow::Result<PutOutcome> {
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Ok(PutOutcome::AlreadyExists);
        }
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(PutOutcome::Written)
    }
}
