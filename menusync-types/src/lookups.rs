//! Batch-scoped, read-only reference caches.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A resolved brand reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRecord {
    pub id: i64,
}

/// A resolved tag reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
}

/// The three reference maps for one batch: brands and tags by vendor name,
/// strains by name. Populated entirely at batch start and never mutated;
/// rules only read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupMaps {
    #[serde(default)]
    pub brands: BTreeMap<String, BrandRecord>,

    #[serde(default)]
    pub strains: BTreeMap<String, i64>,

    #[serde(default)]
    pub tags: BTreeMap<String, TagRecord>,
}

impl LookupMaps {
    pub fn brand(&self, name: &str) -> Option<&BrandRecord> {
        self.brands.get(name)
    }

    pub fn strain_id(&self, name: &str) -> Option<i64> {
        self.strains.get(name).copied()
    }

    pub fn tag(&self, name: &str) -> Option<&TagRecord> {
        self.tags.get(name)
    }

    /// The slice of these maps consulted for one item, keyed by the names
    /// the item's payload references. Used for replay-pack resolver
    /// snapshots.
    pub fn slice(
        &self,
        brand_names: &BTreeSet<String>,
        strain_names: &BTreeSet<String>,
        tag_names: &BTreeSet<String>,
    ) -> LookupMaps {
        LookupMaps {
            brands: self
                .brands
                .iter()
                .filter(|(name, _)| brand_names.contains(*name))
                .map(|(name, rec)| (name.clone(), *rec))
                .collect(),
            strains: self
                .strains
                .iter()
                .filter(|(name, _)| strain_names.contains(*name))
                .map(|(name, id)| (name.clone(), *id))
                .collect(),
            tags: self
                .tags
                .iter()
                .filter(|(name, _)| tag_names.contains(*name))
                .map(|(name, rec)| (name.clone(), *rec))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> LookupMaps {
        let mut m = LookupMaps::default();
        m.brands.insert("Acme".to_string(), BrandRecord { id: 42 });
        m.brands.insert("Zenith".to_string(), BrandRecord { id: 7 });
        m.strains.insert("Blue Dream".to_string(), 9);
        m.tags.insert("indica".to_string(), TagRecord { id: 1 });
        m.tags.insert("sativa".to_string(), TagRecord { id: 2 });
        m
    }

    #[test]
    fn slice_keeps_only_referenced_names() {
        let m = maps();
        let brands: BTreeSet<String> = ["Acme".to_string()].into_iter().collect();
        let strains: BTreeSet<String> = BTreeSet::new();
        let tags: BTreeSet<String> = ["sativa".to_string(), "unknown".to_string()]
            .into_iter()
            .collect();

        let slice = m.slice(&brands, &strains, &tags);
        assert_eq!(slice.brands.len(), 1);
        assert_eq!(slice.brand("Acme").map(|b| b.id), Some(42));
        assert!(slice.strains.is_empty());
        assert_eq!(slice.tags.len(), 1);
        assert_eq!(slice.tag("sativa").map(|t| t.id), Some(2));
    }
}
