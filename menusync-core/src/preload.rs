//! Batch-scoped reference preloading.
//!
//! The preloader is the only component allowed to issue reference queries.
//! It collects the distinct names referenced anywhere in the batch and
//! issues one bulk query per reference kind; rules then read the frozen
//! maps. Backend failures are batch-fatal; a partial preload would
//! undermine determinism.

use crate::errors::BatchError;
use crate::ports::ReferenceSource;
use menusync_types::fields::{self, Fields};
use menusync_types::lookups::LookupMaps;
use std::collections::BTreeSet;
use tracing::debug;

pub struct Preloader<'a> {
    references: &'a dyn ReferenceSource,
}

impl<'a> Preloader<'a> {
    pub fn new(references: &'a dyn ReferenceSource) -> Self {
        Self { references }
    }

    pub fn preload(&self, items: &[Fields]) -> Result<LookupMaps, BatchError> {
        let mut brand_names: BTreeSet<String> = BTreeSet::new();
        let mut strain_names: BTreeSet<String> = BTreeSet::new();
        let mut tag_names: BTreeSet<String> = BTreeSet::new();

        // Preload runs before the external transform, so the vendor
        // aliases are accepted alongside the normalized names.
        for payload in items {
            if let Some(name) = first_str(payload, &["brand_name", "brand"]) {
                brand_names.insert(name.to_string());
            }
            if let Some(name) = first_str(payload, &["strain_name", "strain"]) {
                strain_names.insert(name.to_string());
            }
            for key in ["tag_names", "tags"] {
                let names = fields::str_list(payload, key);
                if !names.is_empty() {
                    tag_names.extend(names);
                    break;
                }
            }
        }

        debug!(
            brands = brand_names.len(),
            strains = strain_names.len(),
            tags = tag_names.len(),
            "preloading reference lookups"
        );

        let mut maps = LookupMaps::default();
        if !brand_names.is_empty() {
            maps.brands = self
                .references
                .brands_by_name(&brand_names)
                .map_err(BatchError::Preload)?;
        }
        if !strain_names.is_empty() {
            maps.strains = self
                .references
                .strain_ids_by_name(&strain_names)
                .map_err(BatchError::Preload)?;
        }
        if !tag_names.is_empty() {
            maps.tags = self
                .references
                .tags_by_name(&tag_names)
                .map_err(BatchError::Preload)?;
        }

        Ok(maps)
    }
}

fn first_str<'f>(payload: &'f Fields, keys: &[&str]) -> Option<&'f str> {
    keys.iter()
        .find_map(|key| fields::non_blank_str(payload, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryReferenceSource;
    use menusync_types::lookups::{BrandRecord, TagRecord};
    use serde_json::json;

    fn item(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn collects_distinct_names_across_the_batch() {
        let source = InMemoryReferenceSource::new(
            [("Acme", BrandRecord { id: 42 })],
            [("Blue Dream", 9)],
            [("indica", TagRecord { id: 1 })],
        );
        let items = vec![
            item(&[("brand", json!("Acme")), ("tags", json!(["indica"]))]),
            item(&[("brand", json!("Acme")), ("strain", json!("Blue Dream"))]),
            item(&[("brand", json!("  "))]),
        ];

        let maps = Preloader::new(&source).preload(&items).unwrap();
        assert_eq!(maps.brand("Acme").map(|b| b.id), Some(42));
        assert_eq!(maps.strain_id("Blue Dream"), Some(9));
        assert_eq!(maps.tag("indica").map(|t| t.id), Some(1));
        assert_eq!(source.query_count(), 3);
    }

    #[test]
    fn empty_batch_issues_no_queries() {
        let source = InMemoryReferenceSource::empty();
        let maps = Preloader::new(&source).preload(&[]).unwrap();
        assert_eq!(maps, LookupMaps::default());
        assert_eq!(source.query_count(), 0);
    }

    #[test]
    fn backend_failure_is_batch_fatal() {
        let source = InMemoryReferenceSource::failing();
        let items = vec![item(&[("brand", json!("Acme"))])];
        let err = Preloader::new(&source).preload(&items).unwrap_err();
        assert!(matches!(err, BatchError::Preload(_)));
    }
}
