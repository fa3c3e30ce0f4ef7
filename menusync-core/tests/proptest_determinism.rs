//! Property-based determinism tests: per-item results are invariant under
//! batch permutation and across repeated runs.

use chrono::{TimeZone, Utc};
use menusync_core::adapters::{
    InMemoryArtifactStore, InMemoryCatalogStore, InMemoryReferenceSource, StaticFlagBackend,
};
use menusync_core::{Pipeline, PipelineBuilder, SourceSpec};
use menusync_types::fields::Fields;
use menusync_types::lookups::{BrandRecord, TagRecord};
use menusync_types::wire::PackV1;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn build(artifacts: Arc<InMemoryArtifactStore>) -> Pipeline {
    PipelineBuilder::new()
        .source(SourceSpec::treez("treez-sf"))
        .flag_backend(Arc::new(StaticFlagBackend::new([(
            "pricing_normalization",
            true,
        )])))
        .reference_source(Arc::new(InMemoryReferenceSource::new(
            [("Acme", BrandRecord { id: 42 })],
            [("Blue Dream", 9)],
            [("indica", TagRecord { id: 1 })],
        )))
        .catalog_store(Arc::new(InMemoryCatalogStore::new()))
        .artifact_store(artifacts)
        .build()
        .expect("pipeline builds")
}

fn arb_item() -> impl Strategy<Value = Fields> {
    (
        prop::string::string_regex("[A-Z][0-9]{1,3}").unwrap(),
        prop::option::of(prop::string::string_regex("[A-Za-z ]{1,12}").unwrap()),
        prop::option::of(prop_oneof![Just("Acme"), Just("Nobody")]),
        prop::option::of(1i64..5000),
    )
        .prop_map(|(external_id, name, brand, price)| {
            let mut item = Fields::new();
            item.insert("external_id".to_string(), json!(external_id));
            if let Some(name) = name {
                item.insert("name".to_string(), json!(name));
            }
            if let Some(brand) = brand {
                item.insert("brand".to_string(), json!(brand));
            }
            if let Some(price) = price {
                item.insert("price_cents".to_string(), json!(price));
            }
            item
        })
}

fn run_and_collect(items: Vec<Fields>) -> BTreeMap<String, (String, Vec<String>, Fields)> {
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let pipeline = build(artifacts.clone());
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    pipeline.call(items, "ing-prop", now).expect("batch runs");

    artifacts
        .keys()
        .into_iter()
        .map(|key| {
            let pack: PackV1 =
                serde_json::from_slice(&artifacts.get(&key).unwrap()).expect("pack parses");
            (
                pack.external_id.clone(),
                (pack.status, pack.fired_rules, pack.changes),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Reversing the batch changes nothing per item. Ids are deduplicated
    /// up front: with duplicates, which payload survives the filter is
    /// itself order-dependent by design.
    #[test]
    fn per_item_results_are_order_independent(items in prop::collection::vec(arb_item(), 0..6)) {
        let mut seen = std::collections::BTreeSet::new();
        let items: Vec<Fields> = items
            .into_iter()
            .filter(|item| {
                let id = item
                    .get("external_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                seen.insert(id)
            })
            .collect();

        let forward = run_and_collect(items.clone());
        let mut reversed_items = items;
        reversed_items.reverse();
        let reversed = run_and_collect(reversed_items);

        prop_assert_eq!(forward, reversed);
    }

    /// Two runs over the same batch agree exactly.
    #[test]
    fn repeated_runs_agree(items in prop::collection::vec(arb_item(), 0..6)) {
        let first = run_and_collect(items.clone());
        let second = run_and_collect(items);
        prop_assert_eq!(first, second);
    }
}
