//! Batch orchestration: context freezing, the duplicate filter, per-item
//! processing, outcome aggregation, and replay-pack emission.

use crate::context::{BatchContext, ItemContext};
use crate::defaults;
use crate::errors::{BatchError, BuildError};
use crate::flags::snapshot_flags;
use crate::ports::{ArtifactStore, CatalogStore, FlagBackend, PutOutcome, ReferenceSource};
use crate::preload::Preloader;
use crate::processor::{ActionRulesets, Processor, SourceSpec};
use crate::settings::PipelineSettings;
use chrono::{DateTime, Utc};
use menusync_rules::config::RulesetDoc;
use menusync_rules::{
    canonical_menu_item_contract, load_ruleset, CompileOptions, RuleRegistry, SchemaContract,
};
use menusync_types::fields::{self, Fields};
use menusync_types::flags::fingerprint;
use menusync_types::item::{Action, BatchSummary, OutcomeRecord};
use menusync_types::lookups::LookupMaps;
use menusync_types::pack::{ReplayPack, RuleOrderEntry};
use menusync_types::schema;
use menusync_types::wire::PackV1;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// The aggregated result of one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Per-item records, ordered by input index.
    pub outcomes: Vec<OutcomeRecord>,
    pub summary: BatchSummary,
    pub ingest_id: String,
    pub ruleset_version: String,
    pub flags_version: String,
}

/// Constructs pipelines. Compilation happens here: a pipeline that built
/// successfully holds frozen rulesets and refuses no work at call time.
pub struct PipelineBuilder {
    settings: PipelineSettings,
    registry: RuleRegistry,
    source: Option<SourceSpec>,
    external_doc: RulesetDoc,
    create_doc: RulesetDoc,
    update_doc: RulesetDoc,
    flags: Option<Arc<dyn FlagBackend>>,
    references: Option<Arc<dyn ReferenceSource>>,
    store: Option<Arc<dyn CatalogStore>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            settings: PipelineSettings::default(),
            registry: RuleRegistry::builtin(),
            source: None,
            external_doc: defaults::external_transformer_doc(),
            create_doc: defaults::create_ruleset_doc(),
            update_doc: defaults::update_ruleset_doc(),
            flags: None,
            references: None,
            store: None,
            artifacts: None,
        }
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn source(mut self, source: SourceSpec) -> Self {
        self.source = Some(source);
        self
    }

    pub fn external_doc(mut self, doc: RulesetDoc) -> Self {
        self.external_doc = doc;
        self
    }

    pub fn create_doc(mut self, doc: RulesetDoc) -> Self {
        self.create_doc = doc;
        self
    }

    pub fn update_doc(mut self, doc: RulesetDoc) -> Self {
        self.update_doc = doc;
        self
    }

    pub fn flag_backend(mut self, backend: Arc<dyn FlagBackend>) -> Self {
        self.flags = Some(backend);
        self
    }

    pub fn reference_source(mut self, references: Arc<dyn ReferenceSource>) -> Self {
        self.references = Some(references);
        self
    }

    pub fn catalog_store(mut self, store: Arc<dyn CatalogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let source = self.source.ok_or(BuildError::Missing { what: "source" })?;
        let flags = self
            .flags
            .ok_or(BuildError::Missing { what: "flag backend" })?;
        let references = self.references.ok_or(BuildError::Missing {
            what: "reference source",
        })?;
        let store = self.store.ok_or(BuildError::Missing {
            what: "catalog store",
        })?;
        let artifacts = self.artifacts.ok_or(BuildError::Missing {
            what: "artifact store",
        })?;

        let options = |policy| CompileOptions {
            merge_policy: policy,
            synthesize_data_edges: self.settings.synthesize_data_edges,
            flag_manifest: self.settings.flag_manifest.clone(),
        };

        let rulesets = ActionRulesets {
            external: load_ruleset(
                &self.external_doc,
                &self.registry,
                options(self.settings.external_policy),
            )?,
            create: load_ruleset(
                &self.create_doc,
                &self.registry,
                options(self.settings.create_policy),
            )?,
            update: load_ruleset(
                &self.update_doc,
                &self.registry,
                options(self.settings.update_policy),
            )?,
        };

        let ruleset_version = fingerprint(
            format!(
                "external={};create={};update={}",
                rulesets.external.version(),
                rulesets.create.version(),
                rulesets.update.version(),
            )
            .as_bytes(),
        );

        info!(
            source_id = %source.source_id,
            ruleset_version = %ruleset_version,
            "pipeline compiled"
        );

        Ok(Pipeline {
            settings: self.settings,
            source,
            rulesets,
            canonical_contract: canonical_menu_item_contract(),
            ruleset_version,
            flags,
            references,
            store,
            artifacts,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    source: SourceSpec,
    rulesets: ActionRulesets,
    canonical_contract: SchemaContract,
    ruleset_version: String,
    flags: Arc<dyn FlagBackend>,
    references: Arc<dyn ReferenceSource>,
    store: Arc<dyn CatalogStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .field("ruleset_version", &self.ruleset_version)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn ruleset_version(&self) -> &str {
        &self.ruleset_version
    }

    pub fn rulesets(&self) -> &ActionRulesets {
        &self.rulesets
    }

    /// Runs one batch. `now` is the frozen batch clock; nothing below this
    /// call reads a wall clock.
    pub fn call(
        &self,
        items: Vec<Fields>,
        ingest_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, BatchError> {
        let filtered = filter_duplicates(items);

        let external_ids: Vec<String> = filtered
            .iter()
            .filter_map(|payload| fields::non_blank_str(payload, "external_id"))
            .map(str::to_string)
            .collect();
        let existing = self
            .store
            .find_existing(&self.source.source_id, &external_ids)
            .map_err(BatchError::Resolve)?;

        let lookups = Preloader::new(self.references.as_ref()).preload(&filtered)?;
        let flags = snapshot_flags(
            self.flags.as_ref(),
            &self.source.source_id,
            &self.settings.flag_manifest,
        )?;

        let batch = BatchContext {
            now,
            env: self.settings.env.clone(),
            source_id: self.source.source_id.clone(),
            ingest_id: ingest_id.to_string(),
            flags,
            lookups,
            ruleset_version: self.ruleset_version.clone(),
        };

        let processor = Processor {
            source: &self.source,
            rulesets: &self.rulesets,
            canonical_contract: &self.canonical_contract,
            store: self.store.as_ref(),
            silent_keys: &self.settings.silent_keys,
        };

        let mut outcomes = Vec::with_capacity(filtered.len());
        let mut summary = BatchSummary::default();

        for (index, payload) in filtered.into_iter().enumerate() {
            let external_id = fields::non_blank_str(&payload, "external_id")
                .unwrap_or_default()
                .to_string();
            let existing_record = existing.get(&external_id).cloned();

            let item = ItemContext::queued(index, external_id, payload, existing_record);
            let item = processor.process(item, &batch);

            self.observe(&item, &batch)?;
            summary.record(item.status);
            outcomes.push(item.outcome());
        }

        info!(
            source_id = %batch.source_id,
            ingest_id = %batch.ingest_id,
            created = summary.created,
            updated = summary.updated,
            destroyed = summary.destroyed,
            noop = summary.noop,
            rejected = summary.rejected,
            "batch complete"
        );

        Ok(BatchOutcome {
            outcomes,
            summary,
            ingest_id: batch.ingest_id,
            ruleset_version: self.ruleset_version.clone(),
            flags_version: batch.flags.version().to_string(),
        })
    }

    /// Emits the item's replay pack. Keys are write-once; an existing
    /// object means an idempotent re-run.
    fn observe(&self, item: &ItemContext, batch: &BatchContext) -> Result<(), BatchError> {
        let pack = self.build_pack(item, batch);
        let wire = PackV1::from(&pack);
        let bytes =
            serde_json::to_vec_pretty(&wire).map_err(|e| BatchError::PackEncode {
                external_id: item.external_id.clone(),
                message: e.to_string(),
            })?;

        let key = pack.storage_key();
        match self.artifacts.put_if_absent(&key, &bytes) {
            Ok(PutOutcome::Written) => debug!(key = %key, "wrote replay pack"),
            Ok(PutOutcome::AlreadyExists) => debug!(key = %key, "replay pack already present"),
            Err(source) => return Err(BatchError::Artifact { key, source }),
        }
        Ok(())
    }

    fn build_pack(&self, item: &ItemContext, batch: &BatchContext) -> ReplayPack {
        let resolver_snapshot = resolver_slice(item, &batch.lookups);

        let mut rules_order: Vec<RuleOrderEntry> = self.rulesets.external.order_entries();
        match item.action {
            Some(Action::Create) => rules_order.extend(self.rulesets.create.order_entries()),
            Some(Action::Update) => rules_order.extend(self.rulesets.update.order_entries()),
            Some(Action::Destroy) | None => {}
        }

        ReplayPack {
            pack_version: schema::PACK_VERSION_V1,
            produced_at: batch.now.timestamp(),
            env: batch.env.clone(),
            app_version: self.settings.app_version.clone(),
            git_sha: self.settings.git_sha.clone(),
            ruleset_version: batch.ruleset_version.clone(),
            flags_version: batch.flags.version().to_string(),
            payload_schema_version: self.source.payload_schema_version.clone(),
            source_id: batch.source_id.clone(),
            external_id: item.external_id.clone(),
            ingest_id: batch.ingest_id.clone(),
            status: item.status,
            fired_rules: item.fired.clone(),
            raw_payload_normalized: item.payload.clone(),
            mapped_payload: item.mapped.clone(),
            changed_keys: item.changed_keys.clone(),
            changes: item.changes.clone(),
            violations: if item.violations.is_empty() {
                None
            } else {
                Some(item.violations.clone())
            },
            resolver_snapshot,
            rules_order,
            flags_snapshot: batch.flags.values().clone(),
        }
    }
}

/// Deduplicates by `external_id`, keeping the first occurrence and the
/// input order. Items without an id cannot collide and pass through.
fn filter_duplicates(items: Vec<Fields>) -> Vec<Fields> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for payload in items {
        match fields::non_blank_str(&payload, "external_id") {
            Some(id) => {
                if seen.insert(id.to_string()) {
                    out.push(payload);
                } else {
                    debug!(external_id = id, "dropping duplicate item");
                }
            }
            None => out.push(payload),
        }
    }
    out
}

/// The lookup slice this item consulted: every brand, strain, and tag name
/// its raw or mapped payload references.
fn resolver_slice(item: &ItemContext, lookups: &LookupMaps) -> LookupMaps {
    let mut brand_names = BTreeSet::new();
    let mut strain_names = BTreeSet::new();
    let mut tag_names = BTreeSet::new();

    for payload in [&item.payload, &item.mapped] {
        for key in ["brand", "brand_name"] {
            if let Some(name) = fields::non_blank_str(payload, key) {
                brand_names.insert(name.to_string());
            }
        }
        for key in ["strain", "strain_name"] {
            if let Some(name) = fields::non_blank_str(payload, key) {
                strain_names.insert(name.to_string());
            }
        }
        for key in ["tags", "tag_names"] {
            tag_names.extend(fields::str_list(payload, key));
        }
    }

    lookups.slice(&brand_names, &strain_names, &tag_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: Option<&str>) -> Fields {
        let mut f = Fields::new();
        if let Some(id) = id {
            f.insert("external_id".to_string(), json!(id));
        }
        f
    }

    #[test]
    fn duplicate_filter_keeps_first_occurrence_in_order() {
        let filtered = filter_duplicates(vec![
            item(Some("a")),
            item(Some("b")),
            item(Some("a")),
            item(None),
            item(Some("c")),
        ]);
        let ids: Vec<Option<&str>> = filtered
            .iter()
            .map(|f| fields::str_of(f, "external_id"))
            .collect();
        assert_eq!(ids, vec![Some("a"), Some("b"), None, Some("c")]);
    }
}
