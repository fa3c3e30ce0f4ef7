mod adapters;
mod config;

use adapters::{FsArtifactStore, JsonCatalogStore, JsonReferenceSource};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::FileConfig;
use fs_err as fs;
use menusync_core::adapters::StaticFlagBackend;
use menusync_core::{defaults, PipelineBuilder, SourceSpec};
use menusync_render::{render_batch_md, render_replay_md};
use menusync_replay::{load_pack, Replayer};
use menusync_rules::config::RulesetDoc;
use menusync_rules::{load_ruleset, parse_ruleset_doc, CompileOptions, RuleRegistry};
use menusync_types::fields::Fields;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "menusync",
    version,
    about = "Deterministic menu-item ingestion: rule-driven transform, persist, replay."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one batch of raw items through the pipeline.
    Run(RunArgs),
    /// Re-execute a recorded replay pack and report divergences.
    Replay(ReplayArgs),
    /// List registered rule classes.
    ListRules(ListRulesArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// JSON file holding an array of raw item payloads.
    #[arg(long)]
    items: Utf8PathBuf,

    /// Optional YAML config file (env, flags, silent keys).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// JSON file with brand/strain/tag reference data.
    #[arg(long)]
    references: Option<Utf8PathBuf>,

    /// Catalog state file (default: <out>/catalog.json).
    #[arg(long)]
    state: Option<Utf8PathBuf>,

    /// Output directory for replay packs and the batch report.
    #[arg(long, default_value = "artifacts/menusync")]
    out: Utf8PathBuf,

    /// Source identifier (default: from config, else "treez-default").
    #[arg(long)]
    source_id: Option<String>,

    /// Environment override.
    #[arg(long)]
    env: Option<String>,

    /// External transformer ruleset document (YAML).
    #[arg(long)]
    external_doc: Option<Utf8PathBuf>,

    /// Create ruleset document (YAML).
    #[arg(long)]
    create_doc: Option<Utf8PathBuf>,

    /// Update ruleset document (YAML).
    #[arg(long)]
    update_doc: Option<Utf8PathBuf>,

    /// Ingest id (default: a fresh v4 uuid).
    #[arg(long)]
    ingest_id: Option<String>,
}

#[derive(Debug, Parser)]
struct ReplayArgs {
    /// Replay pack file to re-execute.
    pack: Utf8PathBuf,

    /// Optional YAML config file (flag manifest must match the run).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// External transformer ruleset document (YAML).
    #[arg(long)]
    external_doc: Option<Utf8PathBuf>,

    /// Create ruleset document (YAML).
    #[arg(long)]
    create_doc: Option<Utf8PathBuf>,

    /// Update ruleset document (YAML).
    #[arg(long)]
    update_doc: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct ListRulesArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => run_batch(args),
        Command::Replay(args) => run_replay(args),
        Command::ListRules(args) => list_rules(args),
    }
}

fn load_file_config(path: Option<&Utf8Path>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => FileConfig::load(path),
        None => Ok(FileConfig::default()),
    }
}

fn load_doc(path: Option<&Utf8Path>, default: RulesetDoc) -> anyhow::Result<RulesetDoc> {
    match path {
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read ruleset doc {path}"))?;
            Ok(parse_ruleset_doc(&contents)
                .with_context(|| format!("parse ruleset doc {path}"))?)
        }
        None => Ok(default),
    }
}

fn run_batch(args: RunArgs) -> anyhow::Result<ExitCode> {
    let file_config = load_file_config(args.config.as_deref())?;
    let settings = file_config.settings(args.env.as_deref());

    let source_id = args
        .source_id
        .clone()
        .or_else(|| file_config.source_id.clone())
        .unwrap_or_else(|| "treez-default".to_string());

    let items_raw =
        fs::read_to_string(&args.items).with_context(|| format!("read items {}", args.items))?;
    let items: Vec<Fields> =
        serde_json::from_str(&items_raw).with_context(|| format!("parse items {}", args.items))?;

    let references = match args.references.as_deref() {
        Some(path) => JsonReferenceSource::load(path)?,
        None => JsonReferenceSource::default(),
    };
    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| args.out.join("catalog.json"));
    let store = JsonCatalogStore::open(&state_path)?;

    let pipeline = PipelineBuilder::new()
        .settings(settings)
        .source(SourceSpec::treez(source_id))
        .external_doc(load_doc(
            args.external_doc.as_deref(),
            defaults::external_transformer_doc(),
        )?)
        .create_doc(load_doc(
            args.create_doc.as_deref(),
            defaults::create_ruleset_doc(),
        )?)
        .update_doc(load_doc(
            args.update_doc.as_deref(),
            defaults::update_ruleset_doc(),
        )?)
        .flag_backend(Arc::new(StaticFlagBackend::new(file_config.flags.clone())))
        .reference_source(Arc::new(references))
        .catalog_store(Arc::new(store))
        .artifact_store(Arc::new(FsArtifactStore::new(args.out.join("packs"))))
        .build()
        .context("build pipeline")?;

    let ingest_id = args
        .ingest_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = pipeline
        .call(items, &ingest_id, Utc::now())
        .context("run batch")?;

    let report = render_batch_md(
        &outcome.ingest_id,
        &outcome.ruleset_version,
        &outcome.flags_version,
        &outcome.summary,
        &outcome.outcomes,
    );
    fs::create_dir_all(&args.out)?;
    fs::write(args.out.join("batch.md"), report)?;

    println!("{}", serde_json::to_string_pretty(&outcome.outcomes)?);
    info!(
        created = outcome.summary.created,
        updated = outcome.summary.updated,
        destroyed = outcome.summary.destroyed,
        noop = outcome.summary.noop,
        rejected = outcome.summary.rejected,
        "batch finished"
    );
    Ok(ExitCode::from(0))
}

fn run_replay(args: ReplayArgs) -> anyhow::Result<ExitCode> {
    let file_config = load_file_config(args.config.as_deref())?;
    let settings = file_config.settings(None);
    let registry = RuleRegistry::builtin();

    let options = |policy| CompileOptions {
        merge_policy: policy,
        synthesize_data_edges: settings.synthesize_data_edges,
        flag_manifest: settings.flag_manifest.clone(),
    };
    let external = load_ruleset(
        &load_doc(args.external_doc.as_deref(), defaults::external_transformer_doc())?,
        &registry,
        options(settings.external_policy),
    )?;
    let create = load_ruleset(
        &load_doc(args.create_doc.as_deref(), defaults::create_ruleset_doc())?,
        &registry,
        options(settings.create_policy),
    )?;
    let update = load_ruleset(
        &load_doc(args.update_doc.as_deref(), defaults::update_ruleset_doc())?,
        &registry,
        options(settings.update_policy),
    )?;

    let loaded = load_pack(&args.pack);
    let pack = loaded
        .pack
        .with_context(|| format!("load pack {}", args.pack))?;

    let replayer = Replayer {
        external: &external,
        create: &create,
        update: &update,
    };
    let report = replayer.replay(&pack);

    println!("{}", render_replay_md(&pack, &report));
    if report.is_faithful() {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(1))
    }
}

fn list_rules(args: ListRulesArgs) -> anyhow::Result<ExitCode> {
    let registry = RuleRegistry::builtin();
    let described = registry.describe();

    match args.format {
        OutputFormat::Text => {
            for (class, meta) in &described {
                let reads: Vec<&str> = meta.reads.iter().map(String::as_str).collect();
                let writes: Vec<&str> = meta.writes.iter().map(String::as_str).collect();
                println!(
                    "{class} ({}) reads=[{}] writes=[{}]",
                    meta.name,
                    reads.join(", "),
                    writes.join(", ")
                );
            }
        }
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = described
                .iter()
                .map(|(class, meta)| {
                    serde_json::json!({
                        "class": class,
                        "name": meta.name,
                        "reads": meta.reads,
                        "writes": meta.writes,
                        "flags": meta.flags,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(ExitCode::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "menusync",
            "run",
            "--items",
            "items.json",
            "--out",
            "out",
            "--source-id",
            "treez-sf",
        ])
        .expect("parses");
        match cli.cmd {
            Command::Run(args) => {
                assert_eq!(args.items, Utf8PathBuf::from("items.json"));
                assert_eq!(args.source_id.as_deref(), Some("treez-sf"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_replay_command() {
        let cli = Cli::try_parse_from(["menusync", "replay", "pack.json"]).expect("parses");
        match cli.cmd {
            Command::Replay(args) => {
                assert_eq!(args.pack, Utf8PathBuf::from("pack.json"));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn cli_rejects_unknown_subcommands() {
        assert!(Cli::try_parse_from(["menusync", "explode"]).is_err());
    }
}
