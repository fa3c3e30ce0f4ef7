//! Rendering helpers (markdown) for human-readable artifacts.

use menusync_replay::ReplayReport;
use menusync_types::item::{BatchSummary, OutcomeRecord};
use menusync_types::pack::ReplayPack;

pub fn render_batch_md(
    ingest_id: &str,
    ruleset_version: &str,
    flags_version: &str,
    summary: &BatchSummary,
    outcomes: &[OutcomeRecord],
) -> String {
    let mut out = String::new();
    out.push_str("# menusync batch\n\n");
    out.push_str(&format!("Ingest id: `{}`\n", ingest_id));
    out.push_str(&format!("Ruleset: `{}`\n", ruleset_version));
    out.push_str(&format!("Flags: `{}`\n\n", flags_version));
    out.push_str(&format!(
        "- Items: {} (created {}, updated {}, destroyed {}, noop {}, rejected {})\n\n",
        summary.total(),
        summary.created,
        summary.updated,
        summary.destroyed,
        summary.noop,
        summary.rejected
    ));

    out.push_str("## Items\n\n");
    if outcomes.is_empty() {
        out.push_str("_Empty batch._\n");
        return out;
    }

    for (i, record) in outcomes.iter().enumerate() {
        out.push_str(&format!(
            "### {}. `{}` - {}\n\n",
            i + 1,
            record.external_id,
            record.status.as_str()
        ));
        if !record.fired_rules.is_empty() {
            out.push_str(&format!("- Fired: {}\n", record.fired_rules.join(", ")));
        }
        if !record.violations.is_empty() {
            out.push_str("\n**Violations**\n\n");
            for (field, messages) in record.violations.iter() {
                out.push_str(&format!("- `{}`: {}\n", field, messages.join("; ")));
            }
        }
        out.push('\n');
    }

    out
}

pub fn render_replay_md(pack: &ReplayPack, report: &ReplayReport) -> String {
    let mut out = String::new();
    out.push_str("# menusync replay\n\n");
    out.push_str(&format!(
        "Item: `{}` from `{}` (ingest `{}`)\n",
        pack.external_id, pack.source_id, pack.ingest_id
    ));
    out.push_str(&format!("Recorded status: `{}`\n", pack.status.as_str()));
    out.push_str(&format!(
        "Verdict: {}\n\n",
        if report.is_faithful() {
            "faithful"
        } else {
            "diverged"
        }
    ));

    if !report.divergences.is_empty() {
        out.push_str("## Divergences\n\n");
        for divergence in &report.divergences {
            out.push_str(&format!("- {}\n", divergence));
        }
        out.push('\n');
    }

    out.push_str("## Steps\n\n");
    if report.steps.is_empty() {
        out.push_str("_No rules re-executed._\n");
        return out;
    }

    for (i, step) in report.steps.iter().enumerate() {
        let marker = if step.applied { "fired" } else { "skipped" };
        out.push_str(&format!("### {}. `{}` - {}\n\n", i + 1, step.rule, marker));
        if !step.patch.is_empty() {
            out.push_str(&format!(
                "- Patch: {}\n",
                serde_json::to_string(&step.patch).unwrap_or_default()
            ));
        }
        if !step.conflicts.is_empty() {
            out.push_str(&format!("- Conflicts: {}\n", step.conflicts.join(", ")));
        }
        out.push('\n');
    }

    out
}
