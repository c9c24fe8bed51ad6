//! Subcommand implementations; each returns the JSON document to print

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use recon_core::{
    CaseIssues, EngineConfig, InMemoryMasterStore, NoopObserver, Reconciler, WorkflowStage,
};
use recon_normalize::{Normalizer, Snapshot};
use serde_json::{json, Value};
use tracing::info;

/// Read and parse a JSON file
pub fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Engine configuration from `path`, or defaults
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Master templates from a JSON array file
pub fn load_masters(path: &Path) -> Result<InMemoryMasterStore> {
    let raw = read_json(path)?;
    let store = InMemoryMasterStore::from_json(&raw)
        .with_context(|| format!("loading masters {}", path.display()))?;
    info!(masters = store.len(), path = %path.display(), "loaded masters");
    Ok(store)
}

/// Canonical grid of a raw payload, or of a snapshot's grid payload
pub fn normalize(input: &Path, config: &EngineConfig) -> Result<Value> {
    let raw = read_json(input)?;
    let snapshot_grid = Snapshot::from_json(&raw)
        .ok()
        .and_then(|s| s.raw_grid().map(|(payload, _)| payload.clone()));
    let payload = snapshot_grid.as_ref().unwrap_or(&raw);

    let normalized = Normalizer::new(config.normalize.clone())
        .normalize_report(payload)
        .context("normalizing grid")?;
    Ok(json!({
        "shape": normalized.shape.to_string(),
        "legacy": normalized.legacy,
        "repairs": normalized.repairs.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "grid": serde_json::to_value(&normalized.grid)?,
    }))
}

/// Resolved identity of one snapshot
pub fn resolve(masters: &Path, snapshot: &Path, config: EngineConfig) -> Result<Value> {
    let store = load_masters(masters)?;
    let reconciler = Reconciler::new(config, &store)?;
    let snapshot = Snapshot::from_json(&read_json(snapshot)?).context("reading snapshot")?;
    Ok(serde_json::to_value(reconciler.resolve(&snapshot))?)
}

/// Reconciled snapshot of one record
pub fn reconcile(
    masters: &Path,
    snapshot: &Path,
    stage: WorkflowStage,
    config: EngineConfig,
) -> Result<Value> {
    let store = load_masters(masters)?;
    let reconciler = Reconciler::new(config, &store)?;
    let issue = reconciler
        .hydrate_json(&read_json(snapshot)?, stage)
        .with_context(|| format!("reconciling {}", snapshot.display()))?;
    for dropped in &issue.merge_report().dropped {
        info!(issue_id = %issue.issue_id(), %dropped, "value not carried forward");
    }
    Ok(serde_json::to_value(issue.to_snapshot())?)
}

/// Batch report for a JSON array of snapshots
pub fn hydrate(
    masters: &Path,
    snapshots: &Path,
    stage: WorkflowStage,
    case_id: &str,
    config: EngineConfig,
) -> Result<Value> {
    let store = load_masters(masters)?;
    let reconciler = Reconciler::new(config, &store)?;
    let Value::Array(records) = read_json(snapshots)? else {
        bail!("{} is not a JSON array of snapshots", snapshots.display());
    };

    let mut case = CaseIssues::new(case_id);
    let report = case.hydrate(&reconciler, &records, stage, &mut NoopObserver);
    let issues: Vec<Value> = case
        .issues()
        .iter()
        .map(|issue| {
            json!({
                "issue_id": issue.issue_id(),
                "source": issue.resolution().source,
                "corrected": issue.resolution().corrected,
                "locks": issue.locks(),
                "totals": issue.totals(),
            })
        })
        .collect();
    Ok(json!({
        "case_id": case.case_id(),
        "report": serde_json::to_value(&report)?,
        "issues": issues,
    }))
}
