//! Subcommands against fixture files on disk

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use pretty_assertions::assert_eq;
use recon_cli::{run, Cli};
use recon_test_utils::{
    asmt10_legacy_snapshot, canonical_snapshot, masters_json, scrutiny_table_snapshot,
    SHORT_PAYMENT_ID,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn exec(args: &[&str]) -> anyhow::Result<Value> {
    let mut argv = vec!["recon"];
    argv.extend_from_slice(args);
    run(&Cli::try_parse_from(argv).unwrap())
}

struct Fixture {
    dir: TempDir,
    masters: String,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let masters = write(dir.path(), "masters.json", &masters_json());
        Self {
            masters: masters.to_string_lossy().into_owned(),
            dir,
        }
    }

    fn file(&self, name: &str, value: &Value) -> String {
        write(self.dir.path(), name, value).to_string_lossy().into_owned()
    }
}

#[test]
fn normalize_reports_shape_and_repairs() {
    let fx = Fixture::new();
    let input = fx.file(
        "grid.json",
        &json!({"summary_table": {"headers": ["Head", ""], "rows": [["Tax", "1,200"], ["Paid"]]}}),
    );
    let out = exec(&["normalize", &input]).unwrap();

    assert_eq!(out["shape"], "header_rows");
    assert_eq!(out["legacy"], true);
    assert_eq!(out["grid"]["columns"][1]["label"], "Col 2");
    assert!(!out["repairs"].as_array().unwrap().is_empty());
}

#[test]
fn resolve_by_reference_point() {
    let fx = Fixture::new();
    let snapshot = fx.file("asmt10.json", &asmt10_legacy_snapshot());
    let out = exec(&["resolve", "--masters", &fx.masters, &snapshot]).unwrap();
    assert_eq!(
        out,
        json!({"issue_id": SHORT_PAYMENT_ID, "source": "secondary_reference", "corrected": false})
    );
}

#[test]
fn reconcile_prints_saved_snapshot() {
    let fx = Fixture::new();
    let snapshot = fx.file("scrutiny.json", &scrutiny_table_snapshot());
    let out = exec(&["reconcile", "--masters", &fx.masters, "--stage", "view", &snapshot]).unwrap();

    assert_eq!(out["issue_id"], SHORT_PAYMENT_ID);
    assert_eq!(out["origin"], "SCRUTINY");
    assert_eq!(out["structure_version"], 0);
    assert_eq!(out["variables"]["liab_cgst"], 5000.0);
    assert!(out["template_schema_hash"].as_str().is_some_and(|h| h.len() == 64));
    assert_eq!(out["grid_data"]["columns"].as_array().unwrap().len(), 5);
}

#[test]
fn hydrate_reports_batch() {
    let fx = Fixture::new();
    let batch = fx.file(
        "batch.json",
        &json!([asmt10_legacy_snapshot(), canonical_snapshot(900.0, 100.0), {"grid_data": 7}]),
    );
    let out = exec(&["hydrate", "--masters", &fx.masters, "--case-id", "CASE-9", &batch]).unwrap();

    assert_eq!(out["case_id"], "CASE-9");
    assert_eq!(out["report"]["loaded"], 2);
    assert_eq!(out["report"]["skipped"][0]["index"], 2);
    assert_eq!(out["report"]["skipped"][0]["fatal"], true);
    assert_eq!(out["report"]["totals"]["tax"], 800.0);
    assert_eq!(out["issues"][0]["locks"]["lock_structure"], true);
}

#[test]
fn config_file_changes_surrogates() {
    let fx = Fixture::new();
    let config = fx.dir.path().join("engine.toml");
    fs::write(&config, "[identity]\nsurrogate_prefix = \"RECOVERED-\"\nsurrogate_hex_len = 8\n").unwrap();
    let snapshot = fx.file("manual.json", &json!({"origin": "MANUAL", "table_data": [[1, 2]]}));

    let out = exec(&[
        "resolve",
        "--masters",
        &fx.masters,
        "--config",
        config.to_str().unwrap(),
        &snapshot,
    ])
    .unwrap();
    let id = out["issue_id"].as_str().unwrap();
    assert!(id.starts_with("RECOVERED-"));
    assert_eq!(id.len(), "RECOVERED-".len() + 8);
}

#[test]
fn errors_name_the_file() {
    let fx = Fixture::new();
    let not_array = fx.file("one.json", &json!({"issue_id": SHORT_PAYMENT_ID}));
    let err = exec(&["hydrate", "--masters", &fx.masters, &not_array]).unwrap_err();
    assert!(err.to_string().contains("not a JSON array"));

    let missing = fx.dir.path().join("missing.json");
    let err = exec(&["resolve", "--masters", &fx.masters, missing.to_str().unwrap()]).unwrap_err();
    assert!(format!("{err:#}").contains("missing.json"));
}
