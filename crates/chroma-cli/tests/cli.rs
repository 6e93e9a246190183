//! CLI command integration tests.
//! Each test works inside its own temp directory.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn chroma_cmd() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("chroma").unwrap();
    cmd.env_remove("CHROMA_DB");
    cmd
}

fn write_input(dir: &TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, json).unwrap();
    path
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn extract_stat_value(output: &str, prefix: &str) -> String {
    output
        .lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| {
            panic!("stat line starting with '{prefix}' not found in output:\n{output}")
        })
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}

const TWO_EPOCHS: &str = r#"[
    {"year": 1950, "color": [[0, 0, 0], [0, 0, 0], [255, 255, 255], [200, 30, 30]]},
    {"year": 1960, "color": [[0, 0, 0], [10, 10, 10], [30, 200, 30], [30, 30, 200]]}
]"#;

#[test]
fn run_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);
    let out = dir.path().join("out");

    chroma_cmd()
        .arg("run")
        .arg(&input)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("novel_colors.json"))
        .stdout(predicate::str::contains("done. epochs=2"));

    let novelty = read_json(&out.join("novel_colors.json"));
    assert_eq!(novelty["epochs"][0]["colors"].as_array().unwrap().len(), 3);
    // (10, 10, 10) shares black's bucket at the default depth
    assert_eq!(novelty["epochs"][1]["colors"].as_array().unwrap().len(), 2);
    assert_eq!(novelty["total_unique_colors"], 5);

    let clusters = read_json(&out.join("clustered_colors.json"));
    assert!(clusters["epoch_clusters"]["1950"].get("4").is_none());
    assert_eq!(clusters["epoch_clusters"]["1960"]["4"]["centroids"].as_array().unwrap().len(), 4);

    let projection = read_json(&out.join("projected_colors.json"));
    assert_eq!(projection["radius"], 100.0);
    assert_eq!(projection["epochs"][1]["colors"].as_array().unwrap().len(), 2);
}

#[test]
fn novelty_to_stdout() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);

    let output = chroma_cmd().arg("novelty").arg(&input).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["epochs"][0]["epoch"], 1950);
    assert_eq!(value["quantizer"]["depth"], 4.0);
}

#[test]
fn depth_override_changes_buckets() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);
    let out = dir.path().join("novel.json");

    chroma_cmd()
        .args(["novelty", "--depth", "5", "-o"])
        .arg(&out)
        .arg(&input)
        .assert()
        .success();

    let novelty = read_json(&out);
    assert_eq!(novelty["quantizer"]["depth"], 5.0);
    assert_eq!(novelty["epochs"][1]["colors"].as_array().unwrap().len(), 3);
}

#[test]
fn cluster_and_project_single_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);
    let clusters = dir.path().join("clusters.json");
    let projection = dir.path().join("projection.json");

    chroma_cmd().arg("cluster").arg(&input).arg("-o").arg(&clusters).assert().success();
    chroma_cmd().arg("project").arg(&input).arg("-o").arg(&projection).assert().success();

    assert_eq!(read_json(&clusters)["all_epochs"], serde_json::json!([1950, 1960]));
    let first = &read_json(&projection)["epochs"][0]["colors"][0];
    for field in ["x", "y", "angle", "distance", "h", "s", "l"] {
        assert!(first.get(field).is_some(), "missing {field}");
    }
}

#[test]
fn config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);
    let config = write_input(
        &dir,
        "chroma.toml",
        "max_colors = 2\n\n[cluster]\nresolutions = [2]\n",
    );
    let out = dir.path().join("clusters.json");

    chroma_cmd()
        .arg("--config")
        .arg(&config)
        .arg("cluster")
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let clusters = read_json(&out);
    assert_eq!(clusters["total_unique_colors"], 2);
    assert_eq!(clusters["epoch_clusters"]["1950"]["2"]["counts"].as_array().unwrap().len(), 2);
}

#[test]
fn out_of_order_input_needs_sort_flag() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        "colors.json",
        r#"[{"year": 2000, "color": [[1, 2, 3]]}, {"year": 1990, "color": [[200, 2, 3]]}]"#,
    );

    chroma_cmd()
        .arg("novelty")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not come after"));

    chroma_cmd()
        .args(["novelty", "--sort-epochs"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1990"));
}

#[test]
fn malformed_input_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "bad.json", "{ not json");
    chroma_cmd()
        .arg("run")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn bad_color_samples_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("timeline.db");
    let input = write_input(
        &dir,
        "colors.json",
        r#"[{"year": 1950, "color": [[0, 0, 0], [1, 2], [12.5, 3, 4], [255, 255, 255]]}]"#,
    );

    chroma_cmd()
        .arg("ingest")
        .arg(&input)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 novel, 0 dropped, 2 rejected"));
}

#[test]
fn invalid_depth_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "colors.json", TWO_EPOCHS);
    chroma_cmd()
        .args(["novelty", "--depth", "9"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("color depth"));
}

#[test]
fn ingest_incrementally_then_stats_and_export() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("timeline.db");
    let first = write_input(
        &dir,
        "first.json",
        r#"[{"year": 1950, "color": [[0, 0, 0], [255, 0, 0]]}]"#,
    );
    let second = write_input(
        &dir,
        "second.json",
        r#"[{"year": 1960, "color": [[255, 0, 0], [0, 0, 255]]}]"#,
    );

    chroma_cmd()
        .arg("ingest")
        .arg(&first)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("ingested epoch 1950 -> 2 novel"));

    chroma_cmd()
        .arg("ingest")
        .arg(&second)
        .env("CHROMA_DB", &db)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 novel"));

    let output = chroma_cmd().arg("stats").arg("--db").arg(&db).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "epochs:"), "2");
    assert_eq!(extract_stat_value(&stdout, "last_epoch:"), "1960");
    assert_eq!(extract_stat_value(&stdout, "unique_colors:"), "3");
    assert_eq!(extract_stat_value(&stdout, "population:"), "4");

    let out = dir.path().join("export");
    chroma_cmd()
        .arg("export")
        .arg("--db")
        .arg(&db)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success();
    let novelty = read_json(&out.join("novel_colors.json"));
    assert_eq!(novelty["epochs"].as_array().unwrap().len(), 2);
}

#[test]
fn ingest_rejects_stale_epochs() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("timeline.db");
    let input = write_input(&dir, "colors.json", r#"[{"year": 1950, "color": [[0, 0, 0]]}]"#);

    chroma_cmd().arg("ingest").arg(&input).arg("--db").arg(&db).assert().success();
    chroma_cmd()
        .arg("ingest")
        .arg(&input)
        .arg("--db")
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not come after"));
}

#[test]
fn ingest_rejects_depth_mismatch() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("timeline.db");
    let first = write_input(&dir, "first.json", r#"[{"year": 1950, "color": [[0, 0, 0]]}]"#);
    let second = write_input(&dir, "second.json", r#"[{"year": 1960, "color": [[9, 9, 9]]}]"#);

    chroma_cmd().arg("ingest").arg(&first).arg("--db").arg(&db).assert().success();
    chroma_cmd()
        .args(["ingest", "--depth", "6"])
        .arg(&second)
        .arg("--db")
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot continue"));
}

#[test]
fn stats_json_on_fresh_db() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fresh.db");
    let output = chroma_cmd()
        .args(["stats", "--format", "json", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["epochs"], 0);
    assert!(value["last_epoch"].is_null());
}

#[test]
fn store_commands_need_a_database() {
    chroma_cmd()
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CHROMA_DB"));
}

#[test]
fn missing_required_args() {
    chroma_cmd().arg("run").assert().failure();
    chroma_cmd().assert().failure();
}
