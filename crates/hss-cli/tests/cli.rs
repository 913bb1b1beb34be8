use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const STUDY: &str = r#"
name: offshore-pcc
base_cases:
  - name: BASE
    network_reference: grid/main
contingencies:
  - name: Line_Out
    actions:
      - type: outage
        element: line/L1
filters:
  - name: C5
    target_element: bus/PCC
    tuning_frequencies_hz: [245.0, 250.0]
    sizes_mvar: [25.0]
terminals:
  - name: PCC
    locations: ["bus/PCC"]
    include_in_transfer_impedance: true
  - name: WTG
    locations: ["bus/WTG"]
"#;

#[test]
fn expand_lists_all_variants() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study.yaml");
    fs::write(&study, STUDY).unwrap();

    Command::cargo_bin("hss-cli")
        .unwrap()
        .args(["expand", study.to_str().unwrap()])
        .assert()
        .success()
        // 1 base x (Intact + 1 contingency) x 2 taps
        .stdout(predicate::str::contains("BASE_Line_Out_C5_245.0Hz_25.0Mvar"))
        .stdout(predicate::str::contains("BASE_Intact_C5_250.0Hz_25.0Mvar"));
}

#[test]
fn run_writes_dataset_boundaries_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study.yaml");
    fs::write(&study, STUDY).unwrap();
    let out = dir.path().join("out");

    Command::cargo_bin("hss-cli")
        .unwrap()
        .args([
            "run",
            study.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let merged = fs::read_to_string(out.join("merged.csv")).unwrap();
    assert!(merged.contains("PCC"));
    assert!(merged.contains("m:THD"));
    let boundaries = fs::read_to_string(out.join("boundaries.csv")).unwrap();
    assert!(boundaries.starts_with("terminal,harmonic_order"));
    let manifest = fs::read_to_string(out.join("run_manifest.json")).unwrap();
    assert!(manifest.contains("\"study\": \"offshore-pcc\""));
    assert!(manifest.contains("\"status\": \"ok\""));
}

#[test]
fn aggregate_merges_exports_from_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study.yaml");
    fs::write(&study, STUDY).unwrap();
    let out = dir.path().join("out");

    Command::cargo_bin("hss-cli")
        .unwrap()
        .args([
            "run",
            study.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let mut exports: Vec<String> = fs::read_dir(out.join("exports").join("BASE"))
        .unwrap()
        .map(|entry| entry.unwrap().path().display().to_string())
        .collect();
    exports.sort();
    assert!(!exports.is_empty());

    let merged = dir.path().join("again.csv");
    let mut cmd = Command::cargo_bin("hss-cli").unwrap();
    cmd.args(["aggregate", study.to_str().unwrap()]);
    cmd.args(&exports);
    cmd.args(["--output", merged.to_str().unwrap()]);
    cmd.assert().success();
    assert!(merged.exists());
}

#[test]
fn missing_study_fails_with_nonzero_exit() {
    Command::cargo_bin("hss-cli")
        .unwrap()
        .args(["expand", "/nonexistent/study.yaml"])
        .assert()
        .failure();
}
