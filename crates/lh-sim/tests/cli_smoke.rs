use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn lh_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lh-sim"))
        .args(args)
        .output()
        .expect("run lh-sim")
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json")
}

const DILUTION: &str = "Well,Vol of dna,Vol of water\nA1,5,50\nB1,10,60\nC1,2.5,100\nD1,7,30\n";
const POOLING: &str =
    "Worklist,WL-0042\nSourceWell,DestinationWell,VolumeToTransfer\nA1,A1,4\nB1,A1,4\nC1,B1,4\n";

#[test]
fn dilute_writes_command_log_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let worklist = dir.path().join("dilution.csv");
    fs::write(&worklist, DILUTION).expect("write");
    let out = dir.path().join("run");

    let output = lh_sim(&[
        "dilute",
        "--worklist",
        worklist.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let commands = read_json(&out.join("commands.json"));
    let drops = commands
        .as_array()
        .expect("array")
        .iter()
        .filter(|cmd| cmd["command"] == "drop_tip")
        .count();
    assert_eq!(drops, 5);
    let report = read_json(&out.join("report.json"));
    assert_eq!(report["phases"][0]["refills"], 1);
    assert!(!out.join("failure.json").exists());
}

#[test]
fn pool_fault_writes_failure_and_exits_non_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let worklist = dir.path().join("pooling.csv");
    fs::write(&worklist, POOLING).expect("write");
    let out = dir.path().join("run");

    let output = lh_sim(&[
        "pool",
        "--worklist",
        worklist.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--no-confirm",
        "--fault",
        "pick_up_tip:2",
    ]);
    assert!(!output.status.success());

    let failure = read_json(&out.join("failure.json"));
    assert_eq!(failure["family"], "Runtime");
    assert_eq!(failure["detail"]["context"]["row"], "2");
    assert_eq!(failure["detail"]["context"]["source"], "B1");
    assert!(!out.join("report.json").exists());

    let commands = read_json(&out.join("commands.json"));
    assert!(commands
        .as_array()
        .expect("array")
        .iter()
        .all(|cmd| cmd["command"] != "pause"));
}

#[test]
fn check_prints_summary_without_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    let worklist = dir.path().join("pooling.csv");
    fs::write(&worklist, POOLING).expect("write");

    let output = lh_sim(&["check", "--kind", "pooling", "--worklist", worklist.to_str().unwrap()]);
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["summary"]["rows"], 3);
    assert_eq!(body["summary"]["worklist_id"], "WL-0042");
    assert_eq!(body["tips_required"], 3);
    assert!(body["summary"]["worklist_hash"].as_str().is_some());
}

#[test]
fn check_rejects_non_numeric_volume() {
    let dir = tempfile::tempdir().expect("tempdir");
    let worklist = dir.path().join("dilution.csv");
    fs::write(&worklist, "Well,Vol of dna,Vol of water\nA1,n/a,50\n").expect("write");

    let output = lh_sim(&["check", "--kind", "dilution", "--worklist", worklist.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("lh_worklist.volume_not_numeric"));
}

#[test]
fn defaults_emit_loadable_yaml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("pooling.yaml");
    let output = lh_sim(&["defaults", "--protocol", "pooling", "--out", config.to_str().unwrap()]);
    assert!(output.status.success());

    let worklist = dir.path().join("pooling.csv");
    fs::write(&worklist, POOLING).expect("write");
    let output = lh_sim(&[
        "check",
        "--kind",
        "pooling",
        "--worklist",
        worklist.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(output.status.success());
}
