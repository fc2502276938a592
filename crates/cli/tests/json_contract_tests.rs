// Integration tests enforcing the --json and `request` stdout contract.
//
// stdout from --json commands and from `request` is exactly one JSON value
// of the right shape; diagnostics stay on stderr.
//
// Run with: cargo test -p stockrecon-cli --test json_contract_tests -- --nocapture

mod common;

use std::io::Write;
use std::process::Stdio;

use common::{assert_single_json, code, fath1_fixture, stderr, stdout, stockrecon};

// ===========================================================================
// stockrecon units / workshops --json
// ===========================================================================

#[test]
fn units_json_lists_every_unit() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path()).args(["units", "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    let units = val.as_array().expect("array of units");
    assert_eq!(units.len(), 9);
    assert_eq!(units[0]["id"], "Fath1");
    let mags = units.iter().find(|u| u["id"] == "Mags").unwrap();
    assert_eq!(mags["strategy"], "opening_balance");
    assert_eq!(mags["workshops"], 1);
}

#[test]
fn workshops_json_keeps_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path())
        .args(["workshops", "--unit", "fath3", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    let keys: Vec<&str> = val.as_array().unwrap().iter().map(|w| w["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["pet", "triage"]);
}

#[test]
fn unit_from_settings_when_flag_omitted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("settings.json"), r#"{ "recon.defaultUnit": "Oran" }"#).unwrap();

    let output = stockrecon(dir.path()).args(["workshops", "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&stdout(&output));
    assert_eq!(val.as_array().unwrap().len(), 4);
}

#[test]
fn missing_unit_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path()).args(["workshops"]).output().unwrap();
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("no unit given"));
    assert!(stdout(&output).is_empty());
}

// ===========================================================================
// stockrecon match --json
// ===========================================================================

#[test]
fn match_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path())
        .args(["match", "-u", "Fath3", "uploads/PET mars.xlsx", "uploads/notes.txt", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["matched"]["pet"]["name"], "PET mars.xlsx");
    assert_eq!(val["unmatched_files"][0]["name"], "notes.txt");
    assert_eq!(val["unmatched_workshops"], serde_json::json!(["triage"]));
}

// ===========================================================================
// stockrecon run --json
// ===========================================================================

#[test]
fn run_json_is_the_workshop_map() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3", "--json"])
        .arg("--stock")
        .arg(&stock)
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    let bloc = &val["bloc"];
    assert_eq!(bloc["matches"][0]["Ref"], "A");
    assert_eq!(bloc["discrepancies"][0]["Ref"], "B");
    assert_eq!(bloc["discrepancies"][0]["Difference"], 5.0);
    assert_eq!(bloc["discrepancies"][1]["Ref"], "C");
    assert!(bloc.get("error").is_none());

    // Human summary goes to stderr only
    assert!(stderr(&output).contains("bloc: 1 matched, 2 discrepancies"));
}

#[test]
fn run_json_reports_abort_as_top_level_error() {
    let dir = tempfile::tempdir().unwrap();
    let (_, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3", "--json", "--stock", "missing.xlsx"])
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .output()
        .unwrap();
    assert_eq!(code(&output), 12, "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    let reason = val["_error"].as_str().expect("_error");
    assert!(reason.starts_with("Failed to load stock file: "), "{reason}");
}

// ===========================================================================
// stockrecon request
// ===========================================================================

#[test]
fn request_from_argument_is_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path())
        .args(["request", r#"{"action":"get_ateliers","unit":"Mdoukal"}"#])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert_eq!(out.trim().lines().count(), 1);
    let val = assert_single_json(&out);
    assert_eq!(val["success"], true);
    assert_eq!(val["ateliers"].as_array().unwrap().len(), 3);
}

#[test]
fn request_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());
    let request = serde_json::json!({
        "action": "process",
        "unit": "Fath1",
        "stockFile": stock,
        "matchedFiles": { "bloc": { "path": movement, "name": "mouvement bloc.xlsx" } },
        "month": 3,
    });

    let mut child = stockrecon(dir.path())
        .arg("request")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(request.to_string().as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["success"], true);
    assert_eq!(val["results"]["bloc"]["matches"][0]["Ref"], "A");
}

#[test]
fn request_unknown_action_still_answers_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path())
        .args(["request", r#"{"action":"reboot"}"#])
        .output()
        .unwrap();
    assert_eq!(code(&output), 21);

    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["success"], false);
    assert_eq!(val["error"], "Unknown action: reboot");
}

#[test]
fn request_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path()).args(["request", "{oops"]).output().unwrap();
    assert_eq!(code(&output), 20);
    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["success"], false);
}
