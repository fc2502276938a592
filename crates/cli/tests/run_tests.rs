// Exit codes and file outputs of run / verify / export.

mod common;

use common::{assert_single_json, code, fath1_fixture, stderr, stdout, stockrecon, write_xlsx, V};

#[test]
fn strict_fails_on_discrepancies() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3", "--strict"])
        .arg("--stock")
        .arg(&stock)
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .output()
        .unwrap();
    assert_eq!(code(&output), 14, "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("error: discrepancies found"));
}

#[test]
fn auto_matches_by_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3", "--json"])
        .arg("--stock")
        .arg(&stock)
        .arg("--auto")
        .arg(&movement)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&stdout(&output));
    assert_eq!(val.as_object().unwrap().len(), 1);
    assert!(val.get("bloc").is_some());
}

#[test]
fn failed_workshop_exits_13() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3", "--json"])
        .arg("--stock")
        .arg(&stock)
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .arg("--file")
        .arg(format!("unknown={}", movement.display()))
        .output()
        .unwrap();
    assert_eq!(code(&output), 13, "stderr: {}", stderr(&output));

    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["unknown"]["error"], "Unknown workshop: unknown");
    assert_eq!(val["bloc"]["matches"][0]["Ref"], "A");
}

#[test]
fn invalid_month_exits_11() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "13"])
        .arg("--stock")
        .arg(&stock)
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .output()
        .unwrap();
    assert_eq!(code(&output), 11);
    assert!(stderr(&output).contains("invalid month '13'"));
}

#[test]
fn unknown_unit_exits_10_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let output = stockrecon(dir.path()).args(["workshops", "-u", "Fath4"]).output().unwrap();
    assert_eq!(code(&output), 10);
    assert!(stderr(&output).contains("hint:  known units: Fath1"));
}

#[test]
fn verify_reports_missing_column() {
    use V::{N, T};

    let dir = tempfile::tempdir().unwrap();
    let movement = dir.path().join("bloc.xlsx");
    write_xlsx(
        &movement,
        &[(
            "MOUVEM 09",
            vec![
                vec![T("Date"), T("DESIGNATION"), T("STOCK PV")],
                vec![T("2025-03-01"), T("A"), N(1.0)],
            ],
        )],
    );

    let output = stockrecon(dir.path())
        .args(["verify", "-u", "Fath1", "--json", "--file"])
        .arg(format!("bloc={}", movement.display()))
        .output()
        .unwrap();
    assert_eq!(code(&output), 13);

    let val = assert_single_json(&stdout(&output));
    let bloc = &val["workshops"]["bloc"];
    assert_eq!(bloc["ok"], false);
    assert_eq!(bloc["sheet"], "MOUVEM 09");
    assert_eq!(bloc["missing"], serde_json::json!(["reference"]));
    assert_eq!(bloc["resolved"]["quantity"], "STOCK PV");
}

#[test]
fn export_csv_and_xlsx_from_saved_results() {
    let dir = tempfile::tempdir().unwrap();
    let (stock, movement) = fath1_fixture(dir.path());
    let results = dir.path().join("result.json");

    let output = stockrecon(dir.path())
        .args(["run", "-u", "Fath1", "--month", "3"])
        .arg("--stock")
        .arg(&stock)
        .arg("--file")
        .arg(format!("bloc={}", movement.display()))
        .arg("--output")
        .arg(&results)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());

    let csv_dir = dir.path().join("csv");
    let output = stockrecon(dir.path())
        .args(["export", "--format", "csv", "--json"])
        .arg(&results)
        .arg("--out")
        .arg(&csv_dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&stdout(&output));
    assert_eq!(val["exportedFiles"].as_array().unwrap().len(), 2);
    assert!(csv_dir.join("matches_bloc.csv").is_file());
    assert!(csv_dir.join("discrepancies_bloc.csv").is_file());

    let workbook = dir.path().join("out.xlsx");
    let output = stockrecon(dir.path())
        .args(["export", "--format", "xlsx"])
        .arg(&results)
        .arg("--out")
        .arg(&workbook)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(workbook.is_file());
}
