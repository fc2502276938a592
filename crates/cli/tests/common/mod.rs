// Shared helpers for stockrecon binary tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rust_xlsxwriter::Workbook;

/// The binary, with settings isolated in `dir`.
pub fn stockrecon(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stockrecon"));
    cmd.current_dir(dir);
    cmd.env("STOCKRECON_CONFIG", dir.join("settings.json"));
    cmd.env_remove("STOCKRECON_UNIT");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
pub fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed))
}

/// A fixture cell.
pub enum V {
    T(&'static str),
    N(f64),
}

pub fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<V>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                match value {
                    V::T(s) => {
                        worksheet.write_string(r as u32, c as u16, *s).unwrap();
                    }
                    V::N(n) => {
                        worksheet.write_number(r as u32, c as u16, *n).unwrap();
                    }
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

/// Fath1 stock plus a `bloc` movement file: A matches, B and C differ.
pub fn fath1_fixture(dir: &Path) -> (PathBuf, PathBuf) {
    use V::{N, T};

    let stock = dir.join("STOCK 03-2025.xlsx");
    write_xlsx(
        &stock,
        &[(
            "STOCK",
            vec![
                vec![T("REFERENCE"), T("QUANTITE"), T("LOCALISATION")],
                vec![T("A"), N(10.0), T("MAGASINE DE BLOCS")],
                vec![T("B"), N(5.0), T("MAGASINE DE BLOCS")],
            ],
        )],
    );

    let movement = dir.join("mouvement bloc.xlsx");
    write_xlsx(
        &movement,
        &[(
            "MOUVEM 09",
            vec![
                vec![T("Date"), T("REFERENCE"), T("STOCK PV")],
                vec![T("2025-03-01"), T("A"), N(10.0)],
                vec![T("2025-03-02"), T("C"), N(3.0)],
            ],
        )],
    );
    (stock, movement)
}
