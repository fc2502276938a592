//! `stockrecon export`: turn a saved result file into CSV files or a workbook.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::json;

use stockrecon_config::Settings;
use stockrecon_recon::{export_csv, export_xlsx, BatchOutcome, WorkshopResult};

use crate::exit_codes::EXIT_ERROR;
use crate::util::print_json;
use crate::{CliError, ExportFormat};

/// Read a result JSON as written by `run --json` / `run --output`.
pub(crate) fn read_results(path: &Path) -> Result<BatchOutcome, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::args(format!("{} is not a result file: {e}", path.display())))
}

/// Default workbook name next to the CSV directory default.
fn default_workbook(results: &Path, dir: &Path) -> PathBuf {
    let stem = results
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recon".to_string());
    dir.join(format!("{stem}.xlsx"))
}

pub fn cmd_export(
    results_path: PathBuf,
    format: ExportFormat,
    out: Option<PathBuf>,
    json: bool,
    settings: &Settings,
) -> Result<(), CliError> {
    let outcome = read_results(&results_path)?;
    let results: &BTreeMap<String, WorkshopResult> = match &outcome {
        BatchOutcome::Completed(map) => map,
        BatchOutcome::Aborted(reason) => {
            return Err(CliError {
                code: EXIT_ERROR,
                message: format!("nothing to export: the batch was aborted ({reason})"),
                hint: None,
            });
        }
    };

    let default_dir = settings.export_directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let exported = match format {
        ExportFormat::Csv => {
            let dir = out.unwrap_or(default_dir);
            export_csv(results, &dir, settings.export_bom).map_err(CliError::recon)?
        }
        ExportFormat::Xlsx => {
            let path = out.unwrap_or_else(|| default_workbook(&results_path, &default_dir));
            vec![export_xlsx(results, &path).map_err(CliError::recon)?]
        }
    };

    if json {
        return print_json(&json!({ "exportedFiles": exported }));
    }
    for path in &exported {
        eprintln!("wrote {}", path.display());
    }
    if exported.is_empty() {
        eprintln!("nothing to export");
    }
    Ok(())
}
