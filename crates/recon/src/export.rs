//! Result tables out: one CSV per workshop bucket, or a single workbook.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use stockrecon_io::{csv::write_delimited, xlsx::write_tables, Cell, RawTable};

use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::model::{ComparisonRow, WorkshopResult};

/// Workshops that have something to export, in key order.
fn exportable(results: &BTreeMap<String, WorkshopResult>) -> impl Iterator<Item = (&String, &WorkshopResult)> {
    results
        .iter()
        .filter(|(key, result)| !key.starts_with('_') && !result.is_error())
}

/// Comparison rows as a table with the ledger column names.
///
/// `Prev_Stock_Qty` is present only when some row carries an opening balance.
pub fn rows_table(rows: &[ComparisonRow]) -> RawTable {
    let with_prev = rows.iter().any(|r| r.prev_stock_qty.is_some());

    let mut columns = vec!["Ref".to_string(), "Stock_Qty".to_string()];
    if with_prev {
        columns.push("Prev_Stock_Qty".to_string());
    }
    columns.push("Calc_Mov_Qty".to_string());
    columns.push("Difference".to_string());

    let rows = rows
        .iter()
        .map(|r| {
            let mut cells = vec![Cell::text(r.reference.as_str()), Cell::Number(r.stock_qty)];
            if with_prev {
                cells.push(Cell::Number(r.prev_stock_qty.unwrap_or(0.0)));
            }
            cells.push(Cell::Number(r.calc_mov_qty));
            cells.push(Cell::Number(r.difference));
            cells
        })
        .collect();

    RawTable::new(columns, rows)
}

/// Workshop keys end up in file names.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// Write `matches_<ws>.csv` and `discrepancies_<ws>.csv` into `dir`.
///
/// Errored workshops and empty buckets produce no file.
pub fn export_csv(
    results: &BTreeMap<String, WorkshopResult>,
    dir: &Path,
    bom: bool,
) -> Result<Vec<PathBuf>, ReconError> {
    fs::create_dir_all(dir)
        .map_err(|e| ReconError::Io(format!("Failed to create '{}': {}", dir.display(), e)))?;

    let mut exported = Vec::new();
    for (key, result) in exportable(results) {
        let stem = file_stem(key);
        for (bucket, rows) in [("matches", &result.matches), ("discrepancies", &result.discrepancies)] {
            if rows.is_empty() {
                continue;
            }
            let path = dir.join(format!("{bucket}_{stem}.csv"));
            write_delimited(&path, &rows_table(rows), bom).map_err(ReconError::Io)?;
            exported.push(path);
        }
    }

    log::info!("exported {} csv file(s) to {}", exported.len(), dir.display());
    Ok(exported)
}

fn summary_table(results: &BTreeMap<String, WorkshopResult>) -> RawTable {
    let summary = compute_summary(results);
    let columns = ["Workshop", "Matches", "Discrepancies", "Abs_Difference", "Error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = summary
        .per_workshop
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, ws)| {
            vec![
                Cell::text(key.as_str()),
                Cell::Number(ws.matches as f64),
                Cell::Number(ws.discrepancies as f64),
                Cell::Number(ws.abs_difference),
                ws.error.as_deref().map(Cell::text).unwrap_or(Cell::Empty),
            ]
        })
        .collect();

    RawTable::new(columns, rows)
}

/// Write one workbook: a `Summary` sheet, then `<ws> - matches` and
/// `<ws> - discrepancies` for every non-empty bucket.
pub fn export_xlsx(results: &BTreeMap<String, WorkshopResult>, path: &Path) -> Result<PathBuf, ReconError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ReconError::Io(format!("Failed to create '{}': {}", parent.display(), e)))?;
    }

    let mut tables = vec![("Summary".to_string(), summary_table(results))];
    for (key, result) in exportable(results) {
        if !result.matches.is_empty() {
            tables.push((format!("{key} - matches"), rows_table(&result.matches)));
        }
        if !result.discrepancies.is_empty() {
            tables.push((format!("{key} - discrepancies"), rows_table(&result.discrepancies)));
        }
    }

    write_tables(path, &tables).map_err(ReconError::Io)?;
    log::info!("exported {} sheet(s) to {}", tables.len(), path.display());
    Ok(path.to_path_buf())
}
