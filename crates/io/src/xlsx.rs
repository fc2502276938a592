// Excel import (calamine) and export (rust_xlsxwriter)

use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::cell::{excel_serial_to_datetime, Cell};
use crate::grid::{Grid, RawTable};

/// Excel's hard limit on worksheet name length.
const MAX_SHEET_NAME: usize = 31;

/// Read every sheet of an Excel/ODS file into grids, in workbook order.
///
/// The underlying file is closed when this returns, on every path.
pub fn read_sheets(path: &Path) -> Result<Vec<(String, Grid)>, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open workbook '{}': {}", path.display(), e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(format!("Excel file '{}' contains no sheets", path.display()));
    }

    collect_sheets(path, &sheet_names, |name| workbook.worksheet_range(name))
}

/// Materialise each named sheet. A sheet that fails to read is logged and
/// skipped; the file is an error only when no sheet could be read.
fn collect_sheets<E: std::fmt::Display>(
    path: &Path,
    sheet_names: &[String],
    mut read: impl FnMut(&str) -> Result<Range<Data>, E>,
) -> Result<Vec<(String, Grid)>, String> {
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let range = match read(sheet_name) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("skipping sheet '{}' of {}: {}", sheet_name, path.display(), e);
                continue;
            }
        };
        sheets.push((sheet_name.clone(), range_to_grid(&range)));
    }

    if sheets.is_empty() {
        return Err(format!("Failed to read any sheet of '{}'", path.display()));
    }
    Ok(sheets)
}

fn range_to_grid(range: &Range<Data>) -> Grid {
    // Range may start below/right of A1; pad so row indices match the sheet
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    Grid::new(rows)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        // #N/A, #REF! and friends carry no value
        Data::Error(_) => Cell::Empty,
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ts) => Cell::DateTime(ts),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso(s).map(Cell::DateTime).unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Write one worksheet per table. Header row is bold; numbers stay numeric.
pub fn write_tables(path: &Path, tables: &[(String, RawTable)]) -> Result<(), String> {
    let mut workbook = XlsxWorkbook::new();
    let bold = Format::new().set_bold();
    let mut used: HashSet<String> = HashSet::new();

    for (name, table) in tables {
        let sheet_name = unique_sheet_name(name, &mut used);
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name)
            .map_err(|e| format!("Failed to name sheet '{}': {}", sheet_name, e))?;

        for (col, label) in table.columns.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, label, &bold)
                .map_err(|e| format!("Failed to write header: {}", e))?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let target_row = (row_idx + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                let written = match cell {
                    Cell::Empty => continue,
                    Cell::Number(n) => worksheet.write_number(target_row, col, *n).map(|_| ()),
                    Cell::Bool(b) => worksheet.write_boolean(target_row, col, *b).map(|_| ()),
                    other => worksheet.write_string(target_row, col, other.display()).map(|_| ()),
                };
                written.map_err(|e| format!("Failed to write cell: {}", e))?;
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save '{}': {}", path.display(), e))
}

/// Excel sheet names: max 31 chars, no `[]:*?/\`, unique case-insensitively.
pub fn unique_sheet_name(name: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}
