//! File-structure diagnostic: which sheet, header row and columns a
//! reconciliation would use, without aggregating anything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use stockrecon_io::{SheetRef, Workbook};

use crate::columns::{resolve_column, resolve_role, Role};
use crate::config::{ColumnRule, SheetSpec, StockSheetChoice, UnitProfile, WorkshopSpec};
use crate::error::ReconError;
use crate::load::{cut_table, HeaderVocabulary, LocatedTable};
use crate::locate::{locate_sheet, locate_stock_sheet};
use crate::model::{MovementFile, WorkshopOverride};
use crate::registry::{strategy, Unit};
use crate::strategy::{movement_header, movement_localisation, stock_vocabulary};

/// What was found in one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub sheets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// Candidates tried when none was present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tried: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,
    pub header_detected: bool,
    pub columns: Vec<String>,
    pub resolved: BTreeMap<Role, String>,
    pub missing: Vec<Role>,
    /// Sheet-based stock: presence of every configured stock sheet.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub stock_sheets: BTreeMap<String, bool>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }

    fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(path)
        }
    }

    fn located(&mut self, located: &LocatedTable) {
        self.sheet = Some(located.sheet.clone());
        self.header_row = Some(located.header.row);
        self.header_detected = located.header.found;
        self.columns = located.table.columns.clone();
    }

    fn role(&mut self, role: Role, found: Result<usize, ReconError>, required: bool) {
        match found {
            Ok(idx) => {
                self.resolved.insert(role, self.columns[idx].clone());
            }
            Err(e) if required => {
                log::debug!("verify: {e}");
                self.missing.push(role);
            }
            Err(_) => {}
        }
    }

    fn finish(mut self) -> Self {
        self.ok = self.error.is_none()
            && self.sheet.is_some()
            && self.missing.is_empty()
            && self.stock_sheets.values().all(|present| *present);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    pub workshops: BTreeMap<String, FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<FileReport>,
}

impl VerifyReport {
    pub fn all_ok(&self) -> bool {
        self.workshops.values().all(|r| r.ok) && self.stock.as_ref().map(|s| s.ok).unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

fn required_hit(columns: &[String], rule: &ColumnRule, role: Role) -> Result<usize, ReconError> {
    resolve_column(columns, rule).ok_or_else(|| ReconError::missing_column(&role.to_string(), columns))
}

fn verify_movement(profile: &UnitProfile, ws: &WorkshopSpec, path: &Path, operator: &WorkshopOverride) -> FileReport {
    let workbook = match Workbook::open(path) {
        Ok(wb) => wb,
        Err(e) => return FileReport::failed(path, e),
    };
    let mut report = FileReport::new(path);
    report.sheets = workbook.sheet_names().into_iter().map(str::to_string).collect();

    let candidates = match (&operator.sheet_name, &ws.sheets) {
        (Some(name), spec) if !matches!(spec, SheetSpec::Grouped(_)) => vec![SheetRef::Name(name.clone())],
        (_, spec) => spec.candidates(),
    };
    let (sheet, grid) = match locate_sheet(&workbook, &candidates) {
        Ok(hit) => hit,
        Err(e) => {
            report.tried = candidates.iter().map(|c| c.to_string()).collect();
            report.error = Some(e.to_string());
            return report.finish();
        }
    };

    let dictionary = &profile.movement.columns;
    let roles = dictionary.role_labels();
    let vocab = HeaderVocabulary {
        date: &dictionary.date.labels,
        roles: &roles,
    };
    let located = cut_table(sheet, grid, &movement_header(profile, ws), vocab);
    report.located(&located);
    let columns = report.columns.clone();

    let configured = match &ws.sheets {
        SheetSpec::Grouped(groups) => groups.first().map(|g| &g.columns).unwrap_or(&ws.columns),
        _ => &ws.columns,
    };
    report.role(
        Role::Reference,
        resolve_role(
            &columns,
            Role::Reference,
            operator.ref_col.as_deref(),
            configured.reference.as_deref(),
            &dictionary.reference,
        ),
        true,
    );
    report.role(
        Role::Quantity,
        resolve_role(
            &columns,
            Role::Quantity,
            operator.qty_col.as_deref(),
            configured.quantity.as_deref(),
            &dictionary.quantity,
        ),
        true,
    );

    let dates = &profile.movement.dates;
    let mut date = required_hit(&columns, &dictionary.date, Role::Date);
    if date.is_err() && dates.substring_fallback {
        if let Some(idx) = columns.iter().position(|c| c.to_lowercase().contains("date")) {
            date = Ok(idx);
        }
    }
    report.role(Role::Date, date, dates.required);

    if let Some(rule) = movement_localisation(profile, ws) {
        let found = required_hit(&columns, &rule, Role::Localisation);
        report.role(Role::Localisation, found, true);
    }

    report.finish()
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

/// Every stock sheet a sheet-based unit's workshops name, in first-seen order.
fn configured_stock_sheets(profile: &UnitProfile) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for ws in &profile.workshops {
        let group_sheets: Vec<&String> = match &ws.sheets {
            SheetSpec::Grouped(groups) => groups.iter().flat_map(|g| g.stock_sheets.iter()).collect(),
            _ => Vec::new(),
        };
        for name in ws.stock_sheets.iter().chain(group_sheets) {
            if seen.insert(name.clone()) {
                out.push(name.clone());
            }
        }
    }
    out
}

fn verify_stock(profile: &UnitProfile, path: &Path) -> FileReport {
    let workbook = match Workbook::open(path) {
        Ok(wb) => wb,
        Err(e) => return FileReport::failed(path, e),
    };
    let mut report = FileReport::new(path);
    report.sheets = workbook.sheet_names().into_iter().map(str::to_string).collect();

    if let StockSheetChoice::PerWorkshop = profile.stock.sheet {
        for name in configured_stock_sheets(profile) {
            let present = workbook.sheet(&SheetRef::Name(name.clone())).is_some();
            report.stock_sheets.insert(name, present);
        }
        report.sheet = report.stock_sheets.keys().next().cloned();
        return report.finish();
    }

    let (sheet, grid) = match locate_stock_sheet(&workbook, &profile.stock.sheet) {
        Ok(hit) => hit,
        Err(e) => {
            report.error = Some(e.to_string());
            return report.finish();
        }
    };
    let roles = stock_vocabulary(profile);
    let vocab = HeaderVocabulary {
        date: &profile.movement.columns.date.labels,
        roles: &roles,
    };
    let located = cut_table(sheet, grid, &profile.stock.header, vocab);
    report.located(&located);
    let columns = report.columns.clone();

    let stock_columns = &profile.stock.columns;
    report.role(Role::Reference, required_hit(&columns, &stock_columns.reference, Role::Reference), true);
    report.role(Role::Quantity, required_hit(&columns, &stock_columns.quantity, Role::Quantity), true);
    if let Some(rule) = &stock_columns.localisation {
        report.role(Role::Localisation, required_hit(&columns, rule, Role::Localisation), true);
    }
    if let Some(rule) = &stock_columns.sub_localisation {
        report.role(Role::SubLocalisation, required_hit(&columns, rule, Role::SubLocalisation), false);
    }

    report.finish()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Inspect matched movement files (and optionally the stock file) the way a
/// reconciliation would read them.
pub fn verify(
    unit: Unit,
    matched_files: &BTreeMap<String, MovementFile>,
    stock: Option<&Path>,
    overrides: &BTreeMap<String, WorkshopOverride>,
) -> Result<VerifyReport, ReconError> {
    let profile = strategy(unit)?.profile();
    let no_override = WorkshopOverride::default();

    let mut report = VerifyReport::default();
    for (key, file) in matched_files {
        let entry = match profile.workshop(key) {
            Some(ws) => {
                let operator = overrides.get(key).unwrap_or(&no_override);
                verify_movement(profile, ws, &file.path, operator)
            }
            None => FileReport::failed(&file.path, ReconError::UnknownWorkshop(key.clone()).to_string()),
        };
        log::debug!("verify '{key}': ok={}", entry.ok);
        report.workshops.insert(key.clone(), entry);
    }
    report.stock = stock.map(|path| verify_stock(profile, path));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_workshop_is_reported_in_entry() {
        let mut files = BTreeMap::new();
        files.insert("nope".to_string(), MovementFile::new("/tmp/nope.xlsx"));
        let report = verify(Unit::Fath1, &files, None, &BTreeMap::new()).unwrap();
        let entry = &report.workshops["nope"];
        assert!(!entry.ok);
        assert_eq!(entry.error.as_deref(), Some("Unknown workshop: nope"));
        assert!(!report.all_ok());
    }

    #[test]
    fn unreadable_file_is_reported_in_entry() {
        let mut files = BTreeMap::new();
        files.insert("bloc".to_string(), MovementFile::new("/nonexistent/bloc.xlsx"));
        let report = verify(Unit::Fath1, &files, None, &BTreeMap::new()).unwrap();
        let entry = &report.workshops["bloc"];
        assert!(!entry.ok);
        assert!(entry.error.as_deref().unwrap().starts_with("Failed to open workbook"));
    }

    #[test]
    fn sheet_based_stock_sheets_deduplicated() {
        let profile = strategy(Unit::Larbaa).unwrap().profile();
        let sheets = configured_stock_sheets(profile);
        assert_eq!(sheets.iter().filter(|s| *s == "MAG COUETTE+ORIELE").count(), 1);
        assert!(sheets.contains(&"ATT-OUATINAGE".to_string()));
        assert_eq!(sheets[0], "ATT DECOUPAGE");
    }
}
