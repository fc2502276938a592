//! Sheet and header-row discovery.
//!
//! Source spreadsheets carry title banners, merged cells and blank separator
//! rows, so neither the sheet name nor the header offset is fixed.

use std::collections::HashSet;

use stockrecon_io::{Cell, Grid, SheetRef, Workbook};

use crate::config::{Discriminator, HeaderFallback, HeaderRule, LabelMatch, StockSheetChoice};
use crate::error::ReconError;
use crate::normalize::normalize_label;

/// Header row chosen for a grid. `found` is false when the rule's fallback
/// produced no row either and row 0 was assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMatch {
    pub row: usize,
    pub found: bool,
}

/// First candidate sheet present in the workbook.
pub fn locate_sheet<'a>(
    workbook: &'a Workbook,
    candidates: &[SheetRef],
) -> Result<(&'a str, &'a Grid), ReconError> {
    for candidate in candidates {
        if let Some(hit) = workbook.sheet(candidate) {
            log::debug!("using sheet '{}' for {candidate}", hit.0);
            return Ok(hit);
        }
    }
    Err(ReconError::SheetNotFound {
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        path: workbook.path().display().to_string(),
    })
}

/// Resolve a unit's stock sheet choice against an opened workbook.
pub fn locate_stock_sheet<'a>(
    workbook: &'a Workbook,
    choice: &StockSheetChoice,
) -> Result<(&'a str, &'a Grid), ReconError> {
    match choice {
        StockSheetChoice::Containing { patterns } => {
            let names = workbook.sheet_names();
            let picked = patterns.iter().find_map(|pattern| {
                let pattern = pattern.to_uppercase();
                names.iter().find(|n| n.to_uppercase().contains(&pattern)).copied()
            });
            let candidate = match picked {
                Some(name) => SheetRef::Name(name.to_string()),
                None => SheetRef::Index(0),
            };
            locate_sheet(workbook, &[candidate])
        }
        StockSheetChoice::Named { names } => {
            let candidates: Vec<SheetRef> = names.iter().map(|n| n.to_sheet_ref()).collect();
            locate_sheet(workbook, &candidates)
        }
        StockSheetChoice::NamedOrFirst { name } => {
            locate_sheet(workbook, &[SheetRef::Name(name.clone()), SheetRef::Index(0)])
        }
        StockSheetChoice::PerWorkshop => Err(ReconError::StockLoad(
            "stock sheets are chosen per workshop for this unit".into(),
        )),
    }
}

/// Scan the top rows of an untitled grid for the header row.
///
/// `date_labels` and `role_labels` feed the `date_labels` / `role_labels`
/// discriminators and the `role_labels` fallback.
pub fn locate_header_row(
    grid: &Grid,
    rule: &HeaderRule,
    date_labels: &[String],
    role_labels: &[String],
) -> HeaderMatch {
    let discriminator: &[String] = match rule.discriminator {
        Discriminator::DateLabels => date_labels,
        Discriminator::RoleLabels => role_labels,
        Discriminator::Custom => &rule.labels,
        Discriminator::None => &[],
    };
    let scan = rule.max_rows.min(grid.height());

    for idx in 0..scan {
        let values = row_values(grid.row(idx));
        if values.is_empty() {
            continue;
        }
        if !discriminator.is_empty() && label_hits(&values, discriminator, rule.label_match) >= rule.min_hits.max(1) {
            return HeaderMatch { row: idx, found: true };
        }
        if rule.date_substring && values.iter().any(|v| v.to_lowercase().contains("date")) {
            return HeaderMatch { row: idx, found: true };
        }
    }

    let fallback = match &rule.fallback {
        HeaderFallback::RowZero => None,
        HeaderFallback::MostPopulated => most_populated(grid),
        HeaderFallback::KeywordHits { keywords, min_hits } => (0..scan).find(|&idx| {
            let values: Vec<String> = row_values(grid.row(idx)).iter().map(|v| v.to_uppercase()).collect();
            let hits = keywords
                .iter()
                .filter(|k| {
                    let k = k.to_uppercase();
                    values.iter().any(|v| v.contains(&k))
                })
                .count();
            hits >= *min_hits
        }),
        HeaderFallback::RoleLabels => (0..scan).find(|&idx| {
            let values = row_values(grid.row(idx));
            label_hits(&values, role_labels, LabelMatch::Exact) > 0
        }),
    };

    match fallback {
        Some(row) => HeaderMatch { row, found: true },
        None => {
            log::debug!("no header row detected in the first {scan} rows, assuming row 0");
            HeaderMatch { row: 0, found: false }
        }
    }
}

/// Trimmed display text of the non-empty cells of a row.
fn row_values(row: &[Cell]) -> Vec<String> {
    row.iter()
        .filter(|c| !c.is_empty())
        .map(|c| c.display().trim().to_string())
        .collect()
}

/// Number of distinct labels present among the row's values.
fn label_hits(values: &[String], labels: &[String], mode: LabelMatch) -> usize {
    let distinct: HashSet<&String> = labels.iter().collect();
    match mode {
        LabelMatch::Exact => {
            let present: HashSet<&str> = values.iter().map(|v| v.as_str()).collect();
            distinct.iter().filter(|l| present.contains(l.trim())).count()
        }
        LabelMatch::Collapsed => {
            let present: HashSet<String> = values.iter().map(|v| normalize_label(v)).collect();
            let keys: HashSet<String> = distinct.iter().map(|l| normalize_label(l)).collect();
            keys.iter().filter(|k| present.contains(*k)).count()
        }
    }
}

fn most_populated(grid: &Grid) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for idx in 0..grid.height() {
        let count = grid.non_empty_count(idx);
        if count == 0 {
            continue;
        }
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((idx, count));
        }
    }
    best.map(|(idx, _)| idx)
}
