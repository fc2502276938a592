//! Turning located tables into typed stock and movement entries.

use chrono::NaiveDate;

use stockrecon_io::{Grid, RawTable, SheetRef, Workbook};

use crate::columns::{find_named, resolve_column, resolve_role, Role};
use crate::config::{ColumnOverride, ColumnRule, DatePolicy, HeaderRule, KeywordMode, StockColumns};
use crate::error::ReconError;
use crate::locate::{locate_header_row, locate_sheet, HeaderMatch};
use crate::model::WorkshopOverride;
use crate::normalize::{coerce_quantity, normalize_cell_text, normalize_reference, parse_date_column};
use crate::period::Period;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A sheet cut at its detected header row.
#[derive(Debug, Clone)]
pub struct LocatedTable {
    pub sheet: String,
    pub header: HeaderMatch,
    pub table: RawTable,
}

/// Labels a header rule may need: date labels and reference/quantity labels.
#[derive(Debug, Clone, Copy)]
pub struct HeaderVocabulary<'a> {
    pub date: &'a [String],
    pub roles: &'a [String],
}

pub fn cut_table(sheet: &str, grid: &Grid, rule: &HeaderRule, vocab: HeaderVocabulary<'_>) -> LocatedTable {
    let header = locate_header_row(grid, rule, vocab.date, vocab.roles);
    log::debug!("sheet '{sheet}': header row {} (detected: {})", header.row, header.found);
    LocatedTable {
        sheet: sheet.to_string(),
        header,
        table: grid.to_table(header.row),
    }
}

/// First candidate sheet, cut at its header row.
pub fn read_table(
    workbook: &Workbook,
    candidates: &[SheetRef],
    rule: &HeaderRule,
    vocab: HeaderVocabulary<'_>,
) -> Result<LocatedTable, ReconError> {
    let (sheet, grid) = locate_sheet(workbook, candidates)?;
    Ok(cut_table(sheet, grid, rule, vocab))
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StockEntry {
    pub reference: String,
    pub quantity: f64,
    pub localisation: Option<String>,
    pub sub_localisation: Option<String>,
    pub source_sheet: Option<String>,
}

/// Declared stock rows, normalised, with the dimensions the table offered.
#[derive(Debug, Clone, Default)]
pub struct StockTable {
    pub entries: Vec<StockEntry>,
    pub has_localisation: bool,
    pub has_sub_localisation: bool,
}

impl StockTable {
    pub fn concat(tables: Vec<StockTable>) -> StockTable {
        let mut out = StockTable::default();
        for t in tables {
            out.has_localisation |= t.has_localisation;
            out.has_sub_localisation |= t.has_sub_localisation;
            out.entries.extend(t.entries);
        }
        out
    }
}

/// Options for reading one stock table.
#[derive(Debug, Clone, Default)]
pub struct StockRead<'a> {
    /// Replaces the quantity rule: this name exactly (or collapsed), else a
    /// lenient substring match on it.
    pub quantity_column: Option<&'a str>,
    pub drop_incomplete: bool,
    pub source_sheet: Option<&'a str>,
}

/// Resolve stock columns and normalise every row.
///
/// Reference and quantity are required; so is localisation when the unit
/// declares one. The second localisation dimension is optional.
pub fn read_stock(table: &RawTable, columns: &StockColumns, opts: &StockRead<'_>) -> Result<StockTable, ReconError> {
    let ref_idx = resolve_role(&table.columns, Role::Reference, None, None, &columns.reference)?;

    let qty_idx = match opts.quantity_column {
        Some(name) => {
            let rule = ColumnRule {
                keywords: vec![name.to_string()],
                keyword_mode: KeywordMode::EitherContains,
                ..ColumnRule::default()
            };
            find_named(&table.columns, name)
                .or_else(|| resolve_column(&table.columns, &rule))
                .ok_or_else(|| ReconError::missing_column(&format!("quantity ('{name}')"), &table.columns))?
        }
        None => resolve_role(&table.columns, Role::Quantity, None, None, &columns.quantity)?,
    };

    let loc_idx = match &columns.localisation {
        Some(rule) => Some(resolve_role(&table.columns, Role::Localisation, None, None, rule)?),
        None => None,
    };
    let sub_idx = columns
        .sub_localisation
        .as_ref()
        .and_then(|rule| resolve_column(&table.columns, rule));

    let mut entries = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let reference = normalize_reference(table.cell(row, ref_idx));
        let localisation = loc_idx.map(|idx| normalize_cell_text(table.cell(row, idx)));
        if opts.drop_incomplete
            && (reference.is_empty() || localisation.as_deref().map(str::is_empty).unwrap_or(false))
        {
            continue;
        }
        entries.push(StockEntry {
            reference,
            quantity: coerce_quantity(table.cell(row, qty_idx)),
            localisation,
            sub_localisation: sub_idx.map(|idx| normalize_cell_text(table.cell(row, idx))),
            source_sheet: opts.source_sheet.map(str::to_string),
        });
    }

    Ok(StockTable {
        entries,
        has_localisation: loc_idx.is_some(),
        has_sub_localisation: sub_idx.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MovementEntry {
    pub reference: String,
    pub quantity: f64,
    pub date: Option<NaiveDate>,
    pub localisation: Option<String>,
}

/// Everything that decides how one movement table is read.
#[derive(Debug, Clone)]
pub struct MovementRead<'a> {
    pub reference: &'a ColumnRule,
    pub quantity: &'a ColumnRule,
    pub date: &'a ColumnRule,
    pub dates: &'a DatePolicy,
    /// Localisation candidates when movement rows are filtered by location.
    pub localisation: Option<&'a ColumnRule>,
    pub configured: &'a ColumnOverride,
    pub operator: &'a WorkshopOverride,
    pub period: Period,
}

/// Movement rows kept by the date window, references normalised.
pub fn read_movement(table: &RawTable, opts: &MovementRead<'_>) -> Result<Vec<MovementEntry>, ReconError> {
    let columns = &table.columns;
    let ref_idx = resolve_role(
        columns,
        Role::Reference,
        opts.operator.ref_col.as_deref(),
        opts.configured.reference.as_deref(),
        opts.reference,
    )?;
    let qty_idx = resolve_role(
        columns,
        Role::Quantity,
        opts.operator.qty_col.as_deref(),
        opts.configured.quantity.as_deref(),
        opts.quantity,
    )?;

    let mut date_idx = resolve_column(columns, opts.date);
    if date_idx.is_none() && opts.dates.substring_fallback {
        date_idx = columns.iter().position(|c| c.to_lowercase().contains("date"));
    }
    if date_idx.is_none() && opts.dates.required {
        return Err(ReconError::missing_column(&Role::Date.to_string(), columns));
    }

    let loc_idx = match opts.localisation {
        Some(rule) => Some(resolve_role(columns, Role::Localisation, None, None, rule)?),
        None => None,
    };

    let dates: Vec<Option<NaiveDate>> = match date_idx {
        Some(idx) => parse_date_column(&table.column(idx), opts.dates.order),
        None => vec![None; table.len()],
    };

    let mut entries = Vec::new();
    for row in 0..table.len() {
        let date = dates[row];
        if date_idx.is_some() && !opts.dates.window.keeps(date, opts.period.year, opts.period.month) {
            continue;
        }
        let localisation = loc_idx.map(|idx| normalize_cell_text(table.cell(row, idx)));
        if localisation.as_deref() == Some("") {
            continue;
        }
        let reference = normalize_reference(table.cell(row, ref_idx));
        if reference.is_empty() {
            continue;
        }
        entries.push(MovementEntry {
            reference,
            quantity: coerce_quantity(table.cell(row, qty_idx)),
            date,
            localisation,
        });
    }

    log::debug!(
        "{} of {} movement rows kept (date column: {})",
        entries.len(),
        table.len(),
        date_idx.map(|i| columns[i].as_str()).unwrap_or("none")
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{DateOrder, DateWindow};
    use stockrecon_io::Cell;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn stock_columns() -> StockColumns {
        StockColumns {
            reference: ColumnRule::labels(&["REFERENCE"]),
            quantity: ColumnRule::labels(&["QUANTITE"]),
            localisation: Some(ColumnRule::labels(&["LOCALISATION"])),
            sub_localisation: None,
        }
    }

    fn stock_table() -> RawTable {
        RawTable::new(
            vec!["REFERENCE".into(), "QUANTITE".into(), "LOCALISATION ".into()],
            vec![
                vec![t("12.5"), t("1 000,5"), t(" MAG A ")],
                vec![t("B"), Cell::Number(3.0), Cell::Empty],
                vec![Cell::Empty, Cell::Number(1.0), t("MAG A")],
            ],
        )
    }

    #[test]
    fn stock_rows_normalised() {
        let stock = read_stock(&stock_table(), &stock_columns(), &StockRead::default()).unwrap();
        assert!(stock.has_localisation);
        assert!(!stock.has_sub_localisation);
        assert_eq!(stock.entries.len(), 3);
        assert_eq!(stock.entries[0].reference, "12,5");
        assert_eq!(stock.entries[0].quantity, 1000.5);
        assert_eq!(stock.entries[0].localisation.as_deref(), Some("MAG A"));
    }

    #[test]
    fn incomplete_stock_rows_dropped() {
        let opts = StockRead { drop_incomplete: true, ..StockRead::default() };
        let stock = read_stock(&stock_table(), &stock_columns(), &opts).unwrap();
        assert_eq!(stock.entries.len(), 1);
    }

    #[test]
    fn stock_missing_localisation_is_an_error() {
        let table = RawTable::new(vec!["REFERENCE".into(), "QUANTITE".into()], vec![]);
        let err = read_stock(&table, &stock_columns(), &StockRead::default()).unwrap_err();
        assert!(err.to_string().starts_with("Could not find localisation column"));
    }

    #[test]
    fn stock_quantity_column_override() {
        let table = RawTable::new(
            vec!["REFERENCE".into(), "QUANTITE".into(), "QUANTITE/KG".into()],
            vec![vec![t("A"), Cell::Number(1.0), Cell::Number(7.0)]],
        );
        let mut columns = stock_columns();
        columns.localisation = None;
        let opts = StockRead { quantity_column: Some("QUANTITE/KG"), ..StockRead::default() };
        let stock = read_stock(&table, &columns, &opts).unwrap();
        assert_eq!(stock.entries[0].quantity, 7.0);
    }

    #[test]
    fn stock_quantity_column_override_falls_back_to_substring() {
        let table = RawTable::new(
            vec!["REFERENCE".into(), "Stock Quantite KG (fin)".into()],
            vec![vec![t("A"), Cell::Number(3.0)]],
        );
        let mut columns = stock_columns();
        columns.localisation = None;
        let opts = StockRead { quantity_column: Some("QUANTITE KG"), ..StockRead::default() };
        let stock = read_stock(&table, &columns, &opts).unwrap();
        assert_eq!(stock.entries[0].quantity, 3.0);
    }

    fn movement_table() -> RawTable {
        RawTable::new(
            vec!["Date".into(), "REFERENCE".into(), "STOCK".into()],
            vec![
                vec![t("15/01/2025"), t("A"), Cell::Number(5.0)],
                vec![t("15/03/2025"), t("A"), Cell::Number(1.0)],
                vec![t("junk"), t("A"), Cell::Number(100.0)],
                vec![t("20/12/2024"), t("B"), t("2,5")],
                vec![t("20/01/2025"), Cell::Empty, Cell::Number(9.0)],
            ],
        )
    }

    fn rules() -> (ColumnRule, ColumnRule, ColumnRule) {
        (
            ColumnRule::labels(&["REFERENCE"]),
            ColumnRule::labels(&["STOCK"]),
            ColumnRule::labels(&["Date", "DATE"]),
        )
    }

    #[test]
    fn cumulative_window_drops_later_and_undated_rows() {
        let (r, q, d) = rules();
        let dates = DatePolicy { order: DateOrder::DayFirst, ..DatePolicy::default() };
        let opts = MovementRead {
            reference: &r,
            quantity: &q,
            date: &d,
            dates: &dates,
            localisation: None,
            configured: &ColumnOverride::default(),
            operator: &WorkshopOverride::default(),
            period: Period::new(2025, 2),
        };
        let entries = read_movement(&movement_table(), &opts).unwrap();
        let refs: Vec<(&str, f64)> = entries.iter().map(|e| (e.reference.as_str(), e.quantity)).collect();
        assert_eq!(refs, vec![("A", 5.0), ("B", 2.5)]);
    }

    #[test]
    fn disabled_window_keeps_everything_with_a_reference() {
        let (r, q, d) = rules();
        let dates = DatePolicy { window: DateWindow::Disabled, ..DatePolicy::default() };
        let opts = MovementRead {
            reference: &r,
            quantity: &q,
            date: &d,
            dates: &dates,
            localisation: None,
            configured: &ColumnOverride::default(),
            operator: &WorkshopOverride::default(),
            period: Period::new(2025, 2),
        };
        assert_eq!(read_movement(&movement_table(), &opts).unwrap().len(), 4);
    }

    #[test]
    fn required_date_column() {
        let (r, q, _) = rules();
        let missing = ColumnRule::labels(&["التاريخ"]);
        let dates = DatePolicy { required: true, ..DatePolicy::default() };
        let opts = MovementRead {
            reference: &r,
            quantity: &q,
            date: &missing,
            dates: &dates,
            localisation: None,
            configured: &ColumnOverride::default(),
            operator: &WorkshopOverride::default(),
            period: Period::new(2025, 2),
        };
        let err = read_movement(&movement_table(), &opts).unwrap_err();
        assert!(err.to_string().starts_with("Could not find date column"));

        let dates = DatePolicy { substring_fallback: true, required: true, ..DatePolicy::default() };
        let opts = MovementRead { dates: &dates, ..opts };
        assert!(read_movement(&movement_table(), &opts).is_ok());
    }

    #[test]
    fn operator_columns_take_precedence() {
        let table = RawTable::new(
            vec!["Date".into(), "REFERENCE".into(), "STOCK".into(), "CORRIGE".into()],
            vec![vec![t("01/01/2025"), t("A"), Cell::Number(1.0), Cell::Number(4.0)]],
        );
        let (r, q, d) = rules();
        let dates = DatePolicy::default();
        let operator = WorkshopOverride { qty_col: Some("CORRIGE".into()), ..WorkshopOverride::default() };
        let opts = MovementRead {
            reference: &r,
            quantity: &q,
            date: &d,
            dates: &dates,
            localisation: None,
            configured: &ColumnOverride::default(),
            operator: &operator,
            period: Period::new(2025, 1),
        };
        assert_eq!(read_movement(&table, &opts).unwrap()[0].quantity, 4.0);
    }
}
