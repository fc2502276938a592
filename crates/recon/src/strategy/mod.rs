//! Per-unit reconciliation strategies and the job pipeline they share.
//!
//! A workshop is processed as one or more jobs. Each job loads the stock
//! rows it needs, reads and date-cuts the movement rows, filters by
//! localisation, aggregates both sides and joins them. Grouped workshops run
//! one job per sheet group and concatenate the joined rows.

mod localised;
mod opening_balance;
mod sheet_based;

pub use localised::Localised;
pub use opening_balance::{find_previous_stock, OpeningBalance};
pub use sheet_based::SheetBased;

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;

use stockrecon_io::{SheetRef, Workbook};

use crate::aggregate::AggregatedLedger;
use crate::classify::classify;
use crate::config::{
    ColumnOverride, ColumnRule, Discriminator, HeaderRule, LocalisationFilter, SheetSpec, UnitProfile,
    WorkshopSpec,
};
use crate::error::ReconError;
use crate::filter::{allowed_localisations, filter_movement, filter_stock};
use crate::load::{
    cut_table, read_movement, read_stock, read_table, HeaderVocabulary, MovementEntry, MovementRead, StockRead,
    StockTable,
};
use crate::locate::locate_stock_sheet;
use crate::matcher::outer_join;
use crate::model::{ComparisonRow, WorkshopOverride, WorkshopResult};
use crate::period::Period;

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Per-call inputs every strategy sees.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub stock_path: &'a Path,
    pub prev_stock_path: Option<&'a Path>,
    pub period: Period,
}

/// Stock as loaded once per batch, read-only afterwards.
#[derive(Debug)]
pub enum StockSource {
    /// One shared table, filtered per workshop by localisation.
    Table(StockTable),
    /// An opened workbook; each workshop reads its own stock sheets.
    Workbook(Workbook),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Localised,
    SheetBased,
    OpeningBalance,
}

pub trait UnitStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn profile(&self) -> &UnitProfile;

    fn workshops(&self) -> Vec<&str> {
        self.profile().workshop_keys()
    }

    /// Load the shared stock. Any failure here aborts the batch.
    fn load_stock(&self, ctx: &Context<'_>) -> Result<StockSource, ReconError>;

    /// Reconcile one workshop. Errors stay scoped to that workshop.
    fn process_workshop(
        &self,
        key: &str,
        stock: &StockSource,
        movement: &Path,
        ctx: &Context<'_>,
        overrides: &WorkshopOverride,
    ) -> Result<WorkshopResult, ReconError> {
        let ws = self
            .profile()
            .workshop(key)
            .ok_or_else(|| ReconError::UnknownWorkshop(key.to_string()))?;
        run_workshop(self.profile(), ws, stock, movement, ctx, overrides, None)
    }
}

/// Any shared-stock failure reads as a stock load failure.
pub(crate) fn stock_failure(err: ReconError) -> ReconError {
    match err {
        ReconError::StockLoad(msg) | ReconError::Io(msg) => ReconError::StockLoad(msg),
        other => ReconError::StockLoad(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Stock loading
// ---------------------------------------------------------------------------

pub(crate) fn stock_vocabulary(profile: &UnitProfile) -> Vec<String> {
    let columns = &profile.stock.columns;
    columns
        .reference
        .labels
        .iter()
        .chain(columns.quantity.labels.iter())
        .cloned()
        .collect()
}

/// Open a stock workbook and read the unit's single stock table.
pub(crate) fn load_shared_stock(profile: &UnitProfile, path: &Path) -> Result<StockTable, ReconError> {
    let workbook = Workbook::open(path).map_err(ReconError::Io)?;
    let (sheet, grid) = locate_stock_sheet(&workbook, &profile.stock.sheet)?;
    let roles = stock_vocabulary(profile);
    let vocab = HeaderVocabulary {
        date: &profile.movement.columns.date.labels,
        roles: &roles,
    };
    let located = cut_table(sheet, grid, &profile.stock.header, vocab);
    let opts = StockRead {
        drop_incomplete: profile.stock.drop_incomplete,
        ..StockRead::default()
    };
    let table = read_stock(&located.table, &profile.stock.columns, &opts)?;
    log::info!(
        "loaded {} stock rows from '{}' of {}",
        table.entries.len(),
        sheet,
        path.display()
    );
    Ok(table)
}

/// Read and concatenate the named stock sheets, each with its own header.
/// Sheets that are missing or lack the required columns are skipped.
pub(crate) fn read_stock_sheets(
    profile: &UnitProfile,
    workbook: &Workbook,
    sheets: &[String],
    quantity_column: Option<&str>,
) -> Result<StockTable, ReconError> {
    let roles = stock_vocabulary(profile);
    let vocab = HeaderVocabulary {
        date: &profile.movement.columns.date.labels,
        roles: &roles,
    };

    let mut tables = Vec::new();
    let mut seen = HashSet::new();
    for name in sheets {
        let Some((sheet, grid)) = workbook.sheet(&SheetRef::Name(name.clone())) else {
            log::warn!("stock sheet '{name}' not found in {}", workbook.path().display());
            continue;
        };
        // A delimited file answers every sheet name with its one table
        if !seen.insert(sheet) {
            log::debug!("stock sheet '{name}' resolves to '{sheet}', already read");
            continue;
        }
        let located = cut_table(sheet, grid, &profile.stock.header, vocab);
        let opts = StockRead {
            quantity_column,
            drop_incomplete: profile.stock.drop_incomplete,
            source_sheet: Some(sheet),
        };
        match read_stock(&located.table, &profile.stock.columns, &opts) {
            Ok(table) => tables.push(table),
            Err(e) => log::warn!("stock sheet '{sheet}' skipped: {e}"),
        }
    }

    if tables.is_empty() {
        return Err(ReconError::Workshop("Could not read stock sheets".into()));
    }
    Ok(StockTable::concat(tables))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// One load/filter/aggregate/join cycle of a workshop.
#[derive(Debug)]
struct Job<'a> {
    sheets: Vec<SheetRef>,
    /// Read every listed sheet and concatenate, instead of first-found.
    concat: bool,
    localisation: &'a LocalisationFilter,
    columns: &'a ColumnOverride,
    stock_sheets: &'a [String],
    stock_quantity: Option<&'a str>,
}

fn plan_jobs<'a>(ws: &'a WorkshopSpec, operator: &WorkshopOverride) -> Vec<Job<'a>> {
    match &ws.sheets {
        SheetSpec::Grouped(groups) => {
            if operator.sheet_name.is_some() {
                log::debug!("sheet override ignored for grouped workshop '{}'", ws.key);
            }
            groups
                .iter()
                .map(|g| Job {
                    sheets: g.sheets.iter().map(|s| s.to_sheet_ref()).collect(),
                    concat: true,
                    localisation: &g.localisation,
                    columns: &g.columns,
                    stock_sheets: if g.stock_sheets.is_empty() { &ws.stock_sheets } else { &g.stock_sheets },
                    stock_quantity: g.stock_quantity.as_deref().or(ws.stock_quantity.as_deref()),
                })
                .collect()
        }
        spec => {
            let sheets = match &operator.sheet_name {
                Some(name) => vec![SheetRef::Name(name.clone())],
                None => spec.candidates(),
            };
            vec![Job {
                sheets,
                concat: false,
                localisation: &ws.localisation,
                columns: &ws.columns,
                stock_sheets: &ws.stock_sheets,
                stock_quantity: ws.stock_quantity.as_deref(),
            }]
        }
    }
}

fn job_stock<'s>(profile: &UnitProfile, stock: &'s StockSource, job: &Job<'_>) -> Result<Cow<'s, StockTable>, ReconError> {
    match stock {
        StockSource::Table(table) => Ok(Cow::Borrowed(table)),
        StockSource::Workbook(workbook) => {
            read_stock_sheets(profile, workbook, job.stock_sheets, job.stock_quantity).map(Cow::Owned)
        }
    }
}

/// The movement header rule, with the workshop's own discriminator labels if any.
pub(crate) fn movement_header(profile: &UnitProfile, ws: &WorkshopSpec) -> HeaderRule {
    let mut rule = profile.movement.header.clone();
    if let Some(labels) = &ws.header_labels {
        rule.discriminator = Discriminator::Custom;
        rule.labels = labels.clone();
    }
    rule
}

/// Movement localisation candidates, when this workshop filters movement by location.
pub(crate) fn movement_localisation(profile: &UnitProfile, ws: &WorkshopSpec) -> Option<ColumnRule> {
    if ws.no_localisation_column {
        return None;
    }
    match &ws.movement_localisation {
        Some(labels) => Some(ColumnRule {
            labels: labels.clone(),
            ..ColumnRule::default()
        }),
        None => profile.movement.columns.localisation.clone(),
    }
}

fn read_job_movement(
    profile: &UnitProfile,
    ws: &WorkshopSpec,
    job: &Job<'_>,
    workbook: &Workbook,
    ctx: &Context<'_>,
    operator: &WorkshopOverride,
) -> Result<Vec<MovementEntry>, ReconError> {
    let dictionary = &profile.movement.columns;
    let header = movement_header(profile, ws);
    let roles = dictionary.role_labels();
    let vocab = HeaderVocabulary {
        date: &dictionary.date.labels,
        roles: &roles,
    };
    let localisation = movement_localisation(profile, ws);
    let opts = MovementRead {
        reference: &dictionary.reference,
        quantity: &dictionary.quantity,
        date: &dictionary.date,
        dates: &profile.movement.dates,
        localisation: localisation.as_ref(),
        configured: job.columns,
        operator,
        period: ctx.period,
    };

    if !job.concat {
        let located = read_table(workbook, &job.sheets, &header, vocab)?;
        return read_movement(&located.table, &opts);
    }

    let mut entries = Vec::new();
    let mut read_any = false;
    let mut last_error = None;
    let mut seen = HashSet::new();
    for sheet in &job.sheets {
        let Some((name, grid)) = workbook.sheet(sheet) else {
            log::warn!("movement sheet {sheet} not found in {}", workbook.path().display());
            continue;
        };
        if !seen.insert(name) {
            log::debug!("movement sheet {sheet} resolves to '{name}', already read");
            continue;
        }
        let located = cut_table(name, grid, &header, vocab);
        match read_movement(&located.table, &opts) {
            Ok(rows) => {
                entries.extend(rows);
                read_any = true;
            }
            Err(e) => {
                log::warn!("movement sheet '{name}' skipped: {e}");
                last_error = Some(e);
            }
        }
    }

    if read_any {
        return Ok(entries);
    }
    Err(last_error.unwrap_or_else(|| ReconError::SheetNotFound {
        candidates: job.sheets.iter().map(|s| s.to_string()).collect(),
        path: workbook.path().display().to_string(),
    }))
}

#[allow(clippy::too_many_arguments)]
fn run_job(
    profile: &UnitProfile,
    ws: &WorkshopSpec,
    job: &Job<'_>,
    stock: &StockSource,
    workbook: &Workbook,
    ctx: &Context<'_>,
    operator: &WorkshopOverride,
    opening: Option<&AggregatedLedger>,
) -> Result<Vec<ComparisonRow>, ReconError> {
    let stock_table = job_stock(profile, stock, job)?;
    let stock_rows = filter_stock(&stock_table, job.localisation, &ws.exclude_localisations)?;

    let mut movement = read_job_movement(profile, ws, job, workbook, ctx, operator)?;
    if movement_localisation(profile, ws).is_some() {
        let allowed = allowed_localisations(&stock_table, job.localisation, &ws.exclude_localisations);
        movement = filter_movement(movement, allowed.as_ref());
    }

    let stock_ledger = AggregatedLedger::from_stock(&stock_rows);
    let movement_ledger = AggregatedLedger::from_movement(&movement);
    log::debug!(
        "workshop '{}': {} stock references, {} movement references",
        ws.key,
        stock_ledger.len(),
        movement_ledger.len()
    );
    Ok(outer_join(&stock_ledger, &movement_ledger, opening))
}

/// Run every job of a workshop and classify the concatenated rows.
///
/// A single-job workshop reports its job's error. A grouped workshop skips
/// failing groups and only fails when every group does.
pub(crate) fn run_workshop(
    profile: &UnitProfile,
    ws: &WorkshopSpec,
    stock: &StockSource,
    movement: &Path,
    ctx: &Context<'_>,
    operator: &WorkshopOverride,
    opening: Option<&AggregatedLedger>,
) -> Result<WorkshopResult, ReconError> {
    let workbook = Workbook::open(movement).map_err(ReconError::Io)?;
    let jobs = plan_jobs(ws, operator);

    let rows = if ws.is_grouped() {
        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for (idx, job) in jobs.iter().enumerate() {
            match run_job(profile, ws, job, stock, &workbook, ctx, operator, opening) {
                Ok(job_rows) => rows.extend(job_rows),
                Err(e) => {
                    log::warn!("workshop '{}': sheet group {} skipped: {e}", ws.key, idx + 1);
                    failures.push(e.to_string());
                }
            }
        }
        if failures.len() == jobs.len() {
            return Err(ReconError::Workshop(failures.join("; ")));
        }
        rows
    } else {
        let mut rows = Vec::new();
        for job in &jobs {
            rows.extend(run_job(profile, ws, job, stock, &workbook, ctx, operator, opening)?);
        }
        rows
    };

    let result = classify(rows, profile.result.tolerance, profile.order_for(ws));
    log::info!(
        "workshop '{}': {} matches, {} discrepancies",
        ws.key,
        result.matches.len(),
        result.discrepancies.len()
    );
    Ok(result)
}
