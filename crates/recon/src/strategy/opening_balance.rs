use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::AggregatedLedger;
use crate::config::UnitProfile;
use crate::error::ReconError;
use crate::model::{WorkshopOverride, WorkshopResult};
use crate::period::Period;

use super::{load_shared_stock, run_workshop, stock_failure, Context, StockSource, StrategyKind, UnitStrategy};

/// Closing stock = previous month's closing stock + this month's movement.
#[derive(Debug)]
pub struct OpeningBalance {
    profile: UnitProfile,
}

impl OpeningBalance {
    pub fn new(profile: UnitProfile) -> Self {
        Self { profile }
    }

    /// Previous month's stock, aggregated. A missing file is an empty ledger;
    /// a file that exists but cannot be read is an error.
    fn opening_ledger(&self, ctx: &Context<'_>) -> Result<AggregatedLedger, ReconError> {
        let previous = ctx.period.previous();
        let path = match ctx.prev_stock_path {
            Some(path) => Some(path.to_path_buf()),
            None => find_previous_stock(ctx.stock_path, previous),
        };

        match path {
            Some(path) if path.is_file() => {
                let table = load_shared_stock(&self.profile, &path).map_err(|e| {
                    ReconError::Workshop(format!(
                        "Failed to load previous stock file {}: {e}",
                        path.display()
                    ))
                })?;
                let rows: Vec<_> = table.entries.iter().collect();
                Ok(AggregatedLedger::from_stock(&rows))
            }
            _ => {
                log::info!("no stock file for {previous}, opening balance is empty");
                Ok(AggregatedLedger::default())
            }
        }
    }
}

impl UnitStrategy for OpeningBalance {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OpeningBalance
    }

    fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    fn load_stock(&self, ctx: &Context<'_>) -> Result<StockSource, ReconError> {
        load_shared_stock(&self.profile, ctx.stock_path)
            .map(StockSource::Table)
            .map_err(stock_failure)
    }

    fn process_workshop(
        &self,
        key: &str,
        stock: &StockSource,
        movement: &Path,
        ctx: &Context<'_>,
        overrides: &WorkshopOverride,
    ) -> Result<WorkshopResult, ReconError> {
        let ws = self
            .profile
            .workshop(key)
            .ok_or_else(|| ReconError::UnknownWorkshop(key.to_string()))?;
        let opening = self.opening_ledger(ctx)?;
        run_workshop(&self.profile, ws, stock, movement, ctx, overrides, Some(&opening))
    }
}

/// Locate the stock file of `previous` next to `stock_path`.
///
/// Tries `STOCK <MM>-<YYYY>.xlsx`, then `.xls`, then the first spreadsheet
/// (by name) whose lowercased, space-stripped name contains `stock` and
/// `<M>-<YYYY>`.
pub fn find_previous_stock(stock_path: &Path, previous: Period) -> Option<PathBuf> {
    let dir = match stock_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    for ext in ["xlsx", "xls"] {
        let candidate = dir.join(format!("STOCK {:02}-{}.{ext}", previous.month, previous.year));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let key = format!("{}-{}", previous.month, previous.year);
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path != stock_path)
        .collect();
    paths.sort();

    paths.into_iter().find(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        (name.ends_with(".xlsx") || name.ends_with(".xls"))
            && name.contains("stock")
            && name.replace(' ', "").contains(&key)
    })
}
