use stockrecon_io::Workbook;

use crate::config::UnitProfile;
use crate::error::ReconError;

use super::{Context, StockSource, StrategyKind, UnitStrategy};

/// Stock spread over one sheet per area; each workshop names the sheets it
/// reads, and each sheet gets its own header detection.
#[derive(Debug)]
pub struct SheetBased {
    profile: UnitProfile,
}

impl SheetBased {
    pub fn new(profile: UnitProfile) -> Self {
        Self { profile }
    }
}

impl UnitStrategy for SheetBased {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SheetBased
    }

    fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    fn load_stock(&self, ctx: &Context<'_>) -> Result<StockSource, ReconError> {
        let workbook = Workbook::open(ctx.stock_path).map_err(ReconError::StockLoad)?;
        log::info!(
            "opened stock workbook {} ({} sheets)",
            ctx.stock_path.display(),
            workbook.sheet_names().len()
        );
        Ok(StockSource::Workbook(workbook))
    }
}
