use crate::config::UnitProfile;
use crate::error::ReconError;

use super::{load_shared_stock, stock_failure, Context, StockSource, StrategyKind, UnitStrategy};

/// One shared stock table, split across workshops by localisation.
#[derive(Debug)]
pub struct Localised {
    profile: UnitProfile,
}

impl Localised {
    pub fn new(profile: UnitProfile) -> Self {
        Self { profile }
    }
}

impl UnitStrategy for Localised {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Localised
    }

    fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    fn load_stock(&self, ctx: &Context<'_>) -> Result<StockSource, ReconError> {
        load_shared_stock(&self.profile, ctx.stock_path)
            .map(StockSource::Table)
            .map_err(stock_failure)
    }
}
