use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::model::{BatchOutcome, ReconRequest, WorkshopOverride, WorkshopResult};
use crate::period::{parse_month, resolve_year, Period};
use crate::registry::{strategy, Unit};
use crate::strategy::Context;

/// Workshop keys of a unit, in declared order.
pub fn list_workshops(unit: Unit) -> Result<Vec<String>, ReconError> {
    Ok(strategy(unit)?.workshops().into_iter().map(str::to_string).collect())
}

/// Target period of a request: validated month, resolved year.
pub fn request_period(request: &ReconRequest) -> Result<Period, ReconError> {
    let month = parse_month(&request.month)?;
    let year = resolve_year(request.year, &request.stock_file.path, request.default_year);
    Ok(Period::new(year, month))
}

/// Reconcile every matched workshop of a unit against one stock file.
///
/// Returns `Err` only for failures that abort the whole batch (invalid
/// month, unreadable stock, broken profile). Everything else is recorded on
/// the workshop it happened to.
pub fn run_batch(unit: Unit, request: &ReconRequest) -> Result<BTreeMap<String, WorkshopResult>, ReconError> {
    let strategy = strategy(unit)?;
    let period = request_period(request)?;
    let ctx = Context {
        stock_path: &request.stock_file.path,
        prev_stock_path: request.stock_file.prev_path.as_deref(),
        period,
    };
    log::info!(
        "{unit}: reconciling {} workshop(s) against {} for {period}",
        request.matched_files.len(),
        request.stock_file.path.display()
    );

    let stock = strategy.load_stock(&ctx)?;

    let no_override = WorkshopOverride::default();
    let mut results = BTreeMap::new();
    for (key, file) in &request.matched_files {
        let overrides = request.overrides.get(key).unwrap_or(&no_override);
        let result = match strategy.process_workshop(key, &stock, &file.path, &ctx, overrides) {
            Ok(result) => result,
            Err(e) => {
                log::info!("workshop '{key}' failed: {e}");
                WorkshopResult::failed(e.to_string())
            }
        };
        results.insert(key.clone(), result);
    }
    Ok(results)
}

/// [`run_batch`] with batch failures folded into [`BatchOutcome::Aborted`].
pub fn reconcile(unit: Unit, request: &ReconRequest) -> BatchOutcome {
    match run_batch(unit, request) {
        Ok(map) => BatchOutcome::Completed(map),
        Err(e) => {
            log::warn!("{unit}: batch aborted: {e}");
            BatchOutcome::Aborted(e.to_string())
        }
    }
}
