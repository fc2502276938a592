use std::collections::BTreeSet;

use crate::aggregate::AggregatedLedger;
use crate::model::ComparisonRow;
use crate::normalize::round2;

/// Full outer join of the stock and movement ledgers on reference.
///
/// A side missing a reference counts as 0. With an opening ledger the
/// expected quantity is `round2(prev + movement)` and every row carries
/// `prev_stock_qty`, including references absent from the previous month.
pub fn outer_join(
    stock: &AggregatedLedger,
    movement: &AggregatedLedger,
    opening: Option<&AggregatedLedger>,
) -> Vec<ComparisonRow> {
    let mut references: BTreeSet<&str> = stock.references().collect();
    references.extend(movement.references());
    if let Some(prev) = opening {
        references.extend(prev.references());
    }

    references
        .into_iter()
        .map(|reference| {
            let stock_qty = stock.get(reference).unwrap_or(0.0);
            let calc_mov_qty = movement.get(reference).unwrap_or(0.0);
            let prev_stock_qty = opening.map(|prev| prev.get(reference).unwrap_or(0.0));
            let expected = match prev_stock_qty {
                Some(prev) => round2(prev + calc_mov_qty),
                None => calc_mov_qty,
            };
            ComparisonRow {
                reference: reference.to_string(),
                stock_qty,
                prev_stock_qty,
                calc_mov_qty,
                difference: round2(stock_qty - expected),
            }
        })
        .collect()
}
