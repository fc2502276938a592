use std::cmp::Ordering;

use crate::config::DiscrepancyOrder;
use crate::model::{ComparisonRow, WorkshopResult};

/// Split joined rows into matches and discrepancies.
///
/// A row is a discrepancy iff `|difference| > tolerance`; a row exactly at
/// the tolerance is a match. Matches keep reference order; discrepancies are
/// ordered per `order` with reference as the tie-breaker.
pub fn classify(rows: Vec<ComparisonRow>, tolerance: f64, order: DiscrepancyOrder) -> WorkshopResult {
    let (mut discrepancies, mut matches): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| r.difference.abs() > tolerance);

    matches.sort_by(|a, b| a.reference.cmp(&b.reference));
    discrepancies.sort_by(|a, b| compare(a, b, order));

    WorkshopResult {
        error: None,
        matches,
        discrepancies,
    }
}

fn compare(a: &ComparisonRow, b: &ComparisonRow, order: DiscrepancyOrder) -> Ordering {
    let primary = match order {
        DiscrepancyOrder::DifferenceDesc => b.difference.total_cmp(&a.difference),
        DiscrepancyOrder::MagnitudeDesc => b.difference.abs().total_cmp(&a.difference.abs()),
    };
    primary.then_with(|| a.reference.cmp(&b.reference))
}
