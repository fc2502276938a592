use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::WorkshopResult;
use crate::normalize::round2;

/// Per-workshop counts for summaries and export cover sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkshopSummary {
    pub matches: usize,
    pub discrepancies: usize,
    /// Sum of `|Difference|` over discrepancies.
    pub abs_difference: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub workshops: usize,
    pub failed: usize,
    pub matches: usize,
    pub discrepancies: usize,
    pub per_workshop: BTreeMap<String, WorkshopSummary>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn has_discrepancies(&self) -> bool {
        self.discrepancies > 0
    }
}

/// Compute summary statistics from per-workshop results.
pub fn compute_summary(results: &BTreeMap<String, WorkshopResult>) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (key, result) in results {
        summary.workshops += 1;
        if result.is_error() {
            summary.failed += 1;
        }
        summary.matches += result.matches.len();
        summary.discrepancies += result.discrepancies.len();

        let abs_difference = round2(result.discrepancies.iter().map(|r| r.difference.abs()).sum());
        summary.per_workshop.insert(
            key.clone(),
            WorkshopSummary {
                matches: result.matches.len(),
                discrepancies: result.discrepancies.len(),
                abs_difference,
                error: result.error.clone(),
            },
        );
    }

    summary
}
