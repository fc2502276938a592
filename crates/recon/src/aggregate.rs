use std::collections::BTreeMap;

use crate::load::{MovementEntry, StockEntry};
use crate::normalize::round2;

/// Normalised reference → summed quantity, rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedLedger {
    totals: BTreeMap<String, f64>,
}

impl AggregatedLedger {
    /// Group (reference, quantity) pairs, sum, then round each total.
    /// Empty references are dropped.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for (reference, qty) in pairs {
            if reference.is_empty() {
                continue;
            }
            *totals.entry(reference.to_string()).or_insert(0.0) += qty;
        }
        for total in totals.values_mut() {
            *total = round2(*total);
        }
        Self { totals }
    }

    pub fn from_stock(rows: &[&StockEntry]) -> Self {
        Self::from_pairs(rows.iter().map(|e| (e.reference.as_str(), e.quantity)))
    }

    pub fn from_movement(rows: &[MovementEntry]) -> Self {
        Self::from_pairs(rows.iter().map(|e| (e.reference.as_str(), e.quantity)))
    }

    pub fn get(&self, reference: &str) -> Option<f64> {
        self.totals.get(reference).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.totals.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
