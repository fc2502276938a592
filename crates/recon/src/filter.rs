//! Localisation filters: which stock rows (and movement rows) belong to a workshop.

use std::collections::BTreeSet;

use crate::config::LocalisationFilter;
use crate::error::ReconError;
use crate::load::{MovementEntry, StockEntry, StockTable};

fn trimmed(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Localisations a workshop accepts: the flat filter values, or every
/// localisation present in stock, minus the exclusions.
///
/// Paired filters have no flat equivalent and give `None`.
pub fn allowed_localisations(
    stock: &StockTable,
    filter: &LocalisationFilter,
    exclude: &[String],
) -> Option<BTreeSet<String>> {
    let excluded = trimmed(exclude);
    let mut allowed = match filter {
        LocalisationFilter::Flat(values) => trimmed(values),
        LocalisationFilter::None => stock
            .entries
            .iter()
            .filter_map(|e| e.localisation.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
        LocalisationFilter::Paired(_) => return None,
    };
    allowed.retain(|loc| !excluded.contains(loc));
    Some(allowed)
}

/// Stock rows belonging to the workshop.
///
/// A flat or paired filter needs the matching stock dimension; asking for one
/// the stock table does not carry fails the workshop.
pub fn filter_stock<'a>(
    stock: &'a StockTable,
    filter: &LocalisationFilter,
    exclude: &[String],
) -> Result<Vec<&'a StockEntry>, ReconError> {
    if let LocalisationFilter::Paired(pairs) = filter {
        if !stock.has_localisation || !stock.has_sub_localisation {
            return Err(ReconError::Workshop(
                "stock table has no localisation pair columns to filter on".into(),
            ));
        }
        let pairs: BTreeSet<(String, String)> = pairs
            .iter()
            .map(|(a, b)| (a.trim().to_string(), b.trim().to_string()))
            .collect();
        return Ok(stock
            .entries
            .iter()
            .filter(|e| {
                let key = (
                    e.localisation.as_deref().unwrap_or("").trim().to_string(),
                    e.sub_localisation.as_deref().unwrap_or("").trim().to_string(),
                );
                pairs.contains(&key)
            })
            .collect());
    }

    if *filter == LocalisationFilter::None && exclude.is_empty() {
        return Ok(stock.entries.iter().collect());
    }

    match allowed_localisations(stock, filter, exclude) {
        None => Ok(stock.entries.iter().collect()),
        Some(allowed) => {
            if !stock.has_localisation {
                return Err(ReconError::Workshop(
                    "stock table has no localisation column to filter on".into(),
                ));
            }
            Ok(stock
                .entries
                .iter()
                .filter(|e| {
                    e.localisation
                        .as_deref()
                        .map(|loc| allowed.contains(loc.trim()))
                        .unwrap_or(false)
                })
                .collect())
        }
    }
}

/// Movement rows whose localisation is allowed. Rows without a localisation
/// value never pass a restriction.
pub fn filter_movement(entries: Vec<MovementEntry>, allowed: Option<&BTreeSet<String>>) -> Vec<MovementEntry> {
    match allowed {
        None => entries,
        Some(allowed) => entries
            .into_iter()
            .filter(|e| {
                e.localisation
                    .as_deref()
                    .map(|loc| allowed.contains(loc.trim()))
                    .unwrap_or(false)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(reference: &str, qty: f64, loc: &str, sub: Option<&str>) -> StockEntry {
        StockEntry {
            reference: reference.into(),
            quantity: qty,
            localisation: Some(loc.into()),
            sub_localisation: sub.map(str::to_string),
            source_sheet: None,
        }
    }

    fn stock() -> StockTable {
        StockTable {
            entries: vec![
                entry("A", 1.0, "ATT SFIFA", Some("X")),
                entry("B", 2.0, "MGZ TRANSFERT", Some("Y")),
                entry("C", 3.0, "ATT TRIAGE", Some("X")),
                entry("D", 4.0, " ATT OUATE 01 ", Some("DRAFTER")),
            ],
            has_localisation: true,
            has_sub_localisation: true,
        }
    }

    fn refs(rows: &[&StockEntry]) -> Vec<String> {
        rows.iter().map(|e| e.reference.clone()).collect()
    }

    #[test]
    fn no_filter_keeps_everything() {
        let s = stock();
        assert_eq!(filter_stock(&s, &LocalisationFilter::None, &[]).unwrap().len(), 4);
        let allowed = allowed_localisations(&s, &LocalisationFilter::None, &[]).unwrap();
        assert_eq!(allowed.len(), 4);
    }

    #[test]
    fn flat_filter_trims_both_sides() {
        let s = stock();
        let filter = LocalisationFilter::Flat(vec!["ATT SFIFA".into(), "ATT OUATE 01".into()]);
        assert_eq!(refs(&filter_stock(&s, &filter, &[]).unwrap()), vec!["A", "D"]);
    }

    #[test]
    fn exclusions_without_filter_use_stock_localisations() {
        let s = stock();
        let rows = filter_stock(&s, &LocalisationFilter::None, &["ATT TRIAGE".into()]).unwrap();
        assert_eq!(refs(&rows), vec!["A", "B", "D"]);

        let allowed = allowed_localisations(&s, &LocalisationFilter::None, &["ATT TRIAGE".into()]).unwrap();
        assert!(allowed.contains("ATT OUATE 01"));
        assert!(!allowed.contains("ATT TRIAGE"));
    }

    #[test]
    fn paired_filter_needs_both_dimensions() {
        let s = stock();
        let filter = LocalisationFilter::Paired(vec![("ATT OUATE 01".into(), "DRAFTER".into())]);
        assert_eq!(refs(&filter_stock(&s, &filter, &[]).unwrap()), vec!["D"]);

        let mut flat_only = stock();
        flat_only.has_sub_localisation = false;
        assert!(filter_stock(&flat_only, &filter, &[]).is_err());
    }

    #[test]
    fn flat_filter_without_localisation_column_fails() {
        let mut s = stock();
        s.has_localisation = false;
        let filter = LocalisationFilter::Flat(vec!["ATT SFIFA".into()]);
        assert!(filter_stock(&s, &filter, &[]).is_err());
    }

    #[test]
    fn movement_rows_filtered_by_localisation() {
        let mov = |r: &str, loc: Option<&str>| MovementEntry {
            reference: r.into(),
            quantity: 1.0,
            date: None,
            localisation: loc.map(str::to_string),
        };
        let entries = vec![mov("A", Some("ATT SFIFA")), mov("B", Some("ATT TRIAGE")), mov("C", None)];
        let allowed: BTreeSet<String> = ["ATT SFIFA".to_string()].into_iter().collect();
        let kept = filter_movement(entries.clone(), Some(&allowed));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].reference, "A");
        assert_eq!(filter_movement(entries, None).len(), 3);
    }
}
