//! Column resolution: which physical column plays each canonical role.

use std::fmt;

use crate::config::{ColumnRule, KeywordMode};
use crate::error::ReconError;
use crate::normalize::normalize_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Date,
    Reference,
    Quantity,
    Localisation,
    SubLocalisation,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => write!(f, "date"),
            Self::Reference => write!(f, "reference"),
            Self::Quantity => write!(f, "quantity"),
            Self::Localisation => write!(f, "localisation"),
            Self::SubLocalisation => write!(f, "sub-localisation"),
        }
    }
}

/// First column matching the rule, or `None`. Never guesses beyond the rule.
///
/// Passes, each in declared order: exact label, collapsed label
/// (whitespace and case insensitive), then keyword substring.
pub fn resolve_column(columns: &[String], rule: &ColumnRule) -> Option<usize> {
    if !rule.collapsed_only {
        for label in &rule.labels {
            if let Some(idx) = columns.iter().position(|c| c == label) {
                return Some(idx);
            }
        }
    }

    if let Some(idx) = find_collapsed(columns, &rule.labels) {
        return Some(idx);
    }

    for keyword in &rule.keywords {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            continue;
        }
        let hit = columns.iter().position(|c| {
            let label = c.trim().to_lowercase();
            if label.contains(&keyword) {
                return true;
            }
            rule.keyword_mode == KeywordMode::EitherContains
                && !label.is_empty()
                && keyword.contains(&label)
        });
        if hit.is_some() {
            return hit;
        }
    }

    None
}

fn find_collapsed(columns: &[String], labels: &[String]) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_label(c)).collect();
    labels.iter().find_map(|label| {
        let key = normalize_label(label);
        normalized.iter().position(|c| *c == key)
    })
}

/// Exact, then collapsed, match of a single designated label.
pub fn find_named(columns: &[String], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .or_else(|| find_collapsed(columns, &[name.to_string()]))
}

/// Resolve a role with the override chain: operator designation, then the
/// workshop's configured column, then the role dictionary.
///
/// An operator designation that matches nothing is an error. A configured
/// column that matches nothing quietly falls back to the dictionary.
pub fn resolve_role(
    columns: &[String],
    role: Role,
    operator: Option<&str>,
    configured: Option<&str>,
    rule: &ColumnRule,
) -> Result<usize, ReconError> {
    if let Some(name) = operator {
        return find_named(columns, name)
            .ok_or_else(|| ReconError::missing_column(&format!("{role} ('{name}')"), columns));
    }

    if let Some(name) = configured {
        if let Some(idx) = find_named(columns, name) {
            return Ok(idx);
        }
        log::debug!("configured {role} column '{name}' not present, using dictionary");
    }

    let idx = resolve_column(columns, rule)
        .ok_or_else(|| ReconError::missing_column(&role.to_string(), columns))?;
    log::debug!("{role} column resolved to '{}'", columns[idx]);
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_in_declared_order() {
        let columns = cols(&["STOCK", "REF", "REFERENCE"]);
        let rule = ColumnRule::labels(&["REFERENCE", "REF"]);
        assert_eq!(resolve_column(&columns, &rule), Some(2));
    }

    #[test]
    fn collapsed_fallback_when_exact_fails() {
        let columns = cols(&["Date", " référence ", "STOCK"]);
        let rule = ColumnRule::labels(&["REFERENCE", "Référence"]);
        assert_eq!(resolve_column(&columns, &rule), Some(1));

        let columns = cols(&["Référence   Fournisseur"]);
        let rule = ColumnRule::labels(&["Référence\nFournisseur"]);
        assert_eq!(resolve_column(&columns, &rule), Some(0));
    }

    #[test]
    fn exact_wins_over_earlier_collapsed_candidate() {
        let columns = cols(&["stock ", "STOCK PV"]);
        let rule = ColumnRule::labels(&["STOCK", "STOCK PV"]);
        assert_eq!(resolve_column(&columns, &rule), Some(1));
    }

    #[test]
    fn collapsed_only_follows_priority() {
        let columns = cols(&["Q", "Q-REEL"]);
        let mut rule = ColumnRule::labels(&["q-reel", "Q"]);
        assert_eq!(resolve_column(&columns, &rule), Some(0));
        rule.collapsed_only = true;
        assert_eq!(resolve_column(&columns, &rule), Some(1));
    }

    #[test]
    fn keyword_pass() {
        let columns = cols(&["Date", "Ref Article", "Quantité Kg"]);
        let rule = ColumnRule {
            labels: vec!["REFERENCE".into()],
            keywords: vec!["ref".into()],
            ..ColumnRule::default()
        };
        assert_eq!(resolve_column(&columns, &rule), Some(1));

        let either = ColumnRule {
            keywords: vec!["QUANTITE/KG".into()],
            keyword_mode: KeywordMode::EitherContains,
            ..ColumnRule::default()
        };
        let columns = cols(&["REFERENCE", "QUANTITE"]);
        assert_eq!(resolve_column(&columns, &either), Some(1));
    }

    #[test]
    fn absent_is_reported_not_guessed() {
        let columns = cols(&["Date", "Designation"]);
        let rule = ColumnRule::labels(&["REFERENCE"]);
        assert_eq!(resolve_column(&columns, &rule), None);
        let err = resolve_role(&columns, Role::Reference, None, None, &rule).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Could not find reference column. Available: ["Date", "Designation"]"#
        );
    }

    #[test]
    fn operator_override_wins_and_must_exist() {
        let columns = cols(&["REFERENCE", "CODE", "STOCK"]);
        let rule = ColumnRule::labels(&["REFERENCE"]);
        assert_eq!(resolve_role(&columns, Role::Reference, Some("CODE"), None, &rule).unwrap(), 1);
        let err = resolve_role(&columns, Role::Reference, Some("NOPE"), None, &rule).unwrap_err();
        assert!(err.to_string().contains("'NOPE'"));
    }

    #[test]
    fn configured_override_falls_back_to_dictionary() {
        let columns = cols(&["REFERENCE", "Quantité"]);
        let rule = ColumnRule::labels(&["Quantité"]);
        assert_eq!(
            resolve_role(&columns, Role::Quantity, None, Some("Quantity"), &rule).unwrap(),
            1
        );
        let columns = cols(&["REFERENCE", "Quantité", "S REEL"]);
        assert_eq!(
            resolve_role(&columns, Role::Quantity, None, Some("S REEL"), &rule).unwrap(),
            2
        );
    }
}
