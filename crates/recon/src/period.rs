//! Target period of a reconciliation call.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ReconError;

static STOCK_FILE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)stock\s*\d{1,2}\s*[-_](\d{4})").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month before; January rolls back to December of the previous year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{}", self.month, self.year)
    }
}

/// `"3"`, `"03"` and `" 3 "` are March; anything outside 1-12 is rejected.
pub fn parse_month(month: &str) -> Result<u32, ReconError> {
    match month.trim().parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(ReconError::InvalidMonth(month.to_string())),
    }
}

/// Year embedded in a stock file name such as `STOCK 11-2025 (1).xlsx`.
pub fn infer_year_from_filename(path: &Path) -> Option<i32> {
    let name = path.file_name()?.to_string_lossy();
    STOCK_FILE_YEAR
        .captures(&name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Explicit year, else the stock file name's, else `default_year`.
pub fn resolve_year(explicit: Option<i32>, stock_path: &Path, default_year: i32) -> i32 {
    if let Some(year) = explicit {
        return year;
    }
    match infer_year_from_filename(stock_path) {
        Some(year) => {
            log::debug!("target year {year} inferred from {}", stock_path.display());
            year
        }
        None => default_year,
    }
}
