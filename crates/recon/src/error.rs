use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// Unit identifier not in the registry.
    UnknownUnit(String),
    /// Workshop key not configured for the unit.
    UnknownWorkshop(String),
    /// Month outside 1-12 or not a number.
    InvalidMonth(String),
    /// None of the candidate sheets exist in the workbook.
    SheetNotFound { candidates: Vec<String>, path: String },
    /// No column matched a required role.
    RequiredColumnMissing { role: String, available: Vec<String> },
    /// Shared stock could not be loaded; aborts the whole batch.
    StockLoad(String),
    /// Anything else that fails one workshop.
    Workshop(String),
    /// Embedded unit profile failed to parse or validate.
    Profile { unit: String, message: String },
    /// IO error (file open, read, write).
    Io(String),
}

impl ReconError {
    pub fn missing_column(role: &str, available: &[String]) -> Self {
        Self::RequiredColumnMissing {
            role: role.to_string(),
            available: available.to_vec(),
        }
    }

    /// Errors that abort the batch rather than one workshop.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::StockLoad(_) | Self::InvalidMonth(_) | Self::UnknownUnit(_) | Self::Profile { .. }
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUnit(unit) => write!(f, "unknown unit: {unit}"),
            Self::UnknownWorkshop(key) => write!(f, "Unknown workshop: {key}"),
            Self::InvalidMonth(month) => write!(f, "invalid month '{month}' (expected 1-12)"),
            Self::SheetNotFound { candidates, path } => {
                write!(f, "Could not find any of the sheets [{}] in {path}", candidates.join(", "))
            }
            Self::RequiredColumnMissing { role, available } => {
                write!(f, "Could not find {role} column. Available: {available:?}")
            }
            Self::StockLoad(msg) => write!(f, "Failed to load stock file: {msg}"),
            Self::Workshop(msg) => write!(f, "{msg}"),
            Self::Profile { unit, message } => write!(f, "unit profile '{unit}': {message}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_lists_available_labels() {
        let err = ReconError::missing_column("reference", &["Date".to_string(), "Qty".to_string()]);
        assert_eq!(
            err.to_string(),
            r#"Could not find reference column. Available: ["Date", "Qty"]"#
        );
        assert!(!err.is_batch_fatal());
    }

    #[test]
    fn stock_failures_abort_the_batch() {
        let err = ReconError::StockLoad("Could not find any of the sheets ['STOCKS'] in s.xlsx".into());
        assert!(err.is_batch_fatal());
        assert!(err.to_string().starts_with("Failed to load stock file: "));
    }
}
