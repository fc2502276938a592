use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The declared-stock workbook, plus the previous month's for opening-balance units.
///
/// Deserialises from a bare path or from `{"path", "prevPath"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StockFileRepr")]
pub struct StockFile {
    pub path: PathBuf,
    #[serde(default, rename = "prevPath", skip_serializing_if = "Option::is_none")]
    pub prev_path: Option<PathBuf>,
}

impl StockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), prev_path: None }
    }
}

/// Deserialises from a bare path or from `{"path", "name"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MovementFileRepr")]
pub struct MovementFile {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MovementFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), name: None }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StockFileRepr {
    Path(PathBuf),
    Full {
        path: PathBuf,
        #[serde(default, rename = "prevPath")]
        prev_path: Option<PathBuf>,
    },
}

impl From<StockFileRepr> for StockFile {
    fn from(repr: StockFileRepr) -> Self {
        match repr {
            StockFileRepr::Path(path) => Self::new(path),
            StockFileRepr::Full { path, prev_path } => Self { path, prev_path },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MovementFileRepr {
    Path(PathBuf),
    Full {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<MovementFileRepr> for MovementFile {
    fn from(repr: MovementFileRepr) -> Self {
        match repr {
            MovementFileRepr::Path(path) => Self::new(path),
            MovementFileRepr::Full { path, name } => Self { path, name },
        }
    }
}

/// Operator-designated sheet/columns for one workshop; wins over every configured candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty_col: Option<String>,
}

impl WorkshopOverride {
    pub fn is_empty(&self) -> bool {
        self.sheet_name.is_none() && self.ref_col.is_none() && self.qty_col.is_none()
    }
}

/// One reconciliation call: one stock file against N workshop movement files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconRequest {
    pub stock_file: StockFile,
    #[serde(default)]
    pub matched_files: BTreeMap<String, MovementFile>,
    #[serde(deserialize_with = "string_or_number")]
    pub month: String,
    /// Explicit target year; inferred from the stock file name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Used when neither `year` nor the stock file name gives one.
    #[serde(default = "default_year")]
    pub default_year: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, WorkshopOverride>,
}

pub const DEFAULT_TARGET_YEAR: i32 = 2025;

fn default_year() -> i32 {
    DEFAULT_TARGET_YEAR
}

impl ReconRequest {
    pub fn new(stock_file: StockFile, month: impl Into<String>) -> Self {
        Self {
            stock_file,
            matched_files: BTreeMap::new(),
            month: month.into(),
            year: None,
            default_year: DEFAULT_TARGET_YEAR,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, workshop: &str, path: impl Into<PathBuf>) -> Self {
        self.matched_files.insert(workshop.to_string(), MovementFile::new(path));
        self
    }
}

/// Front-ends send the month either as `"3"` or `3`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One reference after the outer join of stock and movement ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    #[serde(rename = "Ref")]
    pub reference: String,
    #[serde(rename = "Stock_Qty")]
    pub stock_qty: f64,
    /// Opening balance; only opening-balance units carry it.
    #[serde(rename = "Prev_Stock_Qty", default, skip_serializing_if = "Option::is_none")]
    pub prev_stock_qty: Option<f64>,
    #[serde(rename = "Calc_Mov_Qty")]
    pub calc_mov_qty: f64,
    #[serde(rename = "Difference")]
    pub difference: f64,
}

impl ComparisonRow {
    /// Quantity the movement ledger says should be on hand.
    pub fn expected_qty(&self) -> f64 {
        crate::normalize::round2(self.prev_stock_qty.unwrap_or(0.0) + self.calc_mov_qty)
    }
}

/// Per-workshop outcome: buckets, or an isolated error with empty buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkshopResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub matches: Vec<ComparisonRow>,
    #[serde(default)]
    pub discrepancies: Vec<ComparisonRow>,
}

impl WorkshopResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            matches: Vec::new(),
            discrepancies: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of one batch: the workshop map, or a single top-level error.
///
/// Serialises as `{workshop: result, ...}` or `{"_error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed(BTreeMap<String, WorkshopResult>),
    Aborted(String),
}

impl BatchOutcome {
    pub fn workshops(&self) -> Option<&BTreeMap<String, WorkshopResult>> {
        match self {
            Self::Completed(map) => Some(map),
            Self::Aborted(_) => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Aborted(msg) => Some(msg),
        }
    }
}

impl Serialize for BatchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Completed(map) => map.serialize(serializer),
            Self::Aborted(msg) => {
                let mut m = BTreeMap::new();
                m.insert("_error", msg);
                m.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for BatchOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        if let Some(reason) = raw.get("_error") {
            let msg = reason.as_str().map(str::to_string).unwrap_or_else(|| reason.to_string());
            return Ok(Self::Aborted(msg));
        }
        let mut map = BTreeMap::new();
        for (key, value) in raw {
            // Other metadata keys are reserved for callers
            if key.starts_with('_') {
                continue;
            }
            let result: WorkshopResult =
                serde_json::from_value(value).map_err(serde::de::Error::custom)?;
            map.insert(key, result);
        }
        Ok(Self::Completed(map))
    }
}

// ---------------------------------------------------------------------------
// Boundary results
// ---------------------------------------------------------------------------

/// An uploaded file offered for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileMatch {
    pub matched: BTreeMap<String, FileRef>,
    pub unmatched_files: Vec<FileRef>,
    pub unmatched_workshops: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(r: &str, stock: f64, mov: f64) -> ComparisonRow {
        ComparisonRow {
            reference: r.into(),
            stock_qty: stock,
            prev_stock_qty: None,
            calc_mov_qty: mov,
            difference: stock - mov,
        }
    }

    #[test]
    fn row_serialises_with_ledger_field_names() {
        let json = serde_json::to_value(row("A", 10.0, 7.5)).unwrap();
        assert_eq!(json["Ref"], "A");
        assert_eq!(json["Stock_Qty"], 10.0);
        assert_eq!(json["Calc_Mov_Qty"], 7.5);
        assert_eq!(json["Difference"], 2.5);
        assert!(json.get("Prev_Stock_Qty").is_none());
    }

    #[test]
    fn failed_workshop_has_empty_buckets() {
        let json = serde_json::to_value(WorkshopResult::failed("Unknown workshop: x")).unwrap();
        assert_eq!(json["error"], "Unknown workshop: x");
        assert_eq!(json["matches"].as_array().unwrap().len(), 0);
        assert_eq!(json["discrepancies"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn aborted_batch_serialises_as_top_level_error() {
        let outcome = BatchOutcome::Aborted("Failed to load stock file: boom".into());
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"_error":"Failed to load stock file: boom"}"#);

        let back: BatchOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn completed_batch_reads_back() {
        let mut map = BTreeMap::new();
        map.insert(
            "bloc".to_string(),
            WorkshopResult { error: None, matches: vec![row("A", 1.0, 1.0)], discrepancies: vec![] },
        );
        let outcome = BatchOutcome::Completed(map);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: BatchOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn request_accepts_numeric_month_and_prev_path() {
        let req: ReconRequest = serde_json::from_str(
            r#"{"stockFile":{"path":"STOCK 03-2025.xlsx","prevPath":"STOCK 02-2025.xlsx"},
                "matchedFiles":{"magz":{"path":"mags.xlsx"}},
                "month":3,
                "overrides":{"magz":{"refCol":"REF"}}}"#,
        )
        .unwrap();
        assert_eq!(req.month, "3");
        assert_eq!(req.default_year, DEFAULT_TARGET_YEAR);
        assert_eq!(req.stock_file.prev_path.as_deref(), Some(std::path::Path::new("STOCK 02-2025.xlsx")));
        assert_eq!(req.overrides["magz"].ref_col.as_deref(), Some("REF"));
    }

    #[test]
    fn request_accepts_bare_paths() {
        let req: ReconRequest = serde_json::from_str(
            r#"{"stockFile":"STOCK 03-2025.xlsx",
                "matchedFiles":{"bloc":"bloc.xlsx","femme 01":{"path":"f1.xlsx","name":"FEMME 01.xlsx"}},
                "month":"03"}"#,
        )
        .unwrap();
        assert_eq!(req.stock_file, StockFile::new("STOCK 03-2025.xlsx"));
        assert_eq!(req.matched_files["bloc"], MovementFile::new("bloc.xlsx"));
        assert_eq!(req.matched_files["femme 01"].name.as_deref(), Some("FEMME 01.xlsx"));
    }
}
