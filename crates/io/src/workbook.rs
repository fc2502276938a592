// In-memory workbooks: every sheet materialised as a grid

use std::fmt;
use std::path::{Path, PathBuf};

use crate::grid::Grid;

/// A sheet addressed by name or by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef {
    Name(String),
    Index(usize),
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

impl From<&str> for SheetRef {
    fn from(name: &str) -> Self {
        SheetRef::Name(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Spreadsheet,
    /// Single-table delimited file; any sheet reference resolves to it.
    Delimited,
}

#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    kind: SourceKind,
    sheets: Vec<(String, Grid)>,
}

impl Workbook {
    /// Open a spreadsheet or delimited file and read it fully into memory.
    pub fn open(path: &Path) -> Result<Self, String> {
        if is_delimited(path) {
            let grid = crate::csv::read_grid(path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "CSV".to_string());
            return Ok(Self {
                path: path.to_path_buf(),
                kind: SourceKind::Delimited,
                sheets: vec![(name, grid)],
            });
        }

        let sheets = crate::xlsx::read_sheets(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            kind: SourceKind::Spreadsheet,
            sheets,
        })
    }

    pub fn from_sheets(path: impl Into<PathBuf>, sheets: Vec<(String, Grid)>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::Spreadsheet,
            sheets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Exact-name or positional lookup. Delimited files answer any reference.
    pub fn sheet(&self, sheet: &SheetRef) -> Option<(&str, &Grid)> {
        if self.kind == SourceKind::Delimited {
            return self.sheets.first().map(|(n, g)| (n.as_str(), g));
        }
        match sheet {
            SheetRef::Name(name) => self
                .sheets
                .iter()
                .find(|(n, _)| n == name)
                .map(|(n, g)| (n.as_str(), g)),
            SheetRef::Index(idx) => self.sheets.get(*idx).map(|(n, g)| (n.as_str(), g)),
        }
    }
}

fn is_delimited(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_lowercase();
            ext == "csv" || ext == "txt" || ext == "tsv"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    fn grid(label: &str) -> Grid {
        Grid::new(vec![vec![Cell::text(label)]])
    }

    #[test]
    fn lookup_by_name_and_index() {
        let wb = Workbook::from_sheets(
            "stock.xlsx",
            vec![("MOUV".into(), grid("a")), ("STOCK".into(), grid("b"))],
        );
        assert_eq!(wb.sheet(&SheetRef::from("STOCK")).unwrap().0, "STOCK");
        assert_eq!(wb.sheet(&SheetRef::Index(0)).unwrap().0, "MOUV");
        assert!(wb.sheet(&SheetRef::from("stock")).is_none());
        assert!(wb.sheet(&SheetRef::Index(5)).is_none());
    }

    #[test]
    fn delimited_answers_any_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("block.csv");
        fs::write(&path, "Date;REF;Q\n01/01/2025;A;1\n").unwrap();

        let wb = Workbook::open(&path).unwrap();
        assert_eq!(wb.kind(), SourceKind::Delimited);
        assert_eq!(wb.sheet_names(), vec!["block"]);
        let (name, g) = wb.sheet(&SheetRef::from("Movement Block")).unwrap();
        assert_eq!(name, "block");
        assert_eq!(g.height(), 2);
    }

    #[test]
    fn sheet_ref_display() {
        assert_eq!(SheetRef::from("MOV").to_string(), "'MOV'");
        assert_eq!(SheetRef::Index(0).to_string(), "#0");
    }
}
