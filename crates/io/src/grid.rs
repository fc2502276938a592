// Untitled cell grids and the titled tables cut from them

use crate::cell::Cell;

static EMPTY_CELL: Cell = Cell::Empty;

/// Every row of one sheet, no header applied yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> &[Cell] {
        self.rows.get(idx).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn non_empty_count(&self, idx: usize) -> usize {
        self.row(idx).iter().filter(|c| !c.is_empty()).count()
    }

    /// Cut a table using `header_row` as column labels.
    ///
    /// Labels keep their raw text (untrimmed); blank labels become `Unnamed: <i>`.
    /// Fully empty data rows are dropped and short rows are padded.
    pub fn to_table(&self, header_row: usize) -> RawTable {
        let width = self.width();
        let header = self.row(header_row);
        let columns: Vec<String> = (0..width)
            .map(|i| match header.get(i) {
                Some(cell) if !cell.is_empty() => cell.display(),
                _ => format!("Unnamed: {i}"),
            })
            .collect();

        let rows = self
            .rows
            .iter()
            .skip(header_row + 1)
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .map(|r| {
                let mut row = r.clone();
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        RawTable { columns, rows }
    }
}

/// A titled table: column labels (not guaranteed unique) plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, col); out-of-range reads are `Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY_CELL)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, col: usize) -> Vec<&Cell> {
        (0..self.rows.len()).map(|r| self.cell(r, col)).collect()
    }
}
