// File I/O: spreadsheet and delimited grids in, delimited and xlsx tables out

pub mod cell;
pub mod csv;
pub mod grid;
pub mod workbook;
pub mod xlsx;

pub use cell::Cell;
pub use grid::{Grid, RawTable};
pub use workbook::{SheetRef, SourceKind, Workbook};
