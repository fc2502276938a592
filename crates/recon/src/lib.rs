//! `stockrecon-recon`: stock vs movement-ledger reconciliation engine.
//!
//! Reads spreadsheets through `stockrecon-io`, discovers sheets, header rows
//! and columns per unit profile, and returns classified per-workshop results.
//! No CLI or settings dependencies.

pub mod aggregate;
pub mod classify;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod export;
pub mod filter;
pub mod load;
pub mod locate;
pub mod matcher;
pub mod matching;
pub mod model;
pub mod normalize;
pub mod period;
pub mod registry;
pub mod strategy;
pub mod verify;

pub use config::UnitProfile;
pub use engine::{list_workshops, reconcile, run_batch};
pub use error::ReconError;
pub use evidence::{compute_summary, BatchSummary};
pub use export::{export_csv, export_xlsx};
pub use matching::match_files;
pub use model::{
    BatchOutcome, ComparisonRow, FileMatch, FileRef, MovementFile, ReconRequest, StockFile, WorkshopOverride,
    WorkshopResult,
};
pub use registry::{profile, Unit};
pub use verify::{verify, VerifyReport};
