//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                |
//! |---------|------------|--------------------------------------------|
//! | 0       | Universal  | Success                                    |
//! | 1       | Universal  | General error (unspecified)                |
//! | 2       | Universal  | CLI usage error (bad args, missing unit)   |
//! | 3       | Universal  | File I/O error                             |
//! | 10-19   | recon      | Reconciliation outcomes                    |
//! | 20-29   | request    | JSON request protocol                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use stockrecon_recon::ReconError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Reading or writing a file failed.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Recon (10-19)
// =============================================================================

/// Unit or workshop not known to the registry.
pub const EXIT_RECON_UNKNOWN: u8 = 10;

/// Month outside 1-12 or not a number.
pub const EXIT_RECON_INVALID_MONTH: u8 = 11;

/// Stock file could not be loaded; the batch was aborted.
pub const EXIT_RECON_STOCK_LOAD: u8 = 12;

/// One or more workshops failed (or failed verification).
pub const EXIT_RECON_WORKSHOP_FAILED: u8 = 13;

/// Discrepancies found. Only with `run --strict`.
pub const EXIT_RECON_DISCREPANCIES: u8 = 14;

// =============================================================================
// Request (20-29)
// =============================================================================

/// Request is not valid JSON or lacks required fields.
pub const EXIT_REQUEST_MALFORMED: u8 = 20;

/// Request names an action this binary does not handle.
pub const EXIT_REQUEST_UNKNOWN_ACTION: u8 = 21;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::UnknownUnit(_) | ReconError::UnknownWorkshop(_) => EXIT_RECON_UNKNOWN,
        ReconError::InvalidMonth(_) => EXIT_RECON_INVALID_MONTH,
        ReconError::StockLoad(_) => EXIT_RECON_STOCK_LOAD,
        ReconError::Io(_) => EXIT_IO,
        ReconError::SheetNotFound { .. }
        | ReconError::RequiredColumnMissing { .. }
        | ReconError::Workshop(_) => EXIT_RECON_WORKSHOP_FAILED,
        ReconError::Profile { .. } => EXIT_ERROR,
    }
}
