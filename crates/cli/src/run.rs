//! `stockrecon units|workshops|match|verify|run`: the reconciliation commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use stockrecon_config::Settings;
use stockrecon_recon::model::MovementFile;
use stockrecon_recon::registry::strategy;
use stockrecon_recon::strategy::StrategyKind;
use stockrecon_recon::{
    compute_summary, match_files, profile, run_batch, verify, BatchOutcome, ReconRequest, StockFile, Unit,
    WorkshopOverride,
};

use crate::exit_codes::{recon_exit_code, EXIT_RECON_DISCREPANCIES, EXIT_RECON_WORKSHOP_FAILED};
use crate::util::{file_ref, pairs, print_json, to_json, write_output};
use crate::CliError;

/// Movement inputs shared by `verify` and `run`.
#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// Movement file for a workshop (repeatable)
    #[arg(long = "file", value_name = "WORKSHOP=PATH")]
    pub files: Vec<String>,

    /// Match these files to workshops by file name; --file wins for a workshop
    #[arg(long, num_args = 1.., value_name = "FILES")]
    pub auto: Vec<PathBuf>,

    /// Read this sheet for a workshop instead of the configured ones
    #[arg(long = "sheet", value_name = "WORKSHOP=NAME")]
    pub sheets: Vec<String>,

    /// Reference column for a workshop
    #[arg(long = "ref-col", value_name = "WORKSHOP=COLUMN")]
    pub ref_cols: Vec<String>,

    /// Quantity column for a workshop
    #[arg(long = "qty-col", value_name = "WORKSHOP=COLUMN")]
    pub qty_cols: Vec<String>,
}

impl InputArgs {
    /// Matched movement files: `--auto` matches first, explicit `--file` on top.
    fn matched_files(&self, unit: Unit) -> Result<BTreeMap<String, MovementFile>, CliError> {
        let mut matched = BTreeMap::new();

        if !self.auto.is_empty() {
            let refs = self.auto.iter().map(|p| file_ref(p)).collect();
            let result = match_files(unit, refs).map_err(CliError::recon)?;
            for file in &result.unmatched_files {
                eprintln!("note: no workshop matched {}", file.name);
            }
            for (key, file) in result.matched {
                matched.insert(
                    key,
                    MovementFile {
                        path: file.path,
                        name: Some(file.name),
                    },
                );
            }
        }

        for (key, path) in pairs(&self.files, "--file")? {
            matched.insert(key, MovementFile::new(path));
        }

        if matched.is_empty() {
            return Err(CliError::args("no movement files given")
                .with_hint("pass --file WORKSHOP=PATH or --auto FILES..."));
        }
        Ok(matched)
    }

    fn overrides(&self) -> Result<BTreeMap<String, WorkshopOverride>, CliError> {
        let mut overrides: BTreeMap<String, WorkshopOverride> = BTreeMap::new();
        for (key, sheet) in pairs(&self.sheets, "--sheet")? {
            overrides.entry(key).or_default().sheet_name = Some(sheet);
        }
        for (key, col) in pairs(&self.ref_cols, "--ref-col")? {
            overrides.entry(key).or_default().ref_col = Some(col);
        }
        for (key, col) in pairs(&self.qty_cols, "--qty-col")? {
            overrides.entry(key).or_default().qty_col = Some(col);
        }
        Ok(overrides)
    }
}

// ============================================================================
// units / workshops / match
// ============================================================================

#[derive(Serialize)]
struct UnitInfo {
    id: &'static str,
    name: &'static str,
    strategy: StrategyKind,
    workshops: usize,
}

pub fn cmd_units(json: bool) -> Result<(), CliError> {
    let mut units = Vec::new();
    for unit in Unit::ALL {
        let strategy = strategy(unit).map_err(CliError::recon)?;
        units.push(UnitInfo {
            id: unit.id(),
            name: strategy.profile().name.as_str(),
            strategy: strategy.kind(),
            workshops: strategy.workshops().len(),
        });
    }

    if json {
        return print_json(&units);
    }
    for u in &units {
        println!("{:<8} {:<12} {} workshop(s)", u.id, u.name, u.workshops);
    }
    Ok(())
}

#[derive(Serialize)]
struct WorkshopInfo<'a> {
    key: &'a str,
    keyword: &'a str,
}

pub fn cmd_workshops(unit: Unit, json: bool) -> Result<(), CliError> {
    let profile = profile(unit).map_err(CliError::recon)?;
    let workshops: Vec<WorkshopInfo> = profile
        .workshops
        .iter()
        .map(|ws| WorkshopInfo {
            key: ws.key.as_str(),
            keyword: ws.keyword(),
        })
        .collect();

    if json {
        return print_json(&workshops);
    }
    for ws in &workshops {
        if ws.keyword == ws.key {
            println!("{:?}", ws.key);
        } else {
            println!("{:?} (keyword {:?})", ws.key, ws.keyword);
        }
    }
    Ok(())
}

pub fn cmd_match(unit: Unit, files: Vec<PathBuf>, json: bool) -> Result<(), CliError> {
    let refs = files.iter().map(|p| file_ref(p)).collect();
    let result = match_files(unit, refs).map_err(CliError::recon)?;

    if json {
        return print_json(&result);
    }
    for (key, file) in &result.matched {
        println!("{key:?} <- {}", file.path.display());
    }
    for file in &result.unmatched_files {
        eprintln!("unmatched file: {}", file.path.display());
    }
    if !result.unmatched_workshops.is_empty() {
        eprintln!("workshops without a file: {}", result.unmatched_workshops.join(", "));
    }
    Ok(())
}

// ============================================================================
// verify
// ============================================================================

pub fn cmd_verify(unit: Unit, stock: Option<PathBuf>, inputs: InputArgs, json: bool) -> Result<(), CliError> {
    let files = inputs.matched_files(unit)?;
    let overrides = inputs.overrides()?;
    let report = verify(unit, &files, stock.as_deref(), &overrides).map_err(CliError::recon)?;

    if json {
        print_json(&report)?;
    } else {
        for (key, entry) in &report.workshops {
            let status = if entry.ok { "ok" } else { "FAIL" };
            eprintln!("{key}: {status} {}", entry.path.display());
            if let Some(sheet) = &entry.sheet {
                let row = entry.header_row.map(|r| r.to_string()).unwrap_or_default();
                let detected = if entry.header_detected { "" } else { " (fallback)" };
                eprintln!("  sheet '{sheet}', header row {row}{detected}");
            }
            for (role, column) in &entry.resolved {
                eprintln!("  {role}: {column:?}");
            }
            if !entry.missing.is_empty() {
                let missing: Vec<String> = entry.missing.iter().map(|r| r.to_string()).collect();
                eprintln!("  missing: {}", missing.join(", "));
                eprintln!("  columns: {:?}", entry.columns);
            }
            if let Some(error) = &entry.error {
                eprintln!("  error: {error}");
            }
        }
        if let Some(stock) = &report.stock {
            let status = if stock.ok { "ok" } else { "FAIL" };
            eprintln!("stock: {status} {}", stock.path.display());
            for (sheet, present) in &stock.stock_sheets {
                eprintln!("  {sheet}: {}", if *present { "present" } else { "missing" });
            }
            if let Some(error) = &stock.error {
                eprintln!("  error: {error}");
            }
        }
    }

    if !report.all_ok() {
        return Err(CliError {
            code: EXIT_RECON_WORKSHOP_FAILED,
            message: "verification failed".to_string(),
            hint: Some("use --sheet/--ref-col/--qty-col to point at the right sheet or columns".to_string()),
        });
    }
    Ok(())
}

// ============================================================================
// run
// ============================================================================

pub struct RunArgs {
    pub stock: PathBuf,
    pub prev_stock: Option<PathBuf>,
    pub month: String,
    pub year: Option<i32>,
    pub inputs: InputArgs,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub strict: bool,
}

pub fn cmd_run(unit: Unit, args: RunArgs, settings: &Settings) -> Result<(), CliError> {
    let request = ReconRequest {
        stock_file: StockFile {
            path: args.stock,
            prev_path: args.prev_stock,
        },
        matched_files: args.inputs.matched_files(unit)?,
        month: args.month,
        year: args.year,
        default_year: settings.default_year,
        overrides: args.inputs.overrides()?,
    };

    let (outcome, batch_error) = match run_batch(unit, &request) {
        Ok(map) => (BatchOutcome::Completed(map), None),
        Err(e) => (BatchOutcome::Aborted(e.to_string()), Some(e)),
    };

    let json_str = to_json(&outcome)?;
    if let Some(path) = &args.output {
        write_output(path, &json_str)?;
    }
    if args.json {
        println!("{json_str}");
    }

    if let Some(e) = batch_error {
        return Err(CliError {
            code: recon_exit_code(&e),
            message: e.to_string(),
            hint: None,
        });
    }
    let Some(results) = outcome.workshops() else {
        return Ok(());
    };

    // Human summary to stderr
    let summary = compute_summary(results);
    for (key, ws) in &summary.per_workshop {
        match &ws.error {
            Some(error) => eprintln!("{key}: error: {error}"),
            None => eprintln!(
                "{key}: {} matched, {} discrepancies (|diff| {})",
                ws.matches, ws.discrepancies, ws.abs_difference
            ),
        }
    }
    eprintln!(
        "{unit}: {} workshop(s), {} failed, {} matched, {} discrepancies",
        summary.workshops, summary.failed, summary.matches, summary.discrepancies
    );

    if summary.has_failures() {
        return Err(CliError {
            code: EXIT_RECON_WORKSHOP_FAILED,
            message: format!("{} workshop(s) failed", summary.failed),
            hint: Some("run `stockrecon verify` on the failing files".to_string()),
        });
    }
    if args.strict && summary.has_discrepancies() {
        return Err(CliError {
            code: EXIT_RECON_DISCREPANCIES,
            message: "discrepancies found".to_string(),
            hint: None,
        });
    }
    Ok(())
}
