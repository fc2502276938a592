// stockrecon CLI - declared stock vs workshop movement ledgers
// Human summaries go to stderr; --json and `request` print one JSON document on stdout.

mod exit_codes;
mod export;
mod request;
mod run;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use stockrecon_config::Settings;
use stockrecon_recon::{ReconError, Unit};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "stockrecon")]
#[command(about = "Reconcile declared stock against workshop movement ledgers")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Production unit (Fath1, Fath2, Fath3, Fath5, Fibre, Mdoukal, Larbaa, Oran, Mags).
    /// Defaults to `recon.defaultUnit` from settings.
    #[arg(long, short = 'u', global = true, env = "STOCKRECON_UNIT")]
    unit: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List production units
    #[command(after_help = "\
Examples:
  stockrecon units
  stockrecon units --json")]
    Units {
        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// List a unit's workshops in declared order
    #[command(after_help = "\
Examples:
  stockrecon workshops --unit Larbaa
  stockrecon workshops -u fath1 --json")]
    Workshops {
        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Match movement files to workshops by file name
    #[command(after_help = "\
A file goes to the first workshop (in declared order) whose keyword appears
in its lowercased name. Each workshop takes at most one file.

Examples:
  stockrecon match -u Fath1 uploads/*.xlsx
  stockrecon match -u Oran 'Movement block.xlsx' --json")]
    Match {
        /// Movement files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Show which sheet, header row and columns a run would use
    #[command(after_help = "\
Examples:
  stockrecon verify -u Fath1 --file bloc=bloc.xlsx
  stockrecon verify -u Larbaa --stock 'STOCK 03-2025.xlsx' --auto uploads/*.xlsx
  stockrecon verify -u Fath3 --file pet=pet.xlsx --sheet pet=MOUV --json")]
    Verify {
        /// Stock workbook to inspect as well
        #[arg(long)]
        stock: Option<PathBuf>,

        #[command(flatten)]
        inputs: run::InputArgs,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Reconcile declared stock against movement ledgers
    #[command(after_help = "\
Exit codes:
  0   all workshops processed
  10  unknown unit or workshop
  11  invalid month
  12  stock file could not be loaded
  13  one or more workshops failed
  14  discrepancies found (--strict only)

Examples:
  stockrecon run -u Fath1 --stock 'STOCK 03-2025.xlsx' --month 3 --file bloc=bloc.xlsx
  stockrecon run -u Larbaa --stock stock.xlsx --month 3 --year 2025 --auto uploads/*.xlsx --json
  stockrecon run -u Mags --stock 'STOCK 03-2025.xlsx' --prev-stock 'STOCK 02-2025.xlsx' --month 3 --file magz=mags.xlsx
  stockrecon run -u Fath5 --stock stock.xlsx --month 3 --file bonda=b.xlsx --qty-col bonda=Q-STOCKS --strict")]
    Run {
        /// Declared-stock workbook
        #[arg(long)]
        stock: PathBuf,

        /// Previous month's stock workbook (opening-balance units)
        #[arg(long)]
        prev_stock: Option<PathBuf>,

        /// Target month (1-12)
        #[arg(long, short = 'm')]
        month: String,

        /// Target year. Defaults to the year in the stock file name, then settings.
        #[arg(long, short = 'y')]
        year: Option<i32>,

        #[command(flatten)]
        inputs: run::InputArgs,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 14 when any discrepancy is found
        #[arg(long)]
        strict: bool,
    },

    /// Export a saved result file as CSV files or one workbook
    #[command(after_help = "\
CSV writes matches_<workshop>.csv and discrepancies_<workshop>.csv into the
output directory. xlsx writes one workbook with a Summary sheet.
Errored workshops and empty buckets are skipped.

Examples:
  stockrecon export result.json --format csv --out exports/
  stockrecon export result.json --format xlsx --out recon-03-2025.xlsx")]
    Export {
        /// Result JSON written by `run --json` or `run --output`
        results: PathBuf,

        /// Output format
        #[arg(long, short = 'f', default_value = "csv")]
        format: ExportFormat,

        /// Output directory (csv) or workbook path (xlsx).
        /// Defaults to `export.directory` from settings, then the current directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Answer one JSON request from a desktop front-end
    #[command(after_help = "\
Reads the request from the argument, or from stdin when it is omitted or '-'.
Actions: get_ateliers, match_files, process, verify, export, export_excel.
The response is always one JSON document on stdout with a `success` field.

Examples:
  stockrecon request '{\"action\":\"get_ateliers\",\"unit\":\"Fath1\"}'
  echo '{\"action\":\"process\",\"unit\":\"Mags\",...}' | stockrecon request")]
    Request {
        /// Request JSON
        json: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
            "\nrequest protocol: 1",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
            "\nrequest protocol: 1",
        )
    }
}

/// Log to stderr. `RUST_LOG` wins over the settings filter.
fn init_tracing(settings: &Settings) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();
    init_tracing(&settings);
    tracing::debug!("settings from {}", Settings::config_path_display());

    let unit = cli.unit;
    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: stockrecon <command> [options]");
            eprintln!("       stockrecon --help for more information");
            Ok(())
        }
        Some(Commands::Units { json }) => run::cmd_units(json),
        Some(Commands::Workshops { json }) => {
            resolve_unit(unit.as_deref(), &settings).and_then(|u| run::cmd_workshops(u, json))
        }
        Some(Commands::Match { files, json }) => {
            resolve_unit(unit.as_deref(), &settings).and_then(|u| run::cmd_match(u, files, json))
        }
        Some(Commands::Verify { stock, inputs, json }) => {
            resolve_unit(unit.as_deref(), &settings).and_then(|u| run::cmd_verify(u, stock, inputs, json))
        }
        Some(Commands::Run {
            stock,
            prev_stock,
            month,
            year,
            inputs,
            json,
            output,
            strict,
        }) => resolve_unit(unit.as_deref(), &settings).and_then(|u| {
            run::cmd_run(
                u,
                run::RunArgs {
                    stock,
                    prev_stock,
                    month,
                    year,
                    inputs,
                    json,
                    output,
                    strict,
                },
                &settings,
            )
        }),
        Some(Commands::Export { results, format, out, json }) => {
            export::cmd_export(results, format, out, json, &settings)
        }
        Some(Commands::Request { json }) => request::cmd_request(json, &settings),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// `--unit`, else `recon.defaultUnit`.
fn resolve_unit(arg: Option<&str>, settings: &Settings) -> Result<Unit, CliError> {
    let Some(id) = arg.or(settings.default_unit.as_deref()) else {
        return Err(CliError::args("no unit given")
            .with_hint("pass --unit <UNIT> or set \"recon.defaultUnit\" in settings"));
    };
    id.parse::<Unit>().map_err(|e| {
        let known: Vec<&str> = Unit::ALL.iter().map(|u| u.id()).collect();
        CliError::recon(e).with_hint(format!("known units: {}", known.join(", ")))
    })
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with its registry exit code.
    pub fn recon(err: ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
