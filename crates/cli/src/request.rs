//! `stockrecon request`: one JSON request in, one JSON response out.
//!
//! The front-end spawns the binary per call and reads stdout. Every outcome,
//! failures included, is a `{"success": ..}` document; the exit code mirrors
//! the failure for callers that check it.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use stockrecon_config::Settings;
use stockrecon_recon::model::MovementFile;
use stockrecon_recon::{
    export_csv, export_xlsx, list_workshops, match_files, reconcile, verify, BatchOutcome, FileRef, ReconError,
    ReconRequest, StockFile, Unit, WorkshopOverride,
};

use crate::exit_codes::{recon_exit_code, EXIT_IO, EXIT_REQUEST_MALFORMED, EXIT_REQUEST_UNKNOWN_ACTION};
use crate::CliError;

/// A handled failure: the message for the response, the code for the exit status.
#[derive(Debug)]
struct Failure {
    code: u8,
    message: String,
}

impl Failure {
    fn malformed(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REQUEST_MALFORMED, message: msg.into() }
    }
}

impl From<ReconError> for Failure {
    fn from(err: ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: err.to_string() }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Deserialize)]
struct UnitOnly {
    unit: String,
}

#[derive(Deserialize)]
struct MatchPayload {
    unit: String,
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct ProcessPayload {
    unit: String,
    #[serde(flatten)]
    request: ReconRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPayload {
    unit: String,
    #[serde(default)]
    matched_files: BTreeMap<String, MovementFile>,
    #[serde(default)]
    stock_file: Option<StockFile>,
    #[serde(default)]
    overrides: BTreeMap<String, WorkshopOverride>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportPayload {
    results: BatchOutcome,
    output_dir: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportExcelPayload {
    data: BatchOutcome,
    output_path: PathBuf,
}

fn payload<T: DeserializeOwned>(value: Value) -> Result<T, Failure> {
    serde_json::from_value(value).map_err(|e| Failure::malformed(format!("invalid request: {e}")))
}

fn parse_unit(id: &str) -> Result<Unit, Failure> {
    id.parse::<Unit>().map_err(Failure::from)
}

// ============================================================================
// Dispatch
// ============================================================================

/// Answer one request. `Ok` holds the response fields next to `success`.
fn handle(input: &str, settings: &Settings) -> Result<Map<String, Value>, Failure> {
    let mut value: Value =
        serde_json::from_str(input).map_err(|e| Failure::malformed(format!("invalid JSON: {e}")))?;
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Failure::malformed("request has no action"))?;
    tracing::debug!("request action '{action}'");

    let mut out = Map::new();
    match action.as_str() {
        "get_ateliers" => {
            let p: UnitOnly = payload(value)?;
            let ateliers = list_workshops(parse_unit(&p.unit)?)?;
            out.insert("ateliers".into(), json!(ateliers));
        }
        "match_files" => {
            let p: MatchPayload = payload(value)?;
            let result = match_files(parse_unit(&p.unit)?, p.files)?;
            out.insert("matched".into(), json!(result.matched));
            out.insert("unmatchedFiles".into(), json!(result.unmatched_files));
            out.insert("unmatchedAteliers".into(), json!(result.unmatched_workshops));
        }
        "process" => {
            // Settings fill the year fallback unless the caller sent one
            if let Some(obj) = value.as_object_mut() {
                obj.entry("defaultYear").or_insert_with(|| json!(settings.default_year));
            }
            let p: ProcessPayload = payload(value)?;
            let outcome = reconcile(parse_unit(&p.unit)?, &p.request);
            out.insert("results".into(), json!(outcome));
        }
        "verify" => {
            let p: VerifyPayload = payload(value)?;
            let stock = p.stock_file.as_ref().map(|s| s.path.as_path());
            let report = verify(parse_unit(&p.unit)?, &p.matched_files, stock, &p.overrides)?;
            out.insert("allOk".into(), json!(report.all_ok()));
            out.insert("verification".into(), json!(report));
        }
        "export" => {
            let p: ExportPayload = payload(value)?;
            let exported = match p.results.workshops() {
                Some(results) => export_csv(results, &p.output_dir, settings.export_bom)?,
                None => Vec::new(),
            };
            out.insert("exportedFiles".into(), json!(exported));
        }
        "export_excel" => {
            let p: ExportExcelPayload = payload(value)?;
            let results = p.data.workshops().cloned().unwrap_or_default();
            let path = export_xlsx(&results, &p.output_path)?;
            out.insert("exportedFiles".into(), json!([path]));
        }
        other => {
            return Err(Failure {
                code: EXIT_REQUEST_UNKNOWN_ACTION,
                message: format!("Unknown action: {other}"),
            });
        }
    }
    Ok(out)
}

fn respond(result: Result<Map<String, Value>, Failure>) -> (Value, Option<Failure>) {
    match result {
        Ok(fields) => {
            let mut body = Map::new();
            body.insert("success".into(), Value::Bool(true));
            body.extend(fields);
            (Value::Object(body), None)
        }
        Err(failure) => (json!({ "success": false, "error": failure.message }), Some(failure)),
    }
}

fn read_input(arg: Option<String>) -> Result<String, CliError> {
    match arg {
        Some(text) if text != "-" => Ok(text),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError { code: EXIT_IO, message: format!("cannot read stdin: {e}"), hint: None })?;
            Ok(buf)
        }
    }
}

pub fn cmd_request(arg: Option<String>, settings: &Settings) -> Result<(), CliError> {
    let input = read_input(arg)?;
    let (response, failure) = respond(handle(&input, settings));
    // One line: front-ends read the response line by line
    println!("{response}");

    match failure {
        None => Ok(()),
        // Already reported in the response body
        Some(f) => Err(CliError { code: f.code, message: String::new(), hint: None }),
    }
}
