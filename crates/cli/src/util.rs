use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use stockrecon_recon::FileRef;

use crate::CliError;

/// Split a `KEY=VALUE` argument. The key is everything before the first `=`,
/// so values may contain `=` but workshop keys may not.
pub(crate) fn split_pair(arg: &str, flag: &str) -> Result<(String, String), CliError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::args(format!("invalid {flag} '{arg}'"))
            .with_hint(format!("expected {flag} WORKSHOP=VALUE"))),
    }
}

/// Collect repeated `KEY=VALUE` flags; the last one for a key wins.
pub(crate) fn pairs(args: &[String], flag: &str) -> Result<BTreeMap<String, String>, CliError> {
    let mut out = BTreeMap::new();
    for arg in args {
        let (key, value) = split_pair(arg, flag)?;
        out.insert(key, value);
    }
    Ok(out)
}

/// A path offered for matching, named by its file name.
pub(crate) fn file_ref(path: &Path) -> FileRef {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    FileRef {
        name,
        path: path.to_path_buf(),
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::eval(format!("JSON serialization error: {e}")))
}

/// Print exactly one JSON document on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = to_json(value)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").map_err(|e| CliError::io(e.to_string()))
}

pub(crate) fn write_output(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
