//! Pair uploaded movement files with workshops by file-name keyword.

use crate::config::WorkshopSpec;
use crate::error::ReconError;
use crate::model::{FileMatch, FileRef};
use crate::registry::{strategy, Unit};

/// Whether a lowercased file name carries a workshop's keyword, either whole
/// or as every one of its whitespace-separated parts.
fn keyword_hits(name: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.trim().is_empty() {
        return false;
    }
    if name.contains(&keyword) {
        return true;
    }
    keyword.split_whitespace().all(|part| name.contains(part))
}

/// Match files to workshops in declared workshop order.
///
/// A file goes to the first still-unmatched workshop whose keyword it
/// carries. Each workshop takes at most one file.
pub fn match_against(workshops: &[WorkshopSpec], files: Vec<FileRef>) -> FileMatch {
    let mut result = FileMatch::default();

    for file in files {
        let name = file.name.to_lowercase();
        let hit = workshops
            .iter()
            .find(|ws| !result.matched.contains_key(&ws.key) && keyword_hits(&name, ws.keyword()));
        match hit {
            Some(ws) => {
                log::debug!("'{}' matched workshop '{}'", file.name, ws.key);
                result.matched.insert(ws.key.clone(), file);
            }
            None => result.unmatched_files.push(file),
        }
    }

    result.unmatched_workshops = workshops
        .iter()
        .filter(|ws| !result.matched.contains_key(&ws.key))
        .map(|ws| ws.key.clone())
        .collect();
    result
}

pub fn match_files(unit: Unit, files: Vec<FileRef>) -> Result<FileMatch, ReconError> {
    Ok(match_against(&strategy(unit)?.profile().workshops, files))
}
