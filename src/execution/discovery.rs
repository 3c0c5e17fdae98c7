//! Input discovery, resolved once at batch start

use crate::core::{config::InputConfig, error::BatchError};
use regex::Regex;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Resolve the input file set
///
/// Explicit files are always kept, even when missing, so that they surface
/// as failed runs instead of silently disappearing. Directory entries are
/// filtered by `pattern` on the file name. The result is de-duplicated and
/// in natural order.
pub fn discover(inputs: &InputConfig) -> Result<Vec<PathBuf>, BatchError> {
    let mut files: Vec<PathBuf> = inputs.files.clone();
    for file in &inputs.files {
        if !file.exists() {
            warn!("Input file {} does not exist", file.display());
        }
    }

    if let Some(directory) = &inputs.directory {
        let pattern = inputs.pattern.as_deref().map(Regex::new).transpose()?;
        let entries = std::fs::read_dir(directory).map_err(|source| BatchError::Discovery {
            path: directory.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| BatchError::Discovery {
                path: directory.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if pattern.as_ref().map_or(true, |p| p.is_match(&name)) {
                files.push(path);
            }
        }
    }

    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    files.dedup();

    if files.is_empty() {
        return Err(BatchError::NoInputs);
    }
    debug!("Discovered {} input file(s)", files.len());
    Ok(files)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Text(String),
    Number(u64),
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Case-insensitive text runs alternating with numeric runs
fn natural_key(text: &str) -> Vec<Chunk> {
    let mut key = Vec::new();
    let mut last = 0;
    for found in digits().find_iter(text) {
        key.push(Chunk::Text(text[last..found.start()].to_lowercase()));
        key.push(Chunk::Number(found.as_str().parse().unwrap_or(u64::MAX)));
        last = found.end();
    }
    key.push(Chunk::Text(text[last..].to_lowercase()));
    key
}

/// Natural ordering: `tomo2` sorts before `tomo10`
///
/// Ties between equal keys (`a01` and `a1`) fall back to plain comparison
/// so the order stays total and deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b)).then_with(|| a.cmp(b))
}
