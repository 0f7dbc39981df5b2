//! Label Manifest
//!
//! A `;`-delimited table mapping each recording id to its 1-based failure
//! repetition. Extra columns are ignored; an empty label means the
//! recording has no ground truth.

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::StorageError;

const DELIMITER: u8 = b';';

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub failure_rep: Option<usize>,
}

/// Parsed manifest, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelManifest {
    entries: Vec<ManifestEntry>,
}

impl LabelManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn failure_rep(&self, id: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.failure_rep)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accepts `7`, `7.0` and surrounding whitespace
fn parse_rep(value: &str) -> Option<usize> {
    let value = value.trim();
    if let Ok(rep) = value.parse::<usize>() {
        return Some(rep);
    }
    let float = value.parse::<f64>().ok()?;
    (float.fract() == 0.0 && float >= 1.0 && float.is_finite()).then(|| float as usize)
}

/// Parse manifest text; `source` names the input in errors
pub fn parse_label_manifest(text: &str, source: &Path) -> Result<LabelManifest, StorageError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| StorageError::csv(source, e))?
        .iter()
        .map(str::to_lowercase)
        .collect();
    if columns.iter().all(String::is_empty) {
        return Err(StorageError::parse(source, 1, "manifest is empty"));
    }
    let column = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| StorageError::MissingColumn {
                path: source.to_path_buf(),
                column: name.to_string(),
            })
    };
    let id_col = column("id")?;
    let label_col = column("label")?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::csv(source, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let id = record.get(id_col).unwrap_or("");
        if id.is_empty() {
            debug!("Skipping manifest line {} without id", line);
            continue;
        }

        let raw_label = record.get(label_col).unwrap_or("");
        let failure_rep = if raw_label.is_empty() {
            warn!("{} has no failure label and is excluded from training", id);
            None
        } else {
            Some(parse_rep(raw_label).ok_or_else(|| {
                StorageError::parse(source, line, format!("invalid label {:?} for {}", raw_label, id))
            })?)
        };

        entries.push(ManifestEntry {
            id: id.to_string(),
            failure_rep,
        });
    }

    debug!("Read {} manifest entries from {}", entries.len(), source.display());
    Ok(LabelManifest { entries })
}

/// Read and parse a manifest file
pub fn read_label_manifest(path: impl AsRef<Path>) -> Result<LabelManifest, StorageError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    parse_label_manifest(&text, path)
}
