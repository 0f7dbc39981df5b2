//! Storage Layer
//!
//! File-backed inputs and artifacts of the pipeline: the label manifest,
//! per-recording signal files, the master dataset table and the model
//! bundle.

mod bundle;
mod dataset;
mod manifest;
mod signals;

pub use bundle::{load_bundle, save_bundle};
pub use dataset::{dataset_columns, read_master_dataset, write_master_dataset};
pub use manifest::{parse_label_manifest, read_label_manifest, LabelManifest, ManifestEntry};
pub use signals::{
    parse_recording, write_recording, ChannelLookup, DirectorySignalSource, InMemorySignalSource,
    Recording, SignalSource,
};

use std::path::PathBuf;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}: missing column {column}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Incompatible model bundle: {0}")]
    IncompatibleBundle(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Map a reader error onto the line it was raised at
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let line = source.position().map_or(0, |p| p.line() as usize);
        Self::parse(path, line, source.to_string())
    }
}
