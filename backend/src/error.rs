//! Recoverable errors of the binding layer
//!
//! Absence of a foreign object is not an error here: creation calls return
//! `Option` and failed children become null slots. This enum covers the
//! environment (finding and loading sourcekitd) and malformed input to the
//! JSON bridge.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceKitError {
    #[error("sourcekitd library not found (searched: {})", format_paths(.searched))]
    LibraryNotFound { searched: Vec<PathBuf> },

    #[error("Failed to load sourcekitd from {}: {reason}", .path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Symbol '{symbol}' missing from {}", .path.display())]
    MissingSymbol { symbol: &'static str, path: PathBuf },

    #[error("Number {0} cannot be represented as a sourcekitd int64")]
    UnsupportedNumber(String),

    #[error("Invalid request value: {0}")]
    InvalidRequest(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no candidates>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
