use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by decoding, isochrone retrieval and configuration.
///
/// Per-feature defects (bad coordinates, degenerate geometry) never reach this
/// type; they are dropped where they are found.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{file}: unsupported format '.{extension}'")]
    UnsupportedFormat { file: String, extension: String },

    #[error("{file}: archive is corrupted ({reason})")]
    CorruptArchive { file: String, reason: String },

    #[error("{file}: geometry count ({geometries}) does not match attribute count ({attributes})")]
    GeometryAttributeMismatch { file: String, geometries: usize, attributes: usize },

    #[error("{file}: archive contains no shapefile, KML, spreadsheet or CSV member")]
    EmptyArchive { file: String },

    #[error("{file}: failed to read shapefile ({reason})")]
    Shapefile { file: String, reason: String },

    #[error("{file}: {reason}")]
    Projection { file: String, reason: String },

    #[error("{file}: invalid KML ({reason})")]
    Kml { file: String, reason: String },

    #[error("{file}: failed to read spreadsheet ({reason})")]
    Spreadsheet { file: String, reason: String },

    #[error("{file}: failed to read tabular data ({reason})")]
    Tabular { file: String, reason: String },

    #[error("{file}: invalid JSON ({source})")]
    Json { file: String, #[source] source: serde_json::Error },

    #[error("isochrones unavailable for {minutes:?} minutes: {reason}")]
    IsochroneUnavailable { minutes: Vec<f64>, reason: String },

    #[error("isochrone request failed: {0}")]
    Http(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
