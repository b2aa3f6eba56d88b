#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident data ingestion.
//!
//! The public dataset ships as a spreadsheet with one sheet per period.
//! Each sheet is exported to CSV, merged into a single cached CSV by
//! [`cache::build_cache`], and read back as [`AccidentRecord`]s by
//! [`loader::load_records`]. Rows with missing or placeholder coordinates
//! are dropped along the way rather than reported as errors.
//!
//! [`AccidentRecord`]: bridge_accidents_accident_models::AccidentRecord

pub mod cache;
pub mod loader;
pub mod parsing;
pub mod progress;

/// Errors that can occur while reading or caching accident data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error reading or writing a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV parsing or writing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Cache manifest serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from the CSV header.
    #[error("{path} is missing required column '{column}'")]
    MissingColumn {
        /// Path to the CSV file.
        path: String,
        /// Name of the missing column.
        column: &'static str,
    },

    /// No sheet exports are configured and no cached CSV exists.
    #[error("No sheets configured and no cached data at {0}")]
    NoSheets(String),
}

impl SourceError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }
}
