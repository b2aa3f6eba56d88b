#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Study definitions for bridge before/after accident analysis.
//!
//! A study is described by a TOML file: the accident data to read, the
//! bridge corridor, the construction dates, and how to render the results.
//! Studies shipped with the crate are embedded at compile time (see
//! [`registry`]); others are loaded from disk with [`load_study`].

pub mod definition;
pub mod registry;

use std::path::Path;

use bridge_accidents_accident_models::InvalidWindowError;
use bridge_accidents_spatial::CorridorError;
use thiserror::Error;

pub use definition::{StudyDefinition, parse_study_toml};

/// Errors that can occur while loading or validating a study.
#[derive(Debug, Error)]
pub enum StudyError {
    /// Failed to read a study file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or does not match the study schema.
    #[error("Invalid study TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Neither a corridor width nor a calibration was configured.
    #[error("Corridor needs either `width` or a `[corridor.calibration]` section")]
    MissingWidth,

    /// The corridor geometry is invalid.
    #[error(transparent)]
    Corridor(#[from] CorridorError),

    /// The construction window is inverted.
    #[error(transparent)]
    Window(#[from] InvalidWindowError),

    /// A setting is out of range.
    #[error("Study '{study}': invalid {field}: {message}")]
    Invalid {
        /// Study identifier.
        study: String,
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// No embedded study has the requested id and no file exists at that path.
    #[error("Unknown study '{0}': not an embedded study id or an existing file")]
    UnknownStudy(String),
}

/// Loads and validates a study from a TOML file.
///
/// Relative source paths in the file are resolved against the file's
/// directory.
///
/// # Errors
///
/// Returns [`StudyError`] if the file cannot be read, parsed, or validated.
pub fn load_study(path: &Path) -> Result<StudyDefinition, StudyError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StudyError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut study = parse_study_toml(&contents)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        study = study.with_base_dir(parent);
    }
    study.validate()?;

    log::info!("Loaded study '{}' from {}", study.id, path.display());
    Ok(study)
}

/// Resolves a `--study` argument: an existing file path, an embedded study
/// id, or the default study when `None`.
///
/// # Errors
///
/// * [`StudyError::UnknownStudy`] if `arg` is neither a file nor an id
/// * any error from [`load_study`] or from validating the embedded study
pub fn resolve_study(arg: Option<&str>) -> Result<StudyDefinition, StudyError> {
    let Some(arg) = arg else {
        return registry::default_study();
    };

    let path = Path::new(arg);
    if path.is_file() {
        return load_study(path);
    }

    registry::embedded_study(arg)
}
