#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Renders the results of a bridge accident study.
//!
//! Three kinds of output are produced:
//!
//! * a standalone Leaflet map (`accident-map.html`) plus the underlying
//!   `GeoJSON` (`accidents.geojson`), see [`map`];
//! * an SVG bar chart of accidents per quarter, optionally rasterized to PNG
//!   with `ImageMagick`, see [`chart`];
//! * an animated GIF of accidents appearing month by month, built from
//!   per-frame HTML pages screenshotted by a headless browser and stitched
//!   together with `ImageMagick`, see [`animation`], [`capture`], and [`gif`].
//!
//! External tools are run as blocking subprocesses. A failure is reported
//! as [`GenerateError::ExternalTool`] and never retried.

pub mod animation;
pub mod capture;
pub mod chart;
pub mod gif;
pub mod map;

use std::path::Path;
use std::process::Command;

/// Leaflet map page.
pub const MAP_HTML: &str = "accident-map.html";

/// `GeoJSON` of the in-scope accidents and the corridor outline.
pub const ACCIDENTS_GEOJSON: &str = "accidents.geojson";

/// Quarterly bar chart.
pub const CHART_SVG: &str = "accidents-before-vs-after.svg";

/// Rasterized quarterly bar chart.
pub const CHART_PNG: &str = "accidents-before-vs-after.png";

/// Aggregated study report.
pub const REPORT_JSON: &str = "report.json";

/// Directory holding per-frame HTML pages and screenshots.
pub const FRAMES_DIR: &str = "frames";

/// Animation with uniform frame delays.
pub const ANIMATION_GIF: &str = "animation.gif";

/// Animation with delays weighted by the gap between frames.
pub const ANIMATION_WEIGHTED_GIF: &str = "animation_weighted.gif";

/// Errors that can occur while rendering outputs.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Failed to read or write an output file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external program could not be started or exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ExternalTool {
        /// Program name.
        tool: String,
        /// Spawn error or exit status.
        message: String,
    },

    /// There are no frames to animate.
    #[error("No animation frames: no accidents fall inside the animated months")]
    EmptyAnimation,

    /// Frame and delay lists differ in length.
    #[error("Got {frames} frames but {delays} delays")]
    DelayMismatch {
        /// Number of frames.
        frames: usize,
        /// Number of delays.
        delays: usize,
    },
}

pub(crate) fn io(path: &Path, source: std::io::Error) -> GenerateError {
    GenerateError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `contents` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`GenerateError::Io`] if a directory or the file cannot be
/// written.
pub fn write_output(path: &Path, contents: &str) -> Result<(), GenerateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| io(path, e))?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Runs an external program to completion.
///
/// # Errors
///
/// Returns [`GenerateError::ExternalTool`] if the program cannot be started
/// or exits with a non-zero status.
pub(crate) fn run_tool(cmd: &mut Command) -> Result<(), GenerateError> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    log::debug!("Running {tool} with {} arguments", cmd.get_args().count());

    let status = cmd.status().map_err(|e| GenerateError::ExternalTool {
        tool: tool.clone(),
        message: e.to_string(),
    })?;

    if !status.success() {
        return Err(GenerateError::ExternalTool {
            tool,
            message: format!("exited with {status}"),
        });
    }
    Ok(())
}

/// Escapes text for inclusion in HTML or SVG markup.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
