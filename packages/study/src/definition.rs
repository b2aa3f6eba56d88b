//! Config-driven study definition.
//!
//! [`StudyDefinition`] captures everything specific to one bridge study:
//! where the data lives, the corridor geometry, the construction dates, and
//! the presentation settings for the map, chart, and animation. Every
//! section except `source`, `corridor`, and `construction` has defaults.

use std::path::{Path, PathBuf};

use bridge_accidents_accident_models::{ConstructionState, ConstructionWindow};
use bridge_accidents_source::cache::SheetLayout;
use bridge_accidents_spatial::{Corridor, GeoPoint, calibrated_width};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::StudyError;

/// Smallest chart width, in inches, that leaves room for both panels
/// beside the axis margins.
pub const MIN_CHART_WIDTH_IN: f64 = 2.0;

/// Smallest chart height, in inches, that leaves room for the panel below
/// the facet strip and above the axis labels.
pub const MIN_CHART_HEIGHT_IN: f64 = 2.0;

// ── Top-level study definition ───────────────────────────────────────────

/// A complete before/after study.
#[derive(Debug, Clone, Deserialize)]
pub struct StudyDefinition {
    /// Unique identifier (e.g., `"lafayette_bridge"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Where the accident data comes from.
    pub source: SourceConfig,
    /// Bridge corridor geometry.
    pub corridor: CorridorConfig,
    /// Construction dates.
    pub construction: ConstructionConfig,
    /// Legend labels.
    #[serde(default)]
    pub labels: Labels,
    /// Static map settings.
    #[serde(default)]
    pub map: MapConfig,
    /// Quarterly bar chart settings.
    #[serde(default)]
    pub chart: ChartConfig,
    /// Animated map settings.
    #[serde(default)]
    pub animation: AnimationConfig,
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Input files for a study.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// CSV exports of the raw spreadsheet sheets, in order.
    #[serde(default)]
    pub sheets: Vec<PathBuf>,
    /// Path of the merged, cleaned CSV.
    pub cache: PathBuf,
    /// Column positions within each sheet export.
    #[serde(default)]
    pub layout: SheetLayout,
}

/// Corridor endpoints plus either an explicit width or a calibration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorridorConfig {
    /// South end of the bridge.
    pub bottom: GeoPoint,
    /// North end of the bridge.
    pub top: GeoPoint,
    /// Corridor width in degrees. Takes precedence over `calibration`.
    #[serde(default)]
    pub width: Option<f64>,
    /// Derive the width from two markers on either side of the deck.
    #[serde(default)]
    pub calibration: Option<Calibration>,
}

/// Two reference markers across the bridge deck.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Calibration {
    /// Marker on one side of the deck.
    pub left: GeoPoint,
    /// Marker on the other side.
    pub right: GeoPoint,
    /// Multiplier applied to the measured distance.
    #[serde(default = "default_buffer_factor")]
    pub buffer_factor: f64,
}

const fn default_buffer_factor() -> f64 {
    1.1
}

/// Construction dates. Records between `start` and `end` inclusive are
/// excluded; `split` separates before from after.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConstructionConfig {
    /// First day of construction.
    pub start: NaiveDate,
    /// Last day of construction.
    pub end: NaiveDate,
    /// Before/after split date. Defaults to `start`.
    #[serde(default)]
    pub split: Option<NaiveDate>,
}

/// Legend labels for each construction state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Label for records before construction.
    pub before: String,
    /// Label for records after construction.
    pub after: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            before: "before".to_string(),
            after: "after".to_string(),
        }
    }
}

impl Labels {
    /// Returns the label for `state`.
    #[must_use]
    pub fn for_state(&self, state: ConstructionState) -> &str {
        match state {
            ConstructionState::Before => &self.before,
            ConstructionState::After => &self.after,
        }
    }
}

/// South-west and north-east corners of a map view.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MapBounds {
    /// South-west corner.
    pub south_west: GeoPoint,
    /// North-east corner.
    pub north_east: GeoPoint,
}

/// Static map settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map width in pixels.
    pub width: u32,
    /// Map height in pixels.
    pub height: u32,
    /// Leaflet tile URL template.
    pub tiles: String,
    /// Tile attribution HTML.
    pub attribution: String,
    /// Fit the view to these bounds. Defaults to the padded corridor.
    pub bounds: Option<MapBounds>,
    /// Padding in degrees around the corridor when `bounds` is unset.
    pub padding: f64,
    /// Legend position. Defaults to the top-left of the view.
    pub legend: Option<GeoPoint>,
    /// Date label position in animation frames. Defaults to the bottom-left.
    pub date_label: Option<GeoPoint>,
    /// Circle radius in meters on the static map.
    pub marker_radius: f64,
    /// Circle fill opacity on the static map.
    pub marker_opacity: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 550,
            height: 550,
            tiles: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors &copy; CARTO".to_string(),
            bounds: None,
            padding: 0.002,
            legend: None,
            date_label: None,
            marker_radius: 15.0,
            marker_opacity: 0.3,
        }
    }
}

/// Quarterly bar chart settings. Dimensions are in inches.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Chart width in inches.
    pub width: f64,
    /// Chart height in inches.
    pub height: f64,
    /// Raster resolution for PNG output.
    pub dpi: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 6.0,
            dpi: 150,
        }
    }
}

/// Animated map settings. Delays are in hundredths of a second.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// First month start in the timeline.
    pub first_month: NaiveDate,
    /// Last month start in the timeline.
    pub last_month: NaiveDate,
    /// Decay steps per accident; each accident appears in `steps + 1` frames.
    pub steps: u32,
    /// Circle radius in meters when an accident first appears.
    pub radius_max: f64,
    /// Circle radius once it has settled.
    pub radius_min: f64,
    /// Fill opacity when an accident first appears.
    pub opacity_max: f64,
    /// Fill opacity once it has settled.
    pub opacity_min: f64,
    /// Delay of a regular frame.
    pub frame_delay: u32,
    /// Delay of the intro frame.
    pub intro_delay: u32,
    /// Delay of the last frame before construction.
    pub pause_delay: u32,
    /// GIF loop count (`0` loops forever).
    pub loop_count: u32,
    /// Browser window height; taller than the map to fit browser chrome.
    pub window_height: u32,
    /// Target runtime for weighted delays.
    pub runtime: u32,
    /// Day gap substituted for the largest gap in weighted delays.
    pub gap_days: u32,
    /// Day gap assigned to the final frame in weighted delays.
    pub final_days: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            first_month: NaiveDate::from_ymd_opt(2007, 1, 1).unwrap_or_default(),
            last_month: NaiveDate::from_ymd_opt(2018, 12, 1).unwrap_or_default(),
            steps: 4,
            radius_max: 60.0,
            radius_min: 17.0,
            opacity_max: 0.9,
            opacity_min: 0.3,
            frame_delay: 1,
            intro_delay: 50,
            pause_delay: 100,
            loop_count: 1,
            window_height: 625,
            runtime: 3000,
            gap_days: 21,
            final_days: 20,
        }
    }
}

// ── Derived values ───────────────────────────────────────────────────────

impl StudyDefinition {
    /// Builds the corridor from the endpoints and width.
    ///
    /// # Errors
    ///
    /// * [`StudyError::MissingWidth`] if neither `width` nor `calibration`
    ///   is set
    /// * [`StudyError::Corridor`] if the geometry is invalid
    pub fn corridor(&self) -> Result<Corridor, StudyError> {
        let cfg = &self.corridor;
        let width = match (cfg.width, cfg.calibration) {
            (Some(width), calibration) => {
                if calibration.is_some() {
                    log::debug!("{}: explicit corridor width overrides calibration", self.id);
                }
                width
            }
            (None, Some(c)) => calibrated_width(c.left, c.right, c.buffer_factor)?,
            (None, None) => return Err(StudyError::MissingWidth),
        };

        Ok(Corridor::new(cfg.bottom, cfg.top, width)?)
    }

    /// Builds the construction window.
    ///
    /// # Errors
    ///
    /// * [`StudyError::Window`] if `end` precedes `start`
    pub fn window(&self) -> Result<ConstructionWindow, StudyError> {
        Ok(ConstructionWindow::new(
            self.construction.start,
            self.construction.end,
        )?)
    }

    /// Date separating before from after.
    #[must_use]
    pub fn split_date(&self) -> NaiveDate {
        self.construction.split.unwrap_or(self.construction.start)
    }

    /// Checks that every derived value can be built and every setting is in
    /// range.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), StudyError> {
        self.corridor()?;
        let window = self.window()?;

        let invalid = |field: &'static str, message: String| {
            Err(StudyError::Invalid {
                study: self.id.clone(),
                field,
                message,
            })
        };

        if self.id.trim().is_empty() {
            return invalid("id", "must not be empty".to_string());
        }
        if let Some(split) = self.construction.split {
            let last = window.end().succ_opt().unwrap_or(window.end());
            if split < window.start() || split > last {
                return invalid(
                    "construction.split",
                    format!("{split} is outside {}..={last}", window.start()),
                );
            }
        }
        if self.map.width == 0 || self.map.height == 0 {
            return invalid(
                "map",
                format!("size {}x{} must be non-zero", self.map.width, self.map.height),
            );
        }
        if !(self.chart.width >= MIN_CHART_WIDTH_IN && self.chart.height >= MIN_CHART_HEIGHT_IN)
            || self.chart.dpi == 0
        {
            return invalid(
                "chart",
                format!(
                    "size {}x{} in at {} dpi must be at least \
                     {MIN_CHART_WIDTH_IN}x{MIN_CHART_HEIGHT_IN} in at a non-zero dpi",
                    self.chart.width, self.chart.height, self.chart.dpi
                ),
            );
        }

        let anim = &self.animation;
        if anim.steps == 0 {
            return invalid("animation.steps", "must be at least 1".to_string());
        }
        if anim.first_month > anim.last_month {
            return invalid(
                "animation.first_month",
                format!("{} is after {}", anim.first_month, anim.last_month),
            );
        }
        if !(anim.radius_min > 0.0 && anim.radius_min <= anim.radius_max) {
            return invalid(
                "animation.radius_min",
                format!(
                    "need 0 < radius_min ({}) <= radius_max ({})",
                    anim.radius_min, anim.radius_max
                ),
            );
        }
        if !((0.0..=1.0).contains(&anim.opacity_min)
            && (0.0..=1.0).contains(&anim.opacity_max)
            && anim.opacity_min <= anim.opacity_max)
        {
            return invalid(
                "animation.opacity_min",
                format!(
                    "need 0 <= opacity_min ({}) <= opacity_max ({}) <= 1",
                    anim.opacity_min, anim.opacity_max
                ),
            );
        }

        Ok(())
    }

    /// Resolves relative source paths against `base`.
    #[must_use]
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.source.sheets.iter_mut().for_each(rebase);
        rebase(&mut self.source.cache);
        self
    }
}

/// Parses a study definition from TOML.
///
/// # Errors
///
/// * [`StudyError::Toml`] if the TOML is malformed or missing fields
pub fn parse_study_toml(toml_str: &str) -> Result<StudyDefinition, StudyError> {
    Ok(toml::de::from_str(toml_str)?)
}
