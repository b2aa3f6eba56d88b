//! Bar chart of accidents per quarter, faceted by construction state.
//!
//! The chart is written as SVG directly: one panel per state in
//! Before/After order, each with its own x axis of the quarters that had
//! accidents, a shared y axis, and x labels rotated to fit.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use bridge_accidents_accident_models::ConstructionState;
use bridge_accidents_analytics_models::QuarterCount;
use bridge_accidents_study::StudyDefinition;
use bridge_accidents_study::definition::Labels;

use crate::{CHART_PNG, CHART_SVG, GenerateError, escape_html, run_tool, write_output};

const PX_PER_INCH: f64 = 96.0;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 12.0;
const MARGIN_BOTTOM: f64 = 96.0;
const STRIP_HEIGHT: f64 = 24.0;
const PANEL_GAP: f64 = 24.0;
const BAR_FILL: &str = "#595959";
const GRID: &str = "#ebebeb";
const BORDER: &str = "#333333";
const STRIP_FILL: &str = "#d9d9d9";

/// Chart size and facet labels.
#[derive(Debug, Clone, Copy)]
pub struct ChartOptions<'a> {
    /// Width in inches.
    pub width: f64,
    /// Height in inches.
    pub height: f64,
    /// Raster resolution.
    pub dpi: u32,
    /// Facet titles.
    pub labels: &'a Labels,
}

impl<'a> ChartOptions<'a> {
    /// Chart options from a study's `[chart]` and `[labels]` sections.
    #[must_use]
    pub const fn from_study(study: &'a StudyDefinition) -> Self {
        Self {
            width: study.chart.width,
            height: study.chart.height,
            dpi: study.chart.dpi,
            labels: &study.labels,
        }
    }
}

/// Picks a 1/2/5 step giving at most five intervals up to `max`.
fn tick_step(max: u64) -> u64 {
    let target = max.div_ceil(5).max(1);
    let mut magnitude = 1;
    while magnitude * 10 <= target {
        magnitude *= 10;
    }
    [1, 2, 5, 10]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= target)
        .unwrap_or(10 * magnitude)
}

/// Renders the faceted quarterly bar chart as an SVG document.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn render_quarter_chart(quarters: &[QuarterCount], options: &ChartOptions<'_>) -> String {
    let width = options.width * PX_PER_INCH;
    let height = options.height * PX_PER_INCH;

    let max_count = quarters.iter().map(|q| q.count).max().unwrap_or(0);
    let step = tick_step(max_count);
    let top = max_count.div_ceil(step).max(1) * step;

    let facets = ConstructionState::ALL.len() as f64;
    let panel_w = (width - MARGIN_LEFT - MARGIN_RIGHT - PANEL_GAP * (facets - 1.0)) / facets;
    let panel_top = MARGIN_TOP + STRIP_HEIGHT;
    let panel_h = height - panel_top - MARGIN_BOTTOM;
    let panel_bottom = panel_top + panel_h;
    let y_of = |count: u64| panel_bottom - count as f64 / top as f64 * panel_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w_in}in" height="{h_in}in" viewBox="0 0 {width:.0} {height:.0}" font-family="Helvetica, Arial, sans-serif">"#,
        w_in = options.width,
        h_in = options.height,
    );
    let _ = writeln!(
        svg,
        r#"<rect width="{width:.0}" height="{height:.0}" fill="white"/>"#
    );

    for (i, &state) in ConstructionState::ALL.iter().enumerate() {
        let x0 = MARGIN_LEFT + i as f64 * (panel_w + PANEL_GAP);
        let bars: Vec<&QuarterCount> = quarters.iter().filter(|q| q.state == state).collect();

        let _ = writeln!(svg, r#"<g class="facet" data-state="{state}">"#);

        let mut tick = 0;
        while tick <= top {
            let y = y_of(tick);
            let _ = writeln!(
                svg,
                r#"<line x1="{x0:.1}" y1="{y:.1}" x2="{x1:.1}" y2="{y:.1}" stroke="{GRID}"/>"#,
                x1 = x0 + panel_w,
            );
            if i == 0 {
                let _ = writeln!(
                    svg,
                    r##"<text x="{x:.1}" y="{y:.1}" dy="0.32em" text-anchor="end" font-size="10" fill="#4d4d4d">{tick}</text>"##,
                    x = x0 - 4.0,
                );
            }
            tick += step;
        }

        let _ = writeln!(
            svg,
            r#"<rect x="{x0:.1}" y="{MARGIN_TOP:.1}" width="{panel_w:.1}" height="{STRIP_HEIGHT:.1}" fill="{STRIP_FILL}" stroke="{BORDER}"/>"#
        );
        let _ = writeln!(
            svg,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="12">{label}</text>"#,
            x = x0 + panel_w / 2.0,
            y = MARGIN_TOP + STRIP_HEIGHT / 2.0 + 4.0,
            label = escape_html(options.labels.for_state(state)),
        );

        let slot = panel_w / bars.len().max(1) as f64;
        for (j, q) in bars.iter().enumerate() {
            let cx = x0 + slot * (j as f64 + 0.5);
            let bar_w = slot * 0.9;
            let y = y_of(q.count);
            let _ = writeln!(
                svg,
                r#"<rect class="bar" x="{x:.1}" y="{y:.1}" width="{bar_w:.1}" height="{h:.1}" fill="{BAR_FILL}" stroke="white"><title>{period}: {count}</title></rect>"#,
                x = cx - bar_w / 2.0,
                h = panel_bottom - y,
                period = q.period,
                count = q.count,
            );
            let _ = writeln!(
                svg,
                r##"<text transform="translate({cx:.1},{y:.1}) rotate(45)" text-anchor="start" font-size="9" fill="#4d4d4d">{period}</text>"##,
                y = panel_bottom + 6.0,
                period = q.period,
            );
        }

        let _ = writeln!(
            svg,
            r#"<rect x="{x0:.1}" y="{panel_top:.1}" width="{panel_w:.1}" height="{panel_h:.1}" fill="none" stroke="{BORDER}"/>"#
        );
        let _ = writeln!(svg, "</g>");
    }

    let _ = writeln!(
        svg,
        r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-size="12">date</text>"#,
        x = MARGIN_LEFT + (width - MARGIN_LEFT - MARGIN_RIGHT) / 2.0,
        y = height - 8.0,
    );
    let _ = writeln!(
        svg,
        r#"<text transform="translate(14,{y:.1}) rotate(-90)" text-anchor="middle" font-size="12">count</text>"#,
        y = panel_top + panel_h / 2.0,
    );
    svg.push_str("</svg>\n");

    svg
}

/// `ImageMagick` arguments converting `svg` to a white-backed PNG at `dpi`.
#[must_use]
pub fn rasterize_args(svg: &Path, png: &Path, dpi: u32) -> Vec<String> {
    vec![
        "-density".to_string(),
        dpi.to_string(),
        svg.display().to_string(),
        "-background".to_string(),
        "white".to_string(),
        "-flatten".to_string(),
        png.display().to_string(),
    ]
}

/// Rasterizes an SVG file to PNG with `ImageMagick`'s `convert`.
///
/// # Errors
///
/// Returns [`GenerateError::ExternalTool`] if `convert` is missing or fails.
pub fn rasterize(svg: &Path, png: &Path, dpi: u32) -> Result<(), GenerateError> {
    run_tool(Command::new("convert").args(rasterize_args(svg, png, dpi)))?;
    log::info!("Chart rasterized to {}", png.display());
    Ok(())
}

/// Writes the chart SVG under `out_dir`, and the PNG too when `png` is set.
///
/// Returns the path of the last file written.
///
/// # Errors
///
/// Returns [`GenerateError`] if a write or the rasterizer fails.
pub fn write_chart(
    out_dir: &Path,
    quarters: &[QuarterCount],
    options: &ChartOptions<'_>,
    png: bool,
) -> Result<PathBuf, GenerateError> {
    let svg_path = out_dir.join(CHART_SVG);
    write_output(&svg_path, &render_quarter_chart(quarters, options))?;
    log::info!(
        "Chart with {} quarters written to {}",
        quarters.len(),
        svg_path.display()
    );

    if !png {
        return Ok(svg_path);
    }

    let png_path = out_dir.join(CHART_PNG);
    rasterize(&svg_path, &png_path, options.dpi)?;
    Ok(png_path)
}
