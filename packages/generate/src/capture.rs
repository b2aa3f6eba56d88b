//! Per-frame map pages and their screenshots.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use bridge_accidents_source::progress::ProgressCallback;
use chrono::NaiveDate;
use geojson::FeatureCollection;

use crate::animation::{Circle, FrameSchedule};
use crate::map::{MapScene, Marker, accident_feature, render_map_html};
use crate::{GenerateError, io, run_tool, write_output};

/// File stem of the intro frame, which sorts before every dated frame.
pub const INTRO_FRAME: &str = "0-0-0";

/// Turns an HTML page into a PNG screenshot.
pub trait FrameCapturer {
    /// Screenshots `page` into `png`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError`] if the screenshot cannot be taken.
    fn capture(&mut self, page: &Path, png: &Path) -> Result<(), GenerateError>;
}

/// Screenshots pages with a headless browser run once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessBrowser {
    program: String,
    width: u32,
    height: u32,
}

impl HeadlessBrowser {
    /// Headless Firefox with a `width` x `height` window.
    #[must_use]
    pub fn firefox(width: u32, height: u32) -> Self {
        Self::new("firefox", width, height)
    }

    /// A Firefox-compatible browser binary.
    #[must_use]
    pub fn new(program: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            program: program.into(),
            width,
            height,
        }
    }

    /// Command-line arguments for screenshotting `url` into `png`.
    #[must_use]
    pub fn args(&self, url: &str, png: &Path) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--screenshot".to_string(),
            png.display().to_string(),
            format!("--window-size={},{}", self.width, self.height),
            url.to_string(),
        ]
    }
}

impl FrameCapturer for HeadlessBrowser {
    fn capture(&mut self, page: &Path, png: &Path) -> Result<(), GenerateError> {
        let page = page.canonicalize().map_err(|e| io(page, e))?;
        let png = std::path::absolute(png).map_err(|e| io(png, e))?;
        let url = format!("file://{}", page.display());
        run_tool(Command::new(&self.program).args(self.args(&url, &png)))
    }
}

/// Paths of the rendered animation frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrames {
    /// Intro frame screenshot.
    pub intro: PathBuf,
    /// Dated frame screenshots, in schedule order.
    pub frames: Vec<(NaiveDate, PathBuf)>,
    /// Whether screenshots were taken.
    pub captured: bool,
}

fn circle_feature(circle: &Circle) -> geojson::Feature {
    accident_feature(
        &circle.record,
        circle.record.state,
        Marker {
            radius: circle.radius,
            opacity: circle.opacity,
        },
    )
}

fn page_features<'a>(layers: impl IntoIterator<Item = &'a Circle>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: layers.into_iter().map(circle_feature).collect(),
        foreign_members: None,
    }
}

/// Writes one HTML page per frame (plus an empty intro page) under
/// `out_dir` and, when a capturer is given, screenshots each to
/// `<YYYY-MM-DD>.png` (`0-0-0.png` for the intro).
///
/// Frames are rendered and captured one at a time.
///
/// # Errors
///
/// * [`GenerateError::EmptyAnimation`] if the schedule has no frames
/// * any write, serialization, or capture error
pub fn render_frames(
    schedule: &FrameSchedule,
    scene: &MapScene,
    out_dir: &Path,
    mut capturer: Option<&mut dyn FrameCapturer>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RenderedFrames, GenerateError> {
    let Some(first) = schedule.frames.first() else {
        return Err(GenerateError::EmptyAnimation);
    };

    std::fs::create_dir_all(out_dir).map_err(|e| io(out_dir, e))?;
    progress.set_total(schedule.frames.len() as u64 + 1);

    let mut emit = |stem: &str, features: &FeatureCollection, label: &str| {
        let page = out_dir.join(format!("{stem}.html"));
        let png = out_dir.join(format!("{stem}.png"));
        write_output(&page, &render_map_html(scene, features, Some(label))?)?;
        if let Some(c) = capturer.as_deref_mut() {
            c.capture(&page, &png)?;
        }
        progress.inc(1);
        Ok::<_, GenerateError>(png)
    };

    let intro = emit(INTRO_FRAME, &page_features([]), &first.label())?;

    let mut frames = Vec::with_capacity(schedule.frames.len());
    for frame in &schedule.frames {
        progress.set_message(format!("Frame {}", frame.date));
        let features = page_features(schedule.settled_for(frame).iter().chain(&frame.circles));
        let stem = frame.date.format("%Y-%m-%d").to_string();
        let png = emit(&stem, &features, &frame.label())?;
        frames.push((frame.date, png));
    }

    let captured = capturer.is_some();
    progress.finish(format!("Rendered {} frames", frames.len()));
    log::info!(
        "Rendered {} frames to {}{}",
        frames.len(),
        out_dir.display(),
        if captured { "" } else { " (capture skipped)" }
    );

    Ok(RenderedFrames {
        intro,
        frames,
        captured,
    })
}
