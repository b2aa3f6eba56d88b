//! Step runners shared by the subcommands and the interactive menu.
//!
//! Each step takes the analyzed records and writes its artifacts under the
//! output directory. [`run_all`] chains every step behind a single
//! `indicatif` steps bar.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bridge_accidents_accident_models::{ConstructionWindow, SeverityCode};
use bridge_accidents_analytics::pipeline::{StudyRun, report_json, run_study};
use bridge_accidents_cli_utils::{IndicatifProgress, MultiProgress};
use bridge_accidents_generate::animation::{
    DecayParams, frame_delays, frame_schedule, month_starts,
};
use bridge_accidents_generate::capture::{FrameCapturer, HeadlessBrowser, render_frames};
use bridge_accidents_generate::chart::{ChartOptions, write_chart};
use bridge_accidents_generate::gif::{assemble_gif, gif_frames};
use bridge_accidents_generate::map::{
    MapScene, Marker, accidents_feature_collection, write_map,
};
use bridge_accidents_generate::{
    ANIMATION_GIF, ANIMATION_WEIGHTED_GIF, FRAMES_DIR, REPORT_JSON, write_output,
};
use bridge_accidents_source::cache::{CacheStatus, ensure_cache};
use bridge_accidents_source::loader::load_records;
use bridge_accidents_spatial::Corridor;
use bridge_accidents_study::{StudyDefinition, resolve_study};

use crate::report::format_report;

type BoxError = Box<dyn std::error::Error>;

/// Options for the animation step.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnimateOptions {
    /// Write the frame pages without screenshotting them.
    pub skip_capture: bool,
    /// Stop after the frames are rendered.
    pub skip_gif: bool,
    /// Scale frame delays by the day gap between frames.
    pub weighted: bool,
}

/// A resolved study plus where its outputs go.
pub struct Context<'a> {
    /// Study definition.
    pub study: StudyDefinition,
    /// Corridor built from the study's geometry.
    pub corridor: Corridor,
    /// Construction window.
    pub window: ConstructionWindow,
    /// Output directory.
    pub out_dir: PathBuf,
    /// Progress bars registered with the log bridge.
    pub multi: &'a MultiProgress,
}

impl<'a> Context<'a> {
    /// Resolves `study` (a TOML path or a bundled study id) and validates
    /// its corridor and window.
    ///
    /// # Errors
    ///
    /// Returns an error if the study cannot be found, parsed, or validated.
    pub fn load(
        study: Option<&str>,
        out_dir: &Path,
        multi: &'a MultiProgress,
    ) -> Result<Self, BoxError> {
        let study = resolve_study(study)?;
        let corridor = study.corridor()?;
        let window = study.window()?;
        log::info!("Using study '{}' ({})", study.id, study.name);

        Ok(Self {
            study,
            corridor,
            window,
            out_dir: out_dir.to_path_buf(),
            multi,
        })
    }

    /// Makes sure the record cache is current and returns what happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the sheets cannot be read or the cache written.
    pub fn cache(&self, force: bool) -> Result<CacheStatus, BoxError> {
        let source = &self.study.source;
        let status = ensure_cache(&source.sheets, source.layout, &source.cache, force)?;
        match status {
            CacheStatus::Fresh => log::info!("Cache {} is up to date", source.cache.display()),
            CacheStatus::Rebuilt(stats) => log::info!(
                "Cache {} rebuilt from {} sheet(s): {} rows kept, {} dropped",
                source.cache.display(),
                stats.sheets,
                stats.rows_written,
                stats.dropped
            ),
        }
        Ok(status)
    }

    /// Loads the cached records and runs the analysis. Call [`Self::cache`]
    /// first so the cache reflects the current sheets.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or either state has no usable
    /// records.
    pub fn analyze(&self) -> Result<StudyRun, BoxError> {
        let loaded = load_records(&self.study.source.cache)?;
        if loaded.dropped > 0 {
            log::warn!(
                "Skipped {} of {} cached rows",
                loaded.dropped,
                loaded.rows_read
            );
        }

        Ok(run_study(
            &self.study.id,
            &loaded.records,
            &self.corridor,
            &self.window,
            self.study.split_date(),
        )?)
    }

    fn scene(&self, run: &StudyRun) -> MapScene {
        MapScene::new(&self.study, &self.corridor, &run.report.rows)
    }
}

/// Prints the report and writes it as JSON to `json`, or to
/// `report.json` under the output directory.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn report(ctx: &Context<'_>, run: &StudyRun, json: Option<&Path>) -> Result<PathBuf, BoxError> {
    ctx.multi.suspend(|| {
        println!();
        print!("{}", format_report(&run.report, &ctx.study.labels));
        println!();
    });

    let path = json.map_or_else(|| ctx.out_dir.join(REPORT_JSON), Path::to_path_buf);
    write_output(&path, &report_json(&run.report)?)?;
    log::info!("Report written to {}", path.display());
    Ok(path)
}

/// Writes the static accident map, optionally limited to one severity code.
///
/// # Errors
///
/// Returns an error if the map cannot be written.
pub fn map(ctx: &Context<'_>, run: &StudyRun, severity: Option<u8>) -> Result<(), BoxError> {
    let marker = Marker {
        radius: ctx.study.map.marker_radius,
        opacity: ctx.study.map.marker_opacity,
    };
    let features = accidents_feature_collection(
        &run.classified,
        Some(&ctx.corridor),
        severity.map(SeverityCode),
        marker,
    );
    write_map(&ctx.out_dir, &ctx.scene(run), &features)?;
    Ok(())
}

/// Writes the quarterly bar chart, rasterized to PNG when `png` is set.
///
/// # Errors
///
/// Returns an error if the SVG cannot be written or `convert` fails.
pub fn chart(ctx: &Context<'_>, run: &StudyRun, png: bool) -> Result<PathBuf, BoxError> {
    let options = ChartOptions::from_study(&ctx.study);
    Ok(write_chart(&ctx.out_dir, &run.report.quarters, &options, png)?)
}

/// Renders the animation frames and stitches them into a GIF.
///
/// # Errors
///
/// Returns an error if a frame cannot be written or captured, or the GIF
/// cannot be assembled.
pub fn animate(ctx: &Context<'_>, run: &StudyRun, options: AnimateOptions) -> Result<(), BoxError> {
    let anim = &ctx.study.animation;
    let split = ctx.study.split_date();

    let months = month_starts(anim.first_month, anim.last_month, &ctx.window);
    let schedule = frame_schedule(&run.classified, &months, &DecayParams::from(anim), split);
    log::info!(
        "{} months in scope, {} frames scheduled",
        months.len(),
        schedule.frames.len()
    );

    let mut browser = HeadlessBrowser::firefox(ctx.study.map.width, anim.window_height);
    let capturer: Option<&mut dyn FrameCapturer> = if options.skip_capture {
        None
    } else {
        Some(&mut browser)
    };

    let progress = IndicatifProgress::frames_bar(ctx.multi, "Rendering frames");
    let frames_dir = ctx.out_dir.join(FRAMES_DIR);
    let rendered = render_frames(&schedule, &ctx.scene(run), &frames_dir, capturer, &progress)?;

    if options.skip_gif || !rendered.captured {
        log::info!("Skipping GIF assembly");
        return Ok(());
    }

    let delays = frame_delays(&schedule.dates(), anim, split, options.weighted);
    let frames = gif_frames(&rendered, &delays)?;
    let output = ctx.out_dir.join(if options.weighted {
        ANIMATION_WEIGHTED_GIF
    } else {
        ANIMATION_GIF
    });
    assemble_gif(&rendered.intro, &frames, anim, &output)?;
    Ok(())
}

/// Runs every step in order: cache, report, map, chart, animation.
///
/// # Errors
///
/// Returns the first step failure.
pub fn run_all(ctx: &Context<'_>, animate_options: AnimateOptions) -> Result<(), BoxError> {
    const STEPS: &[&str] = &["Cache records", "Report", "Map", "Chart", "Animation"];

    let start = Instant::now();
    let total = STEPS.len();
    let bar = IndicatifProgress::steps_bar(ctx.multi, "Steps", total as u64);
    let mut step = 0;
    let mut advance = || {
        bar.inc(u64::from(step > 0));
        step += 1;
        bar.set_message(format!("[{step}/{total}] {}", STEPS[step - 1]));
    };

    advance();
    ctx.cache(false)?;

    advance();
    let run = ctx.analyze()?;
    report(ctx, &run, None)?;

    advance();
    map(ctx, &run, None)?;

    advance();
    chart(ctx, &run, true)?;

    advance();
    animate(ctx, &run, animate_options)?;

    bar.inc(1);
    bar.finish(format!(
        "Completed {total} steps in {:.1}s",
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
