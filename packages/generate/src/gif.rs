//! Animated GIF assembly with `ImageMagick`.

use std::path::{Path, PathBuf};
use std::process::Command;

use bridge_accidents_study::definition::AnimationConfig;

use crate::capture::RenderedFrames;
use crate::{GenerateError, run_tool};

/// A screenshot and how long to show it, in hundredths of a second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifFrame {
    /// Frame image.
    pub png: PathBuf,
    /// Display duration.
    pub delay: u32,
}

/// Pairs rendered frames with their delays.
///
/// # Errors
///
/// Returns [`GenerateError::DelayMismatch`] if the counts differ.
pub fn gif_frames(rendered: &RenderedFrames, delays: &[u32]) -> Result<Vec<GifFrame>, GenerateError> {
    if rendered.frames.len() != delays.len() {
        return Err(GenerateError::DelayMismatch {
            frames: rendered.frames.len(),
            delays: delays.len(),
        });
    }

    Ok(rendered
        .frames
        .iter()
        .zip(delays)
        .map(|((_, png), &delay)| GifFrame {
            png: png.clone(),
            delay,
        })
        .collect())
}

/// Builds the `convert` argument list: loop count, the intro frame with its
/// delay, each frame preceded by its own `-delay`, then the output path.
#[must_use]
pub fn gif_command_args(
    intro: &Path,
    frames: &[GifFrame],
    cfg: &AnimationConfig,
    output: &Path,
) -> Vec<String> {
    let mut args = Vec::with_capacity(frames.len() * 3 + 6);
    args.extend([
        "-loop".to_string(),
        cfg.loop_count.to_string(),
        "-delay".to_string(),
        cfg.intro_delay.to_string(),
        intro.display().to_string(),
    ]);
    for frame in frames {
        args.push("-delay".to_string());
        args.push(frame.delay.to_string());
        args.push(frame.png.display().to_string());
    }
    args.push(output.display().to_string());
    args
}

/// Stitches the frames into an animated GIF.
///
/// # Errors
///
/// * [`GenerateError::EmptyAnimation`] if `frames` is empty
/// * [`GenerateError::ExternalTool`] if `convert` is missing or fails
pub fn assemble_gif(
    intro: &Path,
    frames: &[GifFrame],
    cfg: &AnimationConfig,
    output: &Path,
) -> Result<(), GenerateError> {
    if frames.is_empty() {
        return Err(GenerateError::EmptyAnimation);
    }

    log::info!("Assembling {} frames into {}", frames.len() + 1, output.display());
    run_tool(Command::new("convert").args(gif_command_args(intro, frames, cfg, output)))?;
    log::info!("Animation written to {}", output.display());
    Ok(())
}
