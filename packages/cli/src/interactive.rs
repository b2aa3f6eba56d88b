//! Interactive menu used when no subcommand is given.

use std::path::Path;

use bridge_accidents_cli_utils::MultiProgress;
use bridge_accidents_study::registry::all_studies;
use dialoguer::{Confirm, Input, Select};

use crate::pipeline::{self, AnimateOptions, Context};

/// Top-level step selection.
enum Tool {
    All,
    Cache,
    Report,
    Map,
    Chart,
    Animate,
}

impl Tool {
    const ALL: &[Self] = &[
        Self::All,
        Self::Cache,
        Self::Report,
        Self::Map,
        Self::Chart,
        Self::Animate,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::All => "Run every step",
            Self::Cache => "Rebuild record cache",
            Self::Report => "Print report",
            Self::Map => "Generate map",
            Self::Chart => "Generate chart",
            Self::Animate => "Generate animation",
        }
    }
}

/// Prompts for a study (unless one was given) and a step, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt or the selected step fails.
pub fn run(
    study: Option<&str>,
    out_dir: &Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Bridge Accidents");
    println!();

    let chosen = match study {
        Some(s) => Some(s.to_string()),
        None => select_study()?,
    };
    let ctx = Context::load(chosen.as_deref(), out_dir, multi)?;

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::All => return pipeline::run_all(&ctx, AnimateOptions::default()),
        Tool::Cache => {
            let force = Confirm::new()
                .with_prompt("Rebuild even if up to date?")
                .default(true)
                .interact()?;
            ctx.cache(force)?;
        }
        Tool::Report => {
            ctx.cache(false)?;
            pipeline::report(&ctx, &ctx.analyze()?, None)?;
        }
        Tool::Map => {
            let severity = prompt_optional_u8("Severity code to show (empty for all)")?;
            ctx.cache(false)?;
            pipeline::map(&ctx, &ctx.analyze()?, severity)?;
        }
        Tool::Chart => {
            let png = Confirm::new()
                .with_prompt("Rasterize to PNG?")
                .default(true)
                .interact()?;
            ctx.cache(false)?;
            pipeline::chart(&ctx, &ctx.analyze()?, png)?;
        }
        Tool::Animate => {
            let options = AnimateOptions {
                skip_capture: !Confirm::new()
                    .with_prompt("Screenshot frames with headless Firefox?")
                    .default(true)
                    .interact()?,
                skip_gif: false,
                weighted: Confirm::new()
                    .with_prompt("Weight frame delays by time between frames?")
                    .default(false)
                    .interact()?,
            };
            ctx.cache(false)?;
            pipeline::animate(&ctx, &ctx.analyze()?, options)?;
        }
    }

    Ok(())
}

/// Lets the user pick a bundled study when there is more than one.
fn select_study() -> Result<Option<String>, Box<dyn std::error::Error>> {
    let studies = all_studies();
    if studies.len() < 2 {
        return Ok(None);
    }

    let labels: Vec<String> = studies
        .iter()
        .map(|s| format!("{} ({})", s.name, s.id))
        .collect();
    let idx = Select::new()
        .with_prompt("Study")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(Some(studies[idx].id.clone()))
}

/// Prompts the user for an optional `u8` value.
///
/// Returns `None` if the input is empty.
fn prompt_optional_u8(prompt: &str) -> Result<Option<u8>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
