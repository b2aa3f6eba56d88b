#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the bridge accidents toolchain.
//!
//! Each subcommand runs one step of the study (cache, report, map, chart,
//! animation) or all of them. Without a subcommand, an interactive menu
//! picks the step.
//!
//! Uses `indicatif-log-bridge` (via [`bridge_accidents_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod pipeline;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pipeline::{AnimateOptions, Context};

#[derive(Parser)]
#[command(
    name = "bridge_accidents",
    about = "Before/after accident analysis around a bridge reconstruction"
)]
struct Cli {
    /// Study TOML path or bundled study id
    #[arg(long, global = true)]
    study: Option<String>,

    /// Directory for generated artifacts
    #[arg(long, global = true, default_value = "data/generated")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the sheet exports into the record cache
    Cache {
        /// Rebuild even if the cache is up to date
        #[arg(long)]
        force: bool,
    },
    /// Print the before/after report and write it as JSON
    Report {
        /// JSON output path (defaults to `<out-dir>/report.json`)
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Write the static accident map
    Map {
        /// Only draw accidents with this severity code
        #[arg(long)]
        severity: Option<u8>,
    },
    /// Write the quarterly bar chart
    Chart {
        /// Also rasterize the chart to PNG
        #[arg(long)]
        png: bool,
    },
    /// Render the animation frames and GIF
    Animate {
        /// Write frame pages without screenshotting them
        #[arg(long)]
        skip_capture: bool,
        /// Stop after rendering the frames
        #[arg(long)]
        skip_gif: bool,
        /// Scale frame delays by the time between frames
        #[arg(long)]
        weighted: bool,
    },
    /// Run every step
    All,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bridge_accidents_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(cli.study.as_deref(), &cli.out_dir, &multi);
    };

    let ctx = Context::load(cli.study.as_deref(), &cli.out_dir, &multi)?;

    if let Commands::Cache { force } = command {
        ctx.cache(force)?;
        return Ok(());
    }
    if matches!(command, Commands::All) {
        return pipeline::run_all(&ctx, AnimateOptions::default());
    }

    ctx.cache(false)?;
    let run = ctx.analyze()?;

    match command {
        Commands::Report { json } => {
            pipeline::report(&ctx, &run, json.as_deref())?;
        }
        Commands::Map { severity } => pipeline::map(&ctx, &run, severity)?,
        Commands::Chart { png } => {
            let path = pipeline::chart(&ctx, &run, png)?;
            log::info!("Chart: {}", path.display());
        }
        Commands::Animate {
            skip_capture,
            skip_gif,
            weighted,
        } => pipeline::animate(
            &ctx,
            &run,
            AnimateOptions {
                skip_capture,
                skip_gif,
                weighted,
            },
        )?,
        Commands::Cache { .. } | Commands::All => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bridge_accidents",
            "animate",
            "--weighted",
            "--study",
            "studies/other.toml",
        ])
        .unwrap();
        assert_eq!(cli.study.as_deref(), Some("studies/other.toml"));
        assert_eq!(cli.out_dir, PathBuf::from("data/generated"));
        assert!(matches!(
            cli.command,
            Some(Commands::Animate {
                skip_capture: false,
                skip_gif: false,
                weighted: true
            })
        ));
    }

    #[test]
    fn no_subcommand_means_interactive() {
        let cli = Cli::try_parse_from(["bridge_accidents"]).unwrap();
        assert!(cli.command.is_none());
    }
}
