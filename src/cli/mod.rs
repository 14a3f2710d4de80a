//! Command line interface for handbrake-job.
//!
//! Loads a job description, then either prints the generated HandBrakeCLI
//! invocation or runs it in the selected output mode.

mod args;

pub use args::Args;

use std::path::PathBuf;

use anyhow::Context;

use crate::job::HandBrake;
use crate::runner::{HANDBRAKE_BINARY, locate_handbrake};

/// Main CLI entry point
///
/// Returns the exit code the process should end with.
pub async fn run() -> anyhow::Result<i32> {
    let args = Args::parse_args();
    args.validate().map_err(anyhow::Error::msg)?;

    let binary = match &args.handbrake {
        Some(path) => path.clone(),
        // Printing works without HandBrakeCLI installed
        None if args.dry_run() => locate_handbrake().unwrap_or_else(|e| {
            log::debug!("{}; printing with the bare binary name", e);
            PathBuf::from(HANDBRAKE_BINARY)
        }),
        None => locate_handbrake()?,
    };
    log::debug!("Using HandBrakeCLI at {}", binary.display());

    let mut handbrake = HandBrake::with_binary(binary);
    handbrake.load_file(&args.config).map_err(|e| {
        let context = if e.is_input_error() {
            format!("Failed to load job description {}", args.config.display())
        } else {
            format!("Internal error while loading {}", args.config.display())
        };
        anyhow::Error::new(e).context(context)
    })?;

    if args.print {
        println!("{}", handbrake.generate_command_string()?);
        return Ok(0);
    }

    if args.tokens {
        let command = handbrake.generate_command()?;
        println!("{}", serde_json::to_string_pretty(&command)?);
        return Ok(0);
    }

    let code = handbrake
        .run(args.output_mode())
        .await
        .context("Failed to run HandBrakeCLI")?;
    Ok(code)
}
