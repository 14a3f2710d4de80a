//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use crate::runner::OutputMode;

/// Run a HandBrakeCLI transcode described by a JSON or TOML job file
#[derive(Parser, Debug)]
#[command(
    name = "handbrake-job",
    version,
    about = "Run a HandBrakeCLI transcode described by a JSON or TOML job file",
    long_about = "Validates a job description against the bundled HandBrakeCLI option schema,
builds the matching command line and runs it.

Usage:
  handbrake-job job.json
  handbrake-job --progress job.toml
  handbrake-job --print job.json
  handbrake-job --handbrake /opt/handbrake/HandBrakeCLI --verbose job.json

Exit code is HandBrakeCLI's own exit code, or 1 if the job could not be started."
)]
pub struct Args {
    /// Job description file (.json or .toml)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// HandBrakeCLI binary to use instead of the one on PATH
    #[arg(long, value_name = "PATH", env = "HANDBRAKE_CLI")]
    pub handbrake: Option<PathBuf>,

    /// Print the shell-quoted command and exit without running it
    #[arg(long, conflicts_with = "tokens")]
    pub print: bool,

    /// Print the command as a JSON token list and exit without running it
    #[arg(long)]
    pub tokens: bool,

    /// Pass HandBrakeCLI's output through unmodified
    #[arg(short, long, conflicts_with = "progress")]
    pub verbose: bool,

    /// Show a progress bar fed by HandBrakeCLI's JSON progress output
    #[arg(short, long)]
    pub progress: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.config.as_os_str().is_empty() {
            return Err("Config path cannot be empty".to_string());
        }

        if self.config.is_dir() {
            return Err(format!(
                "Config path is a directory: {}",
                self.config.display()
            ));
        }

        Ok(())
    }

    /// True when the command is only printed, never run
    pub fn dry_run(&self) -> bool {
        self.print || self.tokens
    }

    /// Output mode selected by `--verbose` / `--progress`
    pub fn output_mode(&self) -> OutputMode {
        if self.progress {
            OutputMode::Progress
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Silent
        }
    }
}
