//! handbrake-job - run HandBrakeCLI transcodes from declarative job files.
//!
//! This binary validates a JSON or TOML job description, builds the matching
//! HandBrakeCLI command line and runs it, exiting with HandBrakeCLI's code.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match handbrake_job::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}
