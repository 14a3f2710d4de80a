//! HandBrakeCLI discovery.

use std::path::PathBuf;

use crate::error::{HandBrakeError, Result};

/// Executable name searched for on `PATH`.
#[cfg(windows)]
pub const HANDBRAKE_BINARY: &str = "HandBrakeCLI.exe";

/// Executable name searched for on `PATH`.
#[cfg(not(windows))]
pub const HANDBRAKE_BINARY: &str = "HandBrakeCLI";

/// Finds HandBrakeCLI on `PATH`.
///
/// # Errors
///
/// Returns `BinaryNotFound` if no executable with that name is on `PATH`.
pub fn locate_handbrake() -> Result<PathBuf> {
    match which::which(HANDBRAKE_BINARY) {
        Ok(path) => {
            log::debug!("Found {} at: {}", HANDBRAKE_BINARY, path.display());
            Ok(path)
        }
        Err(source) => {
            log::debug!("{} not found in PATH: {}", HANDBRAKE_BINARY, source);
            Err(HandBrakeError::BinaryNotFound {
                binary: HANDBRAKE_BINARY.to_string(),
                source,
            })
        }
    }
}
