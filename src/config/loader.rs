//! Job description loading.

use std::path::Path;

use serde_json::Value;

use super::JobConfig;
use crate::error::{HandBrakeError, Result};
use crate::schema::{Schema, validate};

/// Holds the most recently loaded job.
///
/// Loading is all-or-nothing: a failed load leaves the previously loaded job
/// in place.
#[derive(Debug, Default)]
pub struct Loader {
    data: Option<JobConfig>,
}

impl Loader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads, parses and validates a job description file.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    ///
    /// # Arguments
    ///
    /// * `path` - Job description to load
    ///
    /// # Returns
    ///
    /// The validated configuration, now held by this loader
    ///
    /// # Errors
    ///
    /// Returns `FileAccess` if the file cannot be read and `SchemaValidation`
    /// if it cannot be parsed or fails validation.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&JobConfig> {
        let path = path.as_ref();
        log::debug!("Loading job description from {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|source| HandBrakeError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

        let raw = parse(path, &text)?;
        self.load_value(&raw)
    }

    /// Validates an in-memory job description.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` naming the first offending location.
    pub fn load_value(&mut self, raw: &Value) -> Result<&JobConfig> {
        let config = validate(raw, Schema::bundled()?)?;
        log::info!(
            "Loaded job: {} -> {} ({} option groups)",
            config.source(),
            config.output_file(),
            config.groups().count()
        );
        Ok(self.data.insert(config))
    }

    /// The last successfully loaded job, if any.
    pub fn data(&self) -> Option<&JobConfig> {
        self.data.as_ref()
    }
}

fn parse(path: &Path, text: &str) -> Result<Value> {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(text)
            .map_err(|e| HandBrakeError::invalid("$", format!("malformed TOML: {}", e)))
    } else {
        serde_json::from_str(text)
            .map_err(|e| HandBrakeError::invalid("$", format!("malformed JSON: {}", e)))
    }
}
