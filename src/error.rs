//! Error types for loading, validating, encoding and running HandBrake jobs.
//!
//! Every failure is raised to the caller at the point of detection. A non-zero
//! exit code from HandBrakeCLI is not an error; it is returned as data.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::OptionKind;

/// Result type alias for HandBrake job operations
pub type Result<T> = std::result::Result<T, HandBrakeError>;

/// Main error type for all HandBrake job operations
#[derive(Error, Debug)]
pub enum HandBrakeError {
    /// The job description does not conform to the schema
    #[error("Schema validation failed at '{path}': {reason}")]
    SchemaValidation {
        /// Dotted location of the offending value (`$` for the document root)
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// The bundled schema artifact is itself broken
    #[error("Schema definition error: {reason}")]
    SchemaDefinition {
        /// Reason for the error
        reason: String,
    },

    /// The job description file could not be read
    #[error("Cannot read {}: {source}", path.display())]
    FileAccess {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A value could not be rendered for its declared encoding kind
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A command was requested before a job was loaded
    #[error("Cannot build command: {reason}")]
    Build {
        /// Reason for the error
        reason: String,
    },

    /// A run mode needs a component that is not available
    #[error("Missing dependency '{dependency}': {reason}")]
    MissingDependency {
        /// Name of the missing component
        dependency: String,
        /// How to make it available
        reason: String,
    },

    /// HandBrakeCLI could not be found on PATH
    #[error("{binary} not found in PATH: {source}")]
    BinaryNotFound {
        /// Binary name that was searched for
        binary: String,
        /// Lookup failure
        #[source]
        source: which::Error,
    },

    /// The external process could not be started
    #[error("Failed to spawn {}: {source}", program.display())]
    Spawn {
        /// Program that failed to start
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// IO errors while supervising the external process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoding failures.
///
/// The validator rejects every shape the codec cannot render, so these
/// indicate a broken internal invariant rather than bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Value variant does not match the option's declared kind
    #[error("option '{key}' is declared as {expected} but holds a {found} value")]
    KindMismatch {
        /// Option key (underscore form)
        key: String,
        /// Kind declared by the schema
        expected: OptionKind,
        /// Kind of the value actually supplied
        found: OptionKind,
    },

    /// Option is not declared by the schema used for encoding
    #[error("option '{key}' is not declared in group '{group}'")]
    UnknownOption {
        /// Group the option was found in
        group: String,
        /// Option key (underscore form)
        key: String,
    },
}

impl HandBrakeError {
    /// Shorthand for a validation failure at `path`.
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        HandBrakeError::SchemaValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a broken schema artifact.
    pub(crate) fn definition(reason: impl Into<String>) -> Self {
        HandBrakeError::SchemaDefinition {
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by the job description rather than by
    /// the tool or the host
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HandBrakeError::SchemaValidation { .. } | HandBrakeError::FileAccess { .. }
        )
    }
}
