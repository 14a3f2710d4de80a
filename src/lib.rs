//! Job-description driven HandBrakeCLI runner
//!
//! This library turns a declarative transcode job (JSON or TOML) into a
//! HandBrakeCLI invocation and runs it:
//! - Schema validation of the job description against the bundled option table
//! - Deterministic command-line generation, including shell-quoted rendering
//! - Silent, verbose or progress-reporting execution
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod runner;
pub mod schema;

// Re-export commonly used types
pub use command::{CommandBuilder, CommandLine};
pub use config::{JobConfig, Loader, OptionGroup, OptionValue};
pub use error::{EncodingError, HandBrakeError, Result};
pub use job::HandBrake;
pub use runner::{Driver, DriverState, OutputMode, ProgressObserver, ProgressUpdate};
pub use schema::{OptionKind, Schema};
