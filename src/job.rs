//! One-handle access to the whole pipeline: load, build, run.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::command::{CommandBuilder, CommandLine};
use crate::config::{JobConfig, Loader};
use crate::error::{HandBrakeError, Result};
use crate::runner::{Driver, OutputMode, ProgressObserver, locate_handbrake};

/// A HandBrakeCLI binary plus the job it should run.
///
/// # Examples
///
/// ```no_run
/// use handbrake_job::{HandBrake, OutputMode};
///
/// # async fn example() -> handbrake_job::Result<()> {
/// let mut handbrake = HandBrake::new()?;
/// handbrake.load_file("job.json")?;
/// println!("{}", handbrake.generate_command_string()?);
/// let code = handbrake.run(OutputMode::Progress).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HandBrake {
    binary: PathBuf,
    loader: Loader,
}

impl HandBrake {
    /// Uses the HandBrakeCLI found on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `BinaryNotFound` if HandBrakeCLI is not on `PATH`.
    pub fn new() -> Result<Self> {
        Ok(Self::with_binary(locate_handbrake()?))
    }

    /// Uses an explicit HandBrakeCLI path.
    ///
    /// The path is not checked here; a missing binary fails when run.
    pub fn with_binary<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            loader: Loader::new(),
        }
    }

    /// Path of the HandBrakeCLI binary in use.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Loads and validates a job description file. See [`Loader::load_file`].
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&JobConfig> {
        self.loader.load_file(path)
    }

    /// Validates an in-memory job description. See [`Loader::load_value`].
    pub fn load_value(&mut self, raw: &Value) -> Result<&JobConfig> {
        self.loader.load_value(raw)
    }

    /// The loaded job, if any.
    pub fn config(&self) -> Option<&JobConfig> {
        self.loader.data()
    }

    /// Builds the invocation for the loaded job.
    ///
    /// # Errors
    ///
    /// Returns `Build` if no job has been loaded yet, or any error from
    /// [`CommandBuilder::build`].
    pub fn generate_command(&self) -> Result<CommandLine> {
        let config = self.loader.data().ok_or_else(|| HandBrakeError::Build {
            reason: "no job description has been loaded".to_string(),
        })?;
        CommandBuilder::new(&self.binary).build(config)
    }

    /// Builds the invocation and renders it for a POSIX shell.
    pub fn generate_command_string(&self) -> Result<String> {
        Ok(self.generate_command()?.to_shell_string())
    }

    /// Runs the loaded job and returns HandBrakeCLI's exit code.
    pub async fn run(&self, mode: OutputMode) -> Result<i32> {
        Driver::new(self.generate_command()?).mode(mode).run().await
    }

    /// Runs the loaded job in progress mode, reporting to `observer`.
    pub async fn run_with_observer(&self, observer: Box<dyn ProgressObserver>) -> Result<i32> {
        Driver::new(self.generate_command()?)
            .mode(OutputMode::Progress)
            .observer(observer)
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job() -> Value {
        json!({
            "source": "cool_video.mkv",
            "output_file": "output.mkv",
            "picture_options": { "max_width": 1920, "max_height": 1080 },
            "video_options": { "two_pass": true, "turbo": false }
        })
    }

    #[test]
    fn generate_before_load_is_a_build_error() {
        let handbrake = HandBrake::with_binary("/usr/bin/HandBrakeCLI");
        assert!(handbrake.config().is_none());
        assert!(matches!(handbrake.generate_command(), Err(HandBrakeError::Build { .. })));
        assert!(matches!(handbrake.generate_command_string(), Err(HandBrakeError::Build { .. })));
    }

    #[test]
    fn generates_from_the_loaded_job() {
        let mut handbrake = HandBrake::with_binary("/usr/bin/HandBrakeCLI");
        handbrake.load_value(&job()).unwrap();
        assert_eq!(
            handbrake.generate_command_string().unwrap(),
            "/usr/bin/HandBrakeCLI --input cool_video.mkv --output output.mkv \
             --two-pass --no-turbo --maxWidth 1920 --maxHeight 1080"
        );
        assert_eq!(handbrake.generate_command().unwrap().program(), "/usr/bin/HandBrakeCLI");
    }

    #[test]
    fn failed_reload_keeps_the_previous_command() {
        let mut handbrake = HandBrake::with_binary("HandBrakeCLI");
        handbrake.load_value(&job()).unwrap();
        let before = handbrake.generate_command().unwrap();

        assert!(handbrake.load_value(&json!({ "source": "x.mkv" })).is_err());
        assert_eq!(handbrake.generate_command().unwrap(), before);
    }

    #[tokio::test]
    async fn running_a_missing_binary_is_a_spawn_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut handbrake = HandBrake::with_binary(dir.path().join("HandBrakeCLI"));
        handbrake.load_value(&job()).unwrap();
        let err = handbrake.run(OutputMode::Silent).await.unwrap_err();
        assert!(matches!(err, HandBrakeError::Spawn { .. }));
    }
}
