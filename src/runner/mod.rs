//! HandBrakeCLI execution.
//!
//! A [`Driver`] runs one built [`CommandLine`] to completion in one of three
//! output modes and reports the process exit code. Non-zero exit codes are
//! data, not errors.

mod binary;
mod progress;

pub use binary::{HANDBRAKE_BINARY, locate_handbrake};
#[cfg(feature = "progress")]
pub use progress::TerminalProgress;
pub use progress::{ProgressObserver, ProgressParser, ProgressState, ProgressUpdate};

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::command::CommandLine;
use crate::error::{HandBrakeError, Result};

/// Flag that switches HandBrakeCLI to the JSON progress feed.
const JSON_FLAG: &str = "--json";

/// Exit code reported when the process was terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// How the external process's output is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Discard stdout and stderr
    #[default]
    Silent,
    /// Pass stdout and stderr through unmodified
    Verbose,
    /// Parse the JSON progress feed and report it to an observer
    Progress,
}

/// Lifecycle of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// The process exited with this code
    Completed(i32),
    /// The process could not be started or supervised
    Failed,
}

/// Runs a HandBrakeCLI invocation.
///
/// # Examples
///
/// ```no_run
/// use handbrake_job::{CommandBuilder, Driver, Loader, OutputMode};
///
/// # async fn example() -> handbrake_job::Result<()> {
/// let mut loader = Loader::new();
/// let command = CommandBuilder::new("HandBrakeCLI").build(loader.load_file("job.json")?)?;
/// let code = Driver::new(command).mode(OutputMode::Verbose).run().await?;
/// println!("HandBrakeCLI exited with {}", code);
/// # Ok(())
/// # }
/// ```
pub struct Driver {
    command: CommandLine,
    mode: OutputMode,
    observer: Option<Box<dyn ProgressObserver>>,
    state: DriverState,
}

impl Driver {
    /// Creates an idle driver in silent mode.
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            mode: OutputMode::default(),
            observer: None,
            state: DriverState::Idle,
        }
    }

    /// Selects the output mode.
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Receives progress updates in [`OutputMode::Progress`].
    ///
    /// Default: the terminal progress bar, when the `progress` feature is enabled
    pub fn observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Spawns the process and waits for it to exit.
    ///
    /// # Returns
    ///
    /// The exit code, or [`SIGNALLED_EXIT_CODE`] if the process was killed
    /// by a signal
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` if progress mode has no observer
    /// available, `Spawn` if the process cannot be started, and `Io` if
    /// waiting on it fails.
    pub async fn run(&mut self) -> Result<i32> {
        let mut fallback = None;
        let observer: Option<&mut dyn ProgressObserver> = match self.mode {
            OutputMode::Progress => match self.observer.as_deref_mut() {
                Some(observer) => Some(observer),
                None => Some(&mut **fallback.insert(default_observer()?)),
            },
            OutputMode::Silent | OutputMode::Verbose => None,
        };

        let program = self.command.program();
        let mut cmd = Command::new(program);
        cmd.args(self.command.args()).stdin(Stdio::null());
        match self.mode {
            OutputMode::Silent => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
            OutputMode::Verbose => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Progress => {
                cmd.arg(JSON_FLAG).stdout(Stdio::piped()).stderr(Stdio::null());
            }
        }

        log::debug!("Spawning ({:?}): {}", self.mode, self.command);
        self.state = DriverState::Running;

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = DriverState::Failed;
                return Err(HandBrakeError::Spawn {
                    program: PathBuf::from(program),
                    source,
                });
            }
        };

        let status = match observer {
            Some(observer) => {
                let stdout = child.stdout.take();
                // Read the feed and wait for exit together so a full pipe never stalls the child
                let (_, status) = tokio::join!(
                    async {
                        if let Some(stdout) = stdout {
                            read_feed(stdout, &mut *observer).await;
                        }
                    },
                    child.wait()
                );
                observer.on_finish();
                status
            }
            None => child.wait().await,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                self.state = DriverState::Failed;
                return Err(HandBrakeError::Io(e));
            }
        };

        let code = status.code().unwrap_or(SIGNALLED_EXIT_CODE);
        self.state = DriverState::Completed(code);
        if code == 0 {
            log::info!("HandBrakeCLI finished successfully");
        } else {
            log::warn!("HandBrakeCLI exited with code {}", code);
        }
        Ok(code)
    }
}

/// Feeds stdout to the progress parser until end of stream.
///
/// Lines are decoded lossily. After a read error the rest of the stream is
/// drained unparsed so HandBrakeCLI never writes into a closed pipe.
async fn read_feed<R: AsyncRead + Unpin>(stdout: R, observer: &mut dyn ProgressObserver) {
    let mut reader = BufReader::new(stdout);
    let mut parser = ProgressParser::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if let Some(update) = parser.push_line(line) {
                    observer.on_progress(&update);
                }
            }
            Err(e) => {
                log::warn!("Progress feed read failed, ignoring the rest of it: {}", e);
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    log::warn!("Failed to drain HandBrakeCLI output: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(feature = "progress")]
fn default_observer() -> Result<Box<dyn ProgressObserver>> {
    Ok(Box::new(TerminalProgress::new()))
}

#[cfg(not(feature = "progress"))]
fn default_observer() -> Result<Box<dyn ProgressObserver>> {
    Err(HandBrakeError::MissingDependency {
        dependency: "progress observer".to_string(),
        reason: "enable the `progress` feature or supply an observer".to_string(),
    })
}
