mod command;

use std::{path::Path, time::Duration};

use thiserror::Error;

pub use command::GitCommandRunner;

/// Captured result of a single git invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    /// Exit status. A process killed by a signal reports `-1`.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(status: i32) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Could not start {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Runs version control commands against a working directory.
///
/// Implementations block until the command has finished. A returned
/// `CommandResult` means the command ran, whatever its exit status; an
/// `Err` means it could not be run at all.
pub trait VersionControlRunner {
    fn run(&self, args: &[&str], dir: &Path) -> Result<CommandResult, RunnerError>;
}

impl<R> VersionControlRunner for &R
where
    R: VersionControlRunner + ?Sized,
{
    fn run(&self, args: &[&str], dir: &Path) -> Result<CommandResult, RunnerError> {
        (**self).run(args, dir)
    }
}
