use std::{path::Path, process::Stdio, time::Duration};

use log::{debug, trace};
use tokio::{process::Command, runtime::Runtime};

use super::{CommandResult, RunnerError, VersionControlRunner};

/// Runs the git binary as a child process.
///
/// Every call blocks until git exits, or until the optional timeout
/// elapses, in which case the child is killed.
pub struct GitCommandRunner {
    program: String,
    timeout: Option<Duration>,
    runtime: Runtime,
}

impl GitCommandRunner {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Result<Self, RunnerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            program: program.into(),
            timeout,
            runtime,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn output(&self, command: &mut Command) -> Result<std::process::Output, RunnerError> {
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| RunnerError::Timeout {
                    program: self.program.clone(),
                    timeout,
                })?,
            None => command.output().await,
        };
        output.map_err(|source| RunnerError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

impl VersionControlRunner for GitCommandRunner {
    fn run(&self, args: &[&str], dir: &Path) -> Result<CommandResult, RunnerError> {
        debug!(
            "Running `{} {}` in {}",
            self.program,
            args.join(" "),
            dir.display()
        );

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            // Never block a scheduled run on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0");

        // Keep repository discovery from walking above the working directory.
        if let Some(parent) = dir.canonicalize().ok().as_deref().and_then(Path::parent) {
            command.env("GIT_CEILING_DIRECTORIES", parent);
        }

        let output = self.runtime.block_on(self.output(&mut command))?;

        let result = CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!("`{}` exited with {}", args.join(" "), result.status);

        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn captures_status_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = GitCommandRunner::new("sh", None).unwrap();

        let result = runner
            .run(&["-c", "echo out; echo err >&2; exit 3"], dir.path())
            .unwrap();

        assert_eq!(result.status, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = GitCommandRunner::new("gitmirror-no-such-program", None).unwrap();

        let error = runner.run(&["status"], dir.path()).unwrap_err();

        assert!(matches!(error, RunnerError::Spawn { .. }), "{error:?}");
    }

    #[test]
    fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let runner = GitCommandRunner::new("sh", Some(Duration::from_millis(100))).unwrap();

        let error = runner.run(&["-c", "sleep 5"], dir.path()).unwrap_err();

        assert!(matches!(error, RunnerError::Timeout { .. }), "{error:?}");
    }
}
