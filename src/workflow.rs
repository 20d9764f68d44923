use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    git::{CommandResult, RunnerError, VersionControlRunner},
    model::{RefAllowList, RepositoryLocation},
};

/// `git status` outside of a repository.
const NOT_A_REPOSITORY: i32 = 128;
/// `git remote add` for a remote name that is already configured.
const REMOTE_ALREADY_EXISTS: i32 = 3;
const ORIGIN: &str = "origin";
const COMPACT_ARGS: [&str; 6] = ["gc", "--auto", "-q", "--prune", "--cruft", "--aggressive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Status,
    Clone,
    Update,
    Checkout,
    Pull,
    ListTags,
    Compact,
    AddRemote,
    Push,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Status => "status",
            Phase::Clone => "clone",
            Phase::Update => "pull",
            Phase::Checkout => "checkout",
            Phase::Pull => "branch pull",
            Phase::ListTags => "tag list",
            Phase::Compact => "compress",
            Phase::AddRemote => "remote add",
            Phase::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Git {phase}{} could not be run", on(.target))]
    Spawn {
        phase: Phase,
        target: Option<String>,
        source: RunnerError,
    },
    #[error("Git {phase}{} failed: {status}", on(.target))]
    UnexpectedStatus {
        phase: Phase,
        target: Option<String>,
        status: i32,
    },
    #[error("Could not create working directory {}", .path.display())]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WorkflowError {
    /// Phase that stopped the run, if a git command was involved.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            WorkflowError::Spawn { phase, .. } | WorkflowError::UnexpectedStatus { phase, .. } => {
                Some(*phase)
            }
            WorkflowError::Workspace { .. } => None,
        }
    }
}

fn on(target: &Option<String>) -> String {
    target
        .as_deref()
        .map(|target| format!(" of {target}"))
        .unwrap_or_default()
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// The working copy was cloned from scratch rather than updated.
    pub cloned: bool,
    pub pushed_branches: Vec<String>,
    pub deleted_tags: Vec<String>,
    /// Tags that should have been deleted but were left in place.
    pub failed_tag_deletions: Vec<String>,
    /// The destination remote was registered by this run.
    pub remote_added: bool,
}

/// Mirrors allow-listed refs from the external repository to the internal
/// one.
///
/// Phases run strictly in order and the first unaccepted exit status ends the
/// run. Only per-tag deletion is best effort. Every phase is safe to repeat,
/// so a failed run is recovered by running again.
pub struct MirrorWorkflow<R> {
    runner: R,
}

impl<R> MirrorWorkflow<R>
where
    R: VersionControlRunner,
{
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn run(
        &self,
        location: &RepositoryLocation,
        allow_list: &RefAllowList,
    ) -> Result<MirrorReport, WorkflowError> {
        let working_directory = location.working_directory();
        let mut report = MirrorReport::default();

        report.cloned = self.ensure_clone(location, &working_directory)?;
        if !report.cloned {
            self.update(&working_directory)?;
        }

        self.reconcile_branches(&working_directory, &allow_list.branches)?;
        self.reconcile_tags(&working_directory, allow_list, &mut report)?;
        self.compact(&working_directory)?;
        report.remote_added = self.register_remote(&working_directory, location)?;
        report.pushed_branches =
            self.push_branches(&working_directory, &location.remote_name, &allow_list.branches)?;

        Ok(report)
    }

    /// Returns `true` when the repository had to be cloned.
    fn ensure_clone(
        &self,
        location: &RepositoryLocation,
        working_directory: &Path,
    ) -> Result<bool, WorkflowError> {
        if !working_directory.exists() {
            debug!("Creating working directory {}", working_directory.display());
            std::fs::create_dir_all(working_directory).map_err(|source| {
                WorkflowError::Workspace {
                    path: working_directory.to_path_buf(),
                    source,
                }
            })?;
        }

        let status = self.git(Phase::Status, None, &["status"], working_directory)?;
        match status.status {
            NOT_A_REPOSITORY => {
                info!(
                    "Cloning {} into {}",
                    location.external_url,
                    working_directory.display()
                );
                let result = self.git(
                    Phase::Clone,
                    None,
                    &["clone", &location.external_url, &location.name],
                    location.clone_folder(),
                )?;
                expect_success(Phase::Clone, None, result)?;
                Ok(true)
            }
            0 => Ok(false),
            status => Err(WorkflowError::UnexpectedStatus {
                phase: Phase::Status,
                target: None,
                status,
            }),
        }
    }

    fn update(&self, working_directory: &Path) -> Result<(), WorkflowError> {
        info!("Pulling changes into {}", working_directory.display());
        let result = self.git(Phase::Update, None, &["pull", ORIGIN], working_directory)?;
        expect_success(Phase::Update, None, result)
    }

    fn reconcile_branches(
        &self,
        working_directory: &Path,
        branches: &[String],
    ) -> Result<(), WorkflowError> {
        for branch in branches {
            info!("Updating branch {}", branch);
            self.checkout(working_directory, branch)?;
            let result = self.git(
                Phase::Pull,
                Some(branch.as_str()),
                &["pull", ORIGIN],
                working_directory,
            )?;
            expect_success(Phase::Pull, Some(branch.as_str()), result)?;
        }
        Ok(())
    }

    fn reconcile_tags(
        &self,
        working_directory: &Path,
        allow_list: &RefAllowList,
        report: &mut MirrorReport,
    ) -> Result<(), WorkflowError> {
        let result = self.git(Phase::ListTags, None, &["tag", "-l"], working_directory)?;
        if !result.success() {
            return Err(WorkflowError::UnexpectedStatus {
                phase: Phase::ListTags,
                target: None,
                status: result.status,
            });
        }

        let unwanted: Vec<&str> = parse_tag_list(&result.stdout)
            .filter(|tag| !allow_list.keeps_tag(tag))
            .collect();
        info!("Removing {} tags not on the allow-list", unwanted.len());

        for tag in unwanted {
            match self.runner.run(&["tag", "-d", tag], working_directory) {
                Ok(result) if result.success() => {
                    debug!("Deleted tag {}", tag);
                    report.deleted_tags.push(tag.to_owned());
                }
                Ok(result) => {
                    warn!("Could not delete tag {}: exit status {}", tag, result.status);
                    report.failed_tag_deletions.push(tag.to_owned());
                }
                Err(error) => {
                    warn!("Could not delete tag {}: {}", tag, error);
                    report.failed_tag_deletions.push(tag.to_owned());
                }
            }
        }
        Ok(())
    }

    fn compact(&self, working_directory: &Path) -> Result<(), WorkflowError> {
        info!("Compressing repository");
        let result = self.git(Phase::Compact, None, &COMPACT_ARGS, working_directory)?;
        expect_success(Phase::Compact, None, result)
    }

    /// Returns `true` when the remote was not configured before.
    fn register_remote(
        &self,
        working_directory: &Path,
        location: &RepositoryLocation,
    ) -> Result<bool, WorkflowError> {
        let result = self.git(
            Phase::AddRemote,
            Some(location.remote_name.as_str()),
            &["remote", "add", &location.remote_name, &location.internal_url],
            working_directory,
        )?;
        match result.status {
            0 => {
                info!(
                    "Added remote {} for {}",
                    location.remote_name, location.internal_url
                );
                Ok(true)
            }
            REMOTE_ALREADY_EXISTS => {
                debug!("Remote {} already exists", location.remote_name);
                Ok(false)
            }
            status => Err(WorkflowError::UnexpectedStatus {
                phase: Phase::AddRemote,
                target: Some(location.remote_name.clone()),
                status,
            }),
        }
    }

    fn push_branches(
        &self,
        working_directory: &Path,
        remote: &str,
        branches: &[String],
    ) -> Result<Vec<String>, WorkflowError> {
        let mut pushed = Vec::with_capacity(branches.len());
        for branch in branches {
            info!("Pushing branch {} to {}", branch, remote);
            self.checkout(working_directory, branch)?;
            let result = self.git(
                Phase::Push,
                Some(branch.as_str()),
                &["push", remote, branch],
                working_directory,
            )?;
            expect_success(Phase::Push, Some(branch.as_str()), result)?;
            pushed.push(branch.clone());
        }
        Ok(pushed)
    }

    fn checkout(&self, working_directory: &Path, branch: &str) -> Result<(), WorkflowError> {
        let result = self.git(
            Phase::Checkout,
            Some(branch),
            &["checkout", branch],
            working_directory,
        )?;
        expect_success(Phase::Checkout, Some(branch), result)
    }

    fn git(
        &self,
        phase: Phase,
        target: Option<&str>,
        args: &[&str],
        dir: &Path,
    ) -> Result<CommandResult, WorkflowError> {
        let result = self
            .runner
            .run(args, dir)
            .map_err(|source| WorkflowError::Spawn {
                phase,
                target: target.map(str::to_owned),
                source,
            })?;
        if !result.success() && !result.stderr.is_empty() {
            debug!("git {} stderr: {}", phase, result.stderr.trim_end());
        }
        Ok(result)
    }
}

fn expect_success(
    phase: Phase,
    target: Option<&str>,
    result: CommandResult,
) -> Result<(), WorkflowError> {
    if result.success() {
        Ok(())
    } else {
        Err(WorkflowError::UnexpectedStatus {
            phase,
            target: target.map(str::to_owned),
            status: result.status,
        })
    }
}

/// One tag per line; the empty entry after the final newline is dropped.
fn parse_tag_list(stdout: &str) -> impl Iterator<Item = &str> {
    stdout
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
}
