use std::{path::Path, time::Duration};

use anyhow::{bail, Context};
use log::{debug, info, warn};

use crate::{
    config::{GitConfig, MirrorConfig, RawConfig, RepositoryConfig},
    flock::FileLock,
    git::{GitCommandRunner, VersionControlRunner},
    model::{RefAllowList, RepositoryLocation, DEFAULT_REMOTE_NAME},
    workflow::{MirrorReport, MirrorWorkflow},
};

const DEFAULT_EXTERNAL_URL: &str = "https://github.com/example/project.git";
const DEFAULT_BRANCH: &str = "main";

/// Handler to sync command
/// 1 - Loads and validates the configuration
/// 2 - Takes the run lock next to the working copy
/// 3 - Runs the mirror workflow against the git binary
pub fn do_sync(
    config_file_path: &Path,
    timeout: Option<Duration>,
    lock_wait: Duration,
) -> anyhow::Result<MirrorReport> {
    let config = load_config(config_file_path)?;
    let timeout = timeout.or(config.git.timeout);

    let _lock = acquire_lock(&config.location, lock_wait)?;
    let runner = GitCommandRunner::new(&config.git.program, timeout)?;

    let report = MirrorWorkflow::new(&runner).run(&config.location, &config.allow_list)?;

    info!(
        "Mirrored {} branches of {} to {}",
        report.pushed_branches.len(),
        config.location.external_url,
        config.location.internal_url
    );
    if !report.deleted_tags.is_empty() {
        info!("Deleted tags: {}", report.deleted_tags.join(", "));
    }
    if !report.failed_tag_deletions.is_empty() {
        warn!(
            "Tags left in place after failed deletion: {}",
            report.failed_tag_deletions.join(", ")
        );
    }

    Ok(report)
}

/// Handler to check command
/// Validates the configuration and makes sure the git program can be started
pub fn do_check(config_file_path: &Path) -> anyhow::Result<MirrorConfig> {
    let config = load_config(config_file_path)?;
    let runner = GitCommandRunner::new(&config.git.program, config.git.timeout)?;
    check_git(&runner, &std::env::current_dir()?)?;

    let location = &config.location;
    info!(
        "Mirroring {} to {} through {}",
        location.external_url,
        location.internal_url,
        location.working_directory().display()
    );
    info!("Branches: {}", config.allow_list.branches.join(", "));
    info!("Tags: {}", config.allow_list.tags.join(", "));

    Ok(config)
}

/// Handler to init command
/// Writes a configuration template that can be edited and fed to sync
pub fn do_init(
    config_file_path: &Path,
    name: Option<String>,
    external_url: Option<String>,
    overwrite: bool,
) -> anyhow::Result<()> {
    if config_file_path.exists() && !overwrite {
        bail!("File already exists: {}", config_file_path.display());
    }

    let external_url = external_url.unwrap_or_else(|| DEFAULT_EXTERNAL_URL.to_owned());
    let name = build_repository_name(name, &external_url)?;
    let template = RawConfig {
        repository: RepositoryConfig {
            internal_url: Some(format!("git@git.internal:mirrors/{name}.git")),
            clone_folder: Some(std::env::temp_dir().join(format!("{name}_repo"))),
            remote_name: Some(DEFAULT_REMOTE_NAME.to_owned()),
            external_url: Some(external_url),
            name: Some(name),
        },
        refs: RefAllowList::new(vec![DEFAULT_BRANCH.to_owned()], vec![]),
        git: GitConfig::default(),
    };

    std::fs::write(config_file_path, toml::to_string_pretty(&template)?)
        .with_context(|| format!("Could not write {}", config_file_path.display()))?;
    info!("Wrote configuration to {}", config_file_path.display());

    Ok(())
}

fn load_config(config_file_path: &Path) -> anyhow::Result<MirrorConfig> {
    debug!("Loading configuration from {}", config_file_path.display());
    MirrorConfig::load(config_file_path)
        .with_context(|| format!("Invalid configuration in {}", config_file_path.display()))
}

fn acquire_lock(location: &RepositoryLocation, wait: Duration) -> anyhow::Result<FileLock> {
    let path = location.lock_path();
    debug!("Acquiring a lock on {}", path.display());
    let lock = FileLock::new(&path, wait)?;
    debug!("Acquired a lock on {}", path.display());
    Ok(lock)
}

fn check_git(runner: &impl VersionControlRunner, dir: &Path) -> anyhow::Result<()> {
    let result = runner.run(&["--version"], dir)?;
    if !result.success() {
        bail!("git --version failed: {}", result.status);
    }
    info!("Using {}", result.stdout.trim());
    Ok(())
}

/// Name if present otherwise attempt to extract from the external url
fn build_repository_name(name: Option<String>, external_url: &str) -> anyhow::Result<String> {
    match name {
        Some(name) => Ok(name),
        None => external_url
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()
            .map(|last| last.trim_end_matches(".git"))
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .with_context(|| {
                format!("Repository name not given and could not be derived from {external_url}")
            }),
    }
}
