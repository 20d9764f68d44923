use std::{env, path::PathBuf, time::Duration};

use crate::GitMirror;

#[derive(Default)]
pub struct GitMirrorBuilder {
    // The configuration path is relative to `root`
    root: Option<PathBuf>,
    config_file_name: Option<PathBuf>,
    timeout: Option<Duration>,
    lock_wait: Option<Duration>,
}

impl GitMirrorBuilder {
    /// Directory relative paths are resolved against.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the mirror configuration toml file.
    ///
    /// Defaults to `gitmirror.toml`.
    pub fn config_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file_name = Some(path.into());
        self
    }

    /// Upper bound for a single git command.
    ///
    /// Overrides `git.timeout_secs` from the configuration file.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How long `sync` waits for another run to release the lock.
    ///
    /// Defaults to not waiting at all.
    pub fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = Some(wait);
        self
    }

    pub fn try_build(self) -> anyhow::Result<GitMirror> {
        let Self {
            root,
            config_file_name,
            timeout,
            lock_wait,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let config_file_path =
            root.join(config_file_name.unwrap_or_else(|| PathBuf::from("gitmirror.toml")));

        Ok(GitMirror {
            config_file_path,
            timeout,
            lock_wait: lock_wait.unwrap_or(Duration::ZERO),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn relative_config_is_resolved_against_root() {
        let mirror = GitMirror::builder()
            .root("/srv/mirrors")
            .config_file_name("zephyr.toml")
            .try_build()
            .unwrap();
        assert_eq!(mirror.config_file_path, PathBuf::from("/srv/mirrors/zephyr.toml"));
        assert_eq!(mirror.lock_wait, Duration::ZERO);
        assert_eq!(mirror.timeout, None);
    }

    #[test]
    fn absolute_config_wins_over_root() {
        let mirror = GitMirror::builder()
            .root("/srv/mirrors")
            .config_file_name("/etc/gitmirror/zephyr.toml")
            .timeout(Duration::from_secs(30))
            .try_build()
            .unwrap();
        assert_eq!(
            mirror.config_file_path,
            PathBuf::from("/etc/gitmirror/zephyr.toml")
        );
        assert_eq!(mirror.timeout, Some(Duration::from_secs(30)));
    }
}
