use std::{path::PathBuf, time::Duration};

use crate::{
    cli::command_handlers::{do_check, do_init, do_sync},
    config::MirrorConfig,
    workflow::MirrorReport,
};

mod builder;

pub use builder::GitMirrorBuilder;

pub struct GitMirror {
    config_file_path: PathBuf,
    timeout: Option<Duration>,
    lock_wait: Duration,
}

impl GitMirror {
    pub fn builder() -> GitMirrorBuilder {
        GitMirrorBuilder::default()
    }

    /// Mirrors the allow-listed branches and tags to the internal repository
    pub fn sync(&self) -> anyhow::Result<MirrorReport> {
        do_sync(&self.config_file_path, self.timeout, self.lock_wait)
    }

    /// Validates the configuration and checks that git can be started
    pub fn check(&self) -> anyhow::Result<MirrorConfig> {
        do_check(&self.config_file_path)
    }

    /// Creates a configuration template
    pub fn init(
        &self,
        name: Option<String>,
        external_url: Option<String>,
        overwrite: bool,
    ) -> anyhow::Result<()> {
        do_init(&self.config_file_path, name, external_url, overwrite)
    }
}
