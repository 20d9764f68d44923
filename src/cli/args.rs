use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Mirrors allow-listed branches and tags from an external git repository to an internal one.
#[derive(Debug, Parser)]
#[command(version)]
pub struct CliArgs {
    #[command(subcommand)]
    pub cmd: Command,
    /// Location of the mirror configuration toml file
    #[arg(short, long, env = "GITMIRROR_CONFIG", default_value = "gitmirror.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    ///Updates the working copy, prunes tags and pushes the allow-listed branches
    Sync {
        /// Kill any single git command running longer than this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
        /// How long to wait for a concurrent run to release the lock
        #[arg(long, value_name = "SECONDS", default_value_t = 0)]
        lock_wait: u64,
    },
    ///Validates the configuration and the git installation
    Check,
    ///Writes a configuration template
    Init {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        external_url: Option<String>,
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parse_sync() {
        let args =
            CliArgs::try_parse_from(["gitmirror", "-c", "/etc/zephyr.toml", "sync", "--timeout", "600"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/zephyr.toml"));
        match args.cmd {
            Command::Sync { timeout, lock_wait } => {
                assert_eq!(timeout, Some(600));
                assert_eq!(lock_wait, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_init() {
        let args = CliArgs::try_parse_from(["gitmirror", "init", "--name", "zephyr", "--force"]).unwrap();
        match args.cmd {
            Command::Init {
                name,
                external_url,
                force,
            } => {
                assert_eq!(name.as_deref(), Some("zephyr"));
                assert_eq!(external_url, None);
                assert!(force);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
