use std::time::Duration;

use clap::Parser;
use gitmirror::{
    cli::args::{CliArgs, Command},
    GitMirror,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli_args = CliArgs::parse();

    let mut builder = GitMirror::builder().config_file_name(&cli_args.config);
    if let Command::Sync { timeout, lock_wait } = &cli_args.cmd {
        builder = builder.lock_wait(Duration::from_secs(*lock_wait));
        if let Some(timeout) = timeout {
            builder = builder.timeout(Duration::from_secs(*timeout));
        }
    }
    let mirror = builder.try_build()?;

    match cli_args.cmd {
        Command::Sync { .. } => {
            mirror.sync()?;
        }
        Command::Check => {
            mirror.check()?;
        }
        Command::Init {
            name,
            external_url,
            force,
        } => mirror.init(name, external_url, force)?,
    }

    Ok(())
}
