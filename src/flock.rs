use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

/// Exclusive lock held for the duration of a mirror run.
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Another run holds the lock on {}", .0.display())]
    Contended(PathBuf),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl FileLock {
    /// Takes the lock, retrying once a second for at most `wait`.
    pub fn new(path: &Path, wait: Duration) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(true) => return Ok(Self { _file: file }),
                Ok(false) => {}
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error() => {}
                Err(error) => return Err(error.into()),
            }
            if start.elapsed() >= wait {
                return Err(Error::Contended(path.to_path_buf()));
            }
            debug!("Failed to acquire a lock on {}, retrying", path.display());
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}
