use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_REMOTE_NAME: &str = "internal";

/// Where the mirror reads from, where it writes to, and where the working
/// copy lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub external_url: String,
    pub internal_url: String,
    /// Parent directory of the working copy.
    pub clone_folder: PathBuf,
    /// Directory name of the working copy inside `clone_folder`.
    pub name: String,
    /// Remote the retained branches are pushed to.
    pub remote_name: String,
}

impl RepositoryLocation {
    pub fn working_directory(&self) -> PathBuf {
        self.clone_folder.join(&self.name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.clone_folder.join(format!(".{}.lock", self.name))
    }

    pub fn clone_folder(&self) -> &Path {
        &self.clone_folder
    }
}

/// Branches and tags that survive a mirror run, in the order they are
/// processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefAllowList {
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RefAllowList {
    pub fn new(branches: Vec<String>, tags: Vec<String>) -> Self {
        Self { branches, tags }
    }

    pub fn keeps_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|kept| kept == tag)
    }
}
