use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{RefAllowList, RepositoryLocation, DEFAULT_REMOTE_NAME};

pub const DEFAULT_GIT_PROGRAM: &str = "git";
const ENV_PREFIX: &str = "GITMIRROR";

/// Validated settings for one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub location: RepositoryLocation,
    pub allow_list: RefAllowList,
    pub git: GitSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub program: String,
    pub timeout: Option<Duration>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not load configuration")]
    Load(#[from] config::ConfigError),
    #[error("Missing configuration value `{0}`")]
    MissingValue(&'static str),
    #[error("Invalid {kind} name `{name}`")]
    InvalidRefName { kind: &'static str, name: String },
    #[error("Repository name `{0}` must be a single directory name")]
    InvalidRepositoryName(String),
    #[error("Invalid {kind} URL `{url}`")]
    InvalidUrl { kind: &'static str, url: String },
    #[error("No branches to mirror, `refs.branches` is empty")]
    NoBranches,
}

impl MirrorConfig {
    /// Loads the TOML file at `path`, applying `GITMIRROR_*` environment
    /// overrides on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        RawConfig::load(path, None)?.validate()
    }
}

#[derive(Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub refs: RefAllowList,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RepositoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
}

#[derive(Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct GitConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl RawConfig {
    fn load(path: &Path, env: Option<HashMap<String, String>>) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    fn validate(self) -> Result<MirrorConfig, ConfigError> {
        let RawConfig {
            repository,
            refs,
            git,
        } = self;

        let external_url = required(repository.external_url, "repository.external_url")?;
        let internal_url = required(repository.internal_url, "repository.internal_url")?;
        let clone_folder = repository
            .clone_folder
            .filter(|folder| !folder.as_os_str().is_empty())
            .ok_or(ConfigError::MissingValue("repository.clone_folder"))?;
        let name = required(repository.name, "repository.name")?;
        let remote_name = repository
            .remote_name
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME.to_owned());

        check_url("external", &external_url)?;
        check_url("internal", &internal_url)?;
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidRepositoryName(name));
        }
        check_ref_name("remote", &remote_name)?;

        if refs.branches.is_empty() {
            return Err(ConfigError::NoBranches);
        }
        for branch in &refs.branches {
            check_ref_name("branch", branch)?;
        }
        for tag in &refs.tags {
            check_ref_name("tag", tag)?;
        }

        Ok(MirrorConfig {
            location: RepositoryLocation {
                external_url,
                internal_url,
                clone_folder: expand_home(clone_folder),
                name,
                remote_name,
            },
            allow_list: refs,
            git: GitSettings {
                program: git
                    .program
                    .unwrap_or_else(|| DEFAULT_GIT_PROGRAM.to_owned()),
                timeout: git.timeout_secs.map(Duration::from_secs),
            },
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingValue(key))
}

fn check_url(kind: &'static str, url: &str) -> Result<(), ConfigError> {
    // Values are passed to git as positional arguments.
    if url.starts_with('-') || url.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidUrl {
            kind,
            url: url.to_owned(),
        });
    }
    Ok(())
}

fn check_ref_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if ref_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRefName {
            kind,
            name: name.to_owned(),
        })
    }
}

fn ref_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^-\s~^:?*\[\\][^\s~^:?*\[\\]*$").expect("ref name pattern is valid")
    })
}

fn expand_home(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(rest);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
[repository]
external_url = "https://github.com/example/project.git"
internal_url = "git@internal.example.com:mirrors/project.git"
clone_folder = "/var/lib/gitmirror"
name = "project"

[refs]
branches = ["main"]
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, contents.as_bytes()).unwrap();
        file
    }

    fn load(contents: &str, env: &[(&str, &str)]) -> Result<MirrorConfig, ConfigError> {
        let file = write_config(contents);
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawConfig::load(file.path(), Some(env))?.validate()
    }

    #[test]
    fn load_example() {
        let path = project_root::get_project_root()
            .unwrap()
            .join("resources/gitmirror.toml");
        let config = RawConfig::load(&path, Some(HashMap::new()))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(
            config,
            MirrorConfig {
                location: RepositoryLocation {
                    external_url: "https://github.com/zephyrproject-rtos/zephyr.git".to_owned(),
                    internal_url: "git@gitlab.example.com:mirrors/zephyr.git".to_owned(),
                    clone_folder: PathBuf::from("/tmp/zephyr_repo"),
                    name: "zephyr".to_owned(),
                    remote_name: "internal".to_owned(),
                },
                allow_list: RefAllowList::new(
                    vec![
                        "main".to_owned(),
                        "v3.2-branch".to_owned(),
                        "v2.7-branch".to_owned()
                    ],
                    vec![
                        "v2.7.0".to_owned(),
                        "zephyr-v2.7.0".to_owned(),
                        "v3.2.0".to_owned(),
                        "zephyr-v3.2.0".to_owned()
                    ]
                ),
                git: GitSettings {
                    program: "git".to_owned(),
                    timeout: Some(Duration::from_secs(3600)),
                },
            }
        );
    }

    #[test]
    fn defaults_for_optional_values() {
        let config = load(MINIMAL, &[]).unwrap();
        assert_eq!(config.location.remote_name, DEFAULT_REMOTE_NAME);
        assert_eq!(config.allow_list.tags, Vec::<String>::new());
        assert_eq!(
            config.git,
            GitSettings {
                program: DEFAULT_GIT_PROGRAM.to_owned(),
                timeout: None
            }
        );
    }

    #[test]
    fn environment_overrides_file() {
        let config = load(
            MINIMAL,
            &[
                (
                    "GITMIRROR_REPOSITORY__INTERNAL_URL",
                    "ssh://git@other.example.com/project.git",
                ),
                ("GITMIRROR_GIT__TIMEOUT_SECS", "60"),
            ],
        )
        .unwrap();
        assert_eq!(
            config.location.internal_url,
            "ssh://git@other.example.com/project.git"
        );
        assert_eq!(config.git.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn missing_internal_url() {
        let contents = MINIMAL.replace(
            "internal_url = \"git@internal.example.com:mirrors/project.git\"\n",
            "",
        );
        let error = load(&contents, &[]).unwrap_err();
        assert!(
            matches!(error, ConfigError::MissingValue("repository.internal_url")),
            "{error:?}"
        );
    }

    #[test]
    fn empty_branch_list() {
        let contents = MINIMAL.replace("branches = [\"main\"]", "branches = []");
        let error = load(&contents, &[]).unwrap_err();
        assert!(matches!(error, ConfigError::NoBranches), "{error:?}");
    }

    #[test]
    fn option_like_names_are_rejected() {
        let contents = MINIMAL.replace("branches = [\"main\"]", "branches = [\"main\", \"--force\"]");
        let error = load(&contents, &[]).unwrap_err();
        assert_eq!(error.to_string(), "Invalid branch name `--force`");

        let contents = format!("{MINIMAL}tags = [\"v1 .0\"]\n");
        let error = load(&contents, &[]).unwrap_err();
        assert_eq!(error.to_string(), "Invalid tag name `v1 .0`");
    }

    #[test]
    fn nested_repository_name_is_rejected() {
        let contents = MINIMAL.replace("name = \"project\"", "name = \"a/project\"");
        let error = load(&contents, &[]).unwrap_err();
        assert!(
            matches!(error, ConfigError::InvalidRepositoryName(_)),
            "{error:?}"
        );
    }

    #[test]
    fn ref_names() {
        for name in ["main", "v3.2-branch", "release/1.x", "zephyr-v2.7.0", "v1.0+rc"] {
            assert!(ref_name_pattern().is_match(name), "{name}");
        }
        for name in ["", "-f", "a b", "a~1", "a^", "a:b", "a?", "a*", "a[b", "a\\b"] {
            assert!(!ref_name_pattern().is_match(name), "{name}");
        }
    }

    #[test]
    fn home_is_expanded() {
        let expanded = expand_home(PathBuf::from("~/mirrors"));
        if let Some(home) = home::home_dir() {
            assert_eq!(expanded, home.join("mirrors"));
        }
        assert_eq!(
            expand_home(PathBuf::from("/srv/mirrors")),
            PathBuf::from("/srv/mirrors")
        );
    }
}
