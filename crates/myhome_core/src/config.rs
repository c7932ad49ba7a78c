//! Application configuration.
//!
//! # Responsibility
//! - Describe where the database, photo binaries and logs live.
//! - Load overrides from a TOML file on top of defaults.
//!
//! Default layout (base is `$MYHOME_HOME`, else `<home>/.myhome`, else
//! `<cwd>/.myhome`):
//! ```text
//! <base>/
//! ├── config.toml
//! ├── myhome.sqlite3
//! ├── photos/
//! └── logs/
//! ```

use crate::logging::parse_level;
use crate::service::incidence_service::LinkPolicy;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HOME_ENV_VAR: &str = "MYHOME_HOME";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "myhome.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings shared by the CLI and embedders.
///
/// Every field is optional in the file; missing ones keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub photo_dir: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub link_policy: LinkPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_base(&default_base_dir())
    }
}

impl AppConfig {
    /// Default settings rooted at `base`.
    pub fn with_base(base: &Path) -> Self {
        Self {
            database_path: base.join(DB_FILE_NAME),
            photo_dir: base.join("photos"),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: base.join("logs"),
            link_policy: LinkPolicy::default(),
        }
    }

    /// Location of the config file inside the default base directory.
    pub fn default_path() -> PathBuf {
        default_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Loads `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("database_path", &self.database_path),
            ("photo_dir", &self.photo_dir),
            ("log_dir", &self.log_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        parse_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }
}

fn default_base_dir() -> PathBuf {
    resolve_base_dir(std::env::var_os(HOME_ENV_VAR), dirs::home_dir)
}

/// `override_dir` wins when non-empty; then the user's home; then the
/// current directory.
fn resolve_base_dir(
    override_dir: Option<OsString>,
    home_dir: impl FnOnce() -> Option<PathBuf>,
) -> PathBuf {
    if let Some(base) = override_dir.filter(|value| !value.is_empty()) {
        return PathBuf::from(base);
    }
    home_dir()
        .filter(|home| !home.as_os_str().is_empty())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
        .join(".myhome")
}
