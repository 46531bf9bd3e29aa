use crate::constants::{INSTALL_TIMEOUT, QUERY_TIMEOUT};
use crate::error::ConfigError;
use crate::job::InstallOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub adb_path: Option<PathBuf>,
    pub package_dir: Option<PathBuf>,
    pub install_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub grant_permissions: bool,
    pub reinstall: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adb_path: None,
            package_dir: None,
            install_timeout_secs: INSTALL_TIMEOUT.as_secs(),
            query_timeout_secs: QUERY_TIMEOUT.as_secs(),
            grant_permissions: false,
            reinstall: true,
            log_dir: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Like [`Settings::load`], but a file that does not exist gives the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs.max(1))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.max(1))
    }

    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            overwrite_existing: self.reinstall,
            grant_all_permissions: self.grant_permissions,
        }
    }
}
