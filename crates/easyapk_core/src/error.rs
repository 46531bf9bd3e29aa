use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("adb executable not found: {0}")]
    BridgeNotFound(String),

    #[error("adb command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("adb process failed: {0}")]
    ProcessFailed(String),

    #[error("property not found: {0}")]
    PropertyNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Reasons a batch refuses to start. None of these leave jobs behind.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("adb is not available: {0}")]
    BridgeUnavailable(#[source] BridgeError),

    #[error("an installation batch is already running")]
    AlreadyRunning,

    #[error("no device selected or attached")]
    NoDevices,

    #[error("multiple devices attached, select explicitly: {}", .0.join(", "))]
    AmbiguousDevices(Vec<String>),

    #[error("package folder not found: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("no APK files found in {}", .0.display())]
    NoPackages(PathBuf),

    #[error("package not found in source folder: {0}")]
    PackageNotFound(String),

    #[error("batch task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
