use std::time::Duration;

pub const APP_NAME: &str = "EasyApk";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = "Ahmad Morningstar";
pub const HOMEPAGE: &str = "https://github.com/AhmadMorningstar";

pub const PACKAGE_EXTENSION: &str = "apk";

/// adb prints this on a completed install; its absence is a failure even on exit code 0.
pub const SUCCESS_MARKER: &str = "Success";

pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEVICE_LIST_HEADER: &str = "List of devices attached";
pub const UNKNOWN_MODEL: &str = "Unknown";
pub const NOT_AVAILABLE: &str = "N/A";

pub const CONFIG_FILE_NAME: &str = "easyapk.toml";
pub const PLATFORM_TOOLS_DIR: &str = "platform-tools";

pub const VERIFICATION_FAILURE_CODE: &str = "INSTALL_FAILED_VERIFICATION_FAILURE";
pub const INSUFFICIENT_STORAGE_CODE: &str = "INSTALL_FAILED_INSUFFICIENT_STORAGE";

pub const WARNING_TEXTS: &[&str] = &[
    "⚠️  Enable USB debugging and accept the RSA prompt on every device",
    "⚠️  Installs replace existing apps of the same package unless --no-reinstall is used",
];

pub const INFO_TEXTS: &[&str] = &[
    "💡  Ctrl+C once skips the current APK, twice cancels the whole batch",
    "💡  A single attached device is selected automatically",
];

pub const MENU_OPTIONS: &[(&str, &str)] = &[
    ("1", "Select ADB devices (single or multiple)"),
    ("2", "Set APK folder path"),
    ("3", "Toggle grant all permissions (-g)"),
    ("4", "Install all APKs in folder"),
    ("5", "Install a single APK"),
    ("6", "Show detailed device info"),
    ("7", "About"),
    ("0", "Exit"),
];
