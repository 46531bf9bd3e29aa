use easyapk_core::constants::CONFIG_FILE_NAME;
use std::env;
use std::path::{Path, PathBuf};

/// Directory the executable ships in. Under `target/debug` or `target/release`
/// this is the project root instead, so dev builds find the same files.
pub fn exe_base_dir() -> Option<PathBuf> {
    let exe_path = env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?.to_path_buf();
    Some(base_for(&exe_dir))
}

fn base_for(exe_dir: &Path) -> PathBuf {
    let profile = exe_dir.file_name().and_then(|n| n.to_str());
    let parent = exe_dir.parent();
    let in_target = parent
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "target");

    match (profile, parent) {
        (Some("debug" | "release"), Some(target)) if in_target => target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| exe_dir.to_path_buf()),
        _ => exe_dir.to_path_buf(),
    }
}

pub fn resolve_file_dev_release(name: &str) -> Option<PathBuf> {
    let candidate = exe_base_dir()?.join(name);
    if candidate.is_file() {
        Some(candidate.canonicalize().unwrap_or(candidate))
    } else {
        None
    }
}

/// `easyapk.toml` in the working directory wins over the one next to the binary.
pub fn find_config() -> Option<PathBuf> {
    let local = env::current_dir().ok()?.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    resolve_file_dev_release(CONFIG_FILE_NAME)
}
