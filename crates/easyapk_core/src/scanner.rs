use crate::constants::PACKAGE_EXTENSION;
use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub path: PathBuf,
    pub name: String,
}

impl PackageFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, name }
    }
}

pub struct PackageScanner;

impl PackageScanner {
    /// Snapshot of the `.apk` files directly inside `dir`, sorted by file name.
    ///
    /// A folder that is missing or unreadable is a configuration state, so it
    /// yields an empty list instead of an error.
    pub fn scan(dir: &Path) -> Vec<PackageFile> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut packages: Vec<PackageFile> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && Self::is_package(path))
            .map(PackageFile::new)
            .collect();

        packages.sort_by(|a, b| a.name.cmp(&b.name));
        packages
    }

    pub fn is_package(path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(PACKAGE_EXTENSION))
    }

    /// Narrows a scan to the requested file names, keeping scan order.
    /// An empty request means every package.
    pub fn select(scanned: Vec<PackageFile>, names: &[String]) -> Result<Vec<PackageFile>, BatchError> {
        if names.is_empty() {
            return Ok(scanned);
        }
        if let Some(missing) = names
            .iter()
            .find(|name| !scanned.iter().any(|p| &p.name == *name))
        {
            return Err(BatchError::PackageNotFound(missing.clone()));
        }
        Ok(scanned
            .into_iter()
            .filter(|p| names.contains(&p.name))
            .collect())
    }
}
