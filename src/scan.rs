use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively collect the absolute paths of every file under `root` whose
/// file name ends with `suffix`. With no suffix every file is returned.
/// Traversal order is whatever the filesystem yields.
pub fn files_with_suffix(root: &Path, suffix: Option<&str>) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| match suffix {
            Some(s) => entry.file_name().to_string_lossy().ends_with(s),
            None => true,
        })
        .map(|entry| {
            dunce::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf())
        })
        .collect()
}
