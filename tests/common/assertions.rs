//! Custom test assertions for integration tests

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file below `dir`, sorted
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Assert `path` holds exactly `expected`
pub fn assert_file_contents(path: &Path, expected: &[u8]) {
    let actual = std::fs::read(path)
        .unwrap_or_else(|e| panic!("expected {} to exist: {e}", path.display()));
    assert_eq!(actual, expected, "unexpected contents in {}", path.display());
}

/// Assert no in-flight download file was left behind below `dir`
pub fn assert_no_partial_files(dir: &Path) {
    let leftovers: Vec<_> = files_under(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "part"))
        .collect();
    assert!(leftovers.is_empty(), "partial files left behind: {leftovers:?}");
}
