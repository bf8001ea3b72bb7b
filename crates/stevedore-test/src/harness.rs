//! Test harness helpers.

use std::path::PathBuf;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use stevedore_deployer::DirectoryUnit;

use crate::fixtures::{descriptor_path, test_unit_id};

/// Create a temporary directory for testing.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Create a file within a temporary directory, creating parents.
///
/// # Panics
///
/// Panics if the file cannot be created or written.
#[must_use]
pub fn test_file_in_dir(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    path
}

/// Lay out an exploded unit named `id` under `dir`, embedding `descriptor`
/// under the default convention.
///
/// # Panics
///
/// Panics if the files cannot be written.
#[must_use]
pub fn write_unit_dir(dir: &TempDir, id: &str, descriptor: &str) -> DirectoryUnit {
    let root = dir.path().join(id);
    let _ = test_file_in_dir(dir, &format!("{id}/{}", descriptor_path(id)), descriptor);
    DirectoryUnit::new(test_unit_id(id), root)
}

/// Set up test logging with the given filter.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}
