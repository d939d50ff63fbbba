//! Test utilities shared across test modules

use crate::paths::Paths;
use tempfile::TempDir;

/// Create a Paths struct rooted in a temporary home directory
///
/// The config dir lands at `<tmp>/.claude`, mirroring the real layout, and
/// the shell is set to the given path so locator tests are deterministic.
pub fn setup_test_paths(temp_dir: &TempDir, shell: &str) -> Paths {
    Paths::with_home(temp_dir.path().to_path_buf(), None, shell)
}
