use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Shell assumed when `$SHELL` is not set
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// All computed paths used by ccx
#[derive(Debug, Clone)]
pub struct Paths {
    /// The user's home directory; shell rc files are resolved against it
    pub home: PathBuf,
    /// ~/.claude (or `--config-dir`)
    pub config_dir: PathBuf,
    /// ~/.claude/providers.json
    pub providers_file: PathBuf,
    /// Value of `$SHELL`, falling back to [`DEFAULT_SHELL`]
    pub shell: String,
}

impl Paths {
    /// Resolve paths from the environment, honoring an explicit config dir override
    pub fn new(config_dir: Option<PathBuf>) -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let home = base_dirs.home_dir().to_path_buf();
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SHELL.to_string());

        Ok(Self::with_home(home, config_dir, shell))
    }

    pub fn with_home(home: PathBuf, config_dir: Option<PathBuf>, shell: impl Into<String>) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| home.join(".claude"));
        let providers_file = config_dir.join("providers.json");

        Self {
            home,
            config_dir,
            providers_file,
            shell: shell.into(),
        }
    }

    /// Path of a timestamped backup of the `mcp` section
    pub fn mcp_backup(&self, millis: i64) -> PathBuf {
        self.config_dir.join(format!("mcp_backup_{}.json", millis))
    }

    /// Resolve a path relative to the home directory
    pub fn in_home(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.home.join(relative)
    }
}
