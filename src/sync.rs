//! Applying a provider's variables to shell rc files.
//!
//! Every rc file of the user's shell that exists gets its managed block
//! replaced (see [`crate::env_block`]); when none exist, `~/.bashrc` is
//! created. Each file is backed up first and handled independently, so one
//! unwritable file does not stop the others.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::env_block::{self, EnvSnapshot, EnvVars, VAR_NAMES};
use crate::shell::ShellLocator;

/// The managed variables as the current process sees them.
///
/// Captured once at startup and updated by [`EnvSynchronizer::apply`]; the
/// real process environment is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnv {
    vars: EnvSnapshot,
}

impl SessionEnv {
    /// Read `ANTHROPIC_*` variables from the process environment
    pub fn capture() -> Self {
        let mut vars = EnvSnapshot::default();
        for name in VAR_NAMES {
            vars.set(name, std::env::var(name).ok());
        }
        Self { vars }
    }

    pub fn vars(&self) -> &EnvSnapshot {
        &self.vars
    }

    /// Mirror a freshly applied variable set; an absent model is cleared
    pub fn apply(&mut self, env: &EnvVars) {
        self.vars = EnvSnapshot::from(env);
    }
}

/// Outcome for one rc file
#[derive(Debug)]
pub enum TargetStatus {
    /// Existing file rewritten
    Updated,
    /// File did not exist and was created
    Created,
    /// File left untouched; holds the read or write error
    Failed(anyhow::Error),
}

/// Result for a single rc file
#[derive(Debug)]
pub struct TargetReport {
    pub path: PathBuf,
    /// Copy of the previous contents, when the file existed
    pub backup: Option<PathBuf>,
    pub status: TargetStatus,
}

impl TargetReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, TargetStatus::Failed(_))
    }
}

/// Per-file results of an apply
#[derive(Debug, Default)]
pub struct SyncReport {
    pub targets: Vec<TargetReport>,
}

impl SyncReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| t.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| !t.succeeded())
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded().next().is_none()
    }
}

/// Backup location: `<path>.backup.<ISO-8601 with ':' and '.' replaced by '-'>`
pub fn backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup.{}", stamp));
    PathBuf::from(name)
}

/// Writes provider variables into shell rc files
#[derive(Debug, Clone)]
pub struct EnvSynchronizer {
    locator: ShellLocator,
}

impl EnvSynchronizer {
    pub fn new(locator: ShellLocator) -> Self {
        Self { locator }
    }

    /// Locator used to find the rc files
    pub fn locator(&self) -> &ShellLocator {
        &self.locator
    }

    /// rc files `apply` would write, creating none
    pub fn planned_targets(&self) -> Vec<PathBuf> {
        let existing = self.locator.existing_config_files();
        if existing.is_empty() {
            vec![self.locator.fallback_file()]
        } else {
            existing
        }
    }

    /// Upsert the managed block into every target and mirror it into `session`.
    ///
    /// The mirror is left alone when no target could be written.
    pub fn apply(&self, env: &EnvVars, session: &mut SessionEnv) -> SyncReport {
        let now = Utc::now();
        let mut report = SyncReport::default();

        for path in self.planned_targets() {
            let target = match apply_to_file(&path, env, now) {
                Ok((existed, backup)) => TargetReport {
                    path,
                    backup,
                    status: if existed {
                        TargetStatus::Updated
                    } else {
                        TargetStatus::Created
                    },
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to update shell config");
                    TargetReport {
                        path,
                        backup: None,
                        status: TargetStatus::Failed(e),
                    }
                }
            };
            report.targets.push(target);
        }

        if !report.all_failed() {
            session.apply(env);
        }
        report
    }

    /// Values new shells will pick up, merged across existing rc files
    pub fn configured_env(&self) -> EnvSnapshot {
        let mut merged = EnvSnapshot::default();
        for path in self.locator.existing_config_files() {
            let Ok(content) = fs::read_to_string(&path) else {
                debug!(path = %path.display(), "skipping unreadable shell config");
                continue;
            };
            let found = env_block::read_exports(&content);
            for name in VAR_NAMES {
                if let Some(value) = found.get(name) {
                    merged.set(name, Some(value.to_string()));
                }
            }
        }
        merged
    }
}

/// Returns whether the file existed, and the backup path if one was made
fn apply_to_file(path: &Path, env: &EnvVars, now: DateTime<Utc>) -> Result<(bool, Option<PathBuf>)> {
    let existed = path.exists();
    let (content, backup) = if existed {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let backup = backup_path(path, now);
        fs::copy(path, &backup)
            .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
        (content, Some(backup))
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        (String::new(), None)
    };

    let updated = env_block::upsert_block(&content, env);
    fs::write(path, updated).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), existed, "wrote managed block");

    Ok((existed, backup))
}
