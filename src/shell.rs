//! Shell detection and rc file discovery.

use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Shell families with known rc file layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    /// `.zshrc`, `.zshenv`
    Zsh,
    /// `.bashrc`, `.bash_profile`, `.profile`
    Bash,
    /// `config.fish`
    Fish,
    /// Anything unrecognized; uses the most common rc files
    Other,
}

impl ShellFamily {
    /// Classify a shell by the file name of its path (`/usr/bin/zsh` -> Zsh)
    pub fn from_shell_path(shell: &str) -> Self {
        let name = Path::new(shell)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(shell);

        match name {
            "zsh" => Self::Zsh,
            "bash" => Self::Bash,
            "fish" => Self::Fish,
            _ => Self::Other,
        }
    }

    /// Short name for display
    pub fn name(self) -> &'static str {
        match self {
            Self::Zsh => "zsh",
            Self::Bash => "bash",
            Self::Fish => "fish",
            Self::Other => "other",
        }
    }

    /// rc files relative to home, in update order
    pub fn rc_files(self) -> &'static [&'static str] {
        match self {
            Self::Zsh => &[".zshrc", ".zshenv"],
            Self::Bash => &[".bashrc", ".bash_profile", ".profile"],
            Self::Fish => &[".config/fish/config.fish"],
            Self::Other => &[".bashrc", ".zshrc", ".profile"],
        }
    }
}

/// A candidate rc file and whether it is present on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfigTarget {
    pub path: PathBuf,
    pub exists: bool,
}

/// Locates the rc files of the user's shell
#[derive(Debug, Clone)]
pub struct ShellLocator {
    home: PathBuf,
    family: ShellFamily,
}

impl ShellLocator {
    pub fn new(home: impl Into<PathBuf>, shell: &str) -> Self {
        Self {
            home: home.into(),
            family: ShellFamily::from_shell_path(shell),
        }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(&paths.home, &paths.shell)
    }

    /// Family detected from `$SHELL`
    pub fn family(&self) -> ShellFamily {
        self.family
    }

    /// File created when none of the candidates exist
    pub fn fallback_file(&self) -> PathBuf {
        self.home.join(".bashrc")
    }

    /// Absolute candidate paths for a shell family
    pub fn candidate_config_files(&self, family: ShellFamily) -> Vec<PathBuf> {
        family.rc_files().iter().map(|f| self.home.join(f)).collect()
    }

    pub fn targets(&self) -> Vec<ShellConfigTarget> {
        self.candidate_config_files(self.family)
            .into_iter()
            .map(|path| {
                let exists = path.is_file();
                ShellConfigTarget { path, exists }
            })
            .collect()
    }

    /// Candidates for the current shell that are present on disk
    pub fn existing_config_files(&self) -> Vec<PathBuf> {
        self.targets()
            .into_iter()
            .filter(|t| t.exists)
            .map(|t| t.path)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_family_from_shell_path() {
        assert_eq!(ShellFamily::from_shell_path("/bin/zsh"), ShellFamily::Zsh);
        assert_eq!(ShellFamily::from_shell_path("/usr/local/bin/bash"), ShellFamily::Bash);
        assert_eq!(ShellFamily::from_shell_path("/opt/homebrew/bin/fish"), ShellFamily::Fish);
        assert_eq!(ShellFamily::from_shell_path("fish"), ShellFamily::Fish);
        assert_eq!(ShellFamily::from_shell_path("/bin/tcsh"), ShellFamily::Other);
        assert_eq!(ShellFamily::from_shell_path(""), ShellFamily::Other);
    }

    #[test]
    fn test_locator_reports_family_name() {
        let locator = ShellLocator::new("/home/u", "/usr/bin/zsh");
        assert_eq!(locator.family(), ShellFamily::Zsh);
        assert_eq!(locator.family().name(), "zsh");
        assert_eq!(ShellLocator::new("/home/u", "/bin/tcsh").family().name(), "other");
    }

    #[test]
    fn test_candidates_rooted_at_home() {
        let locator = ShellLocator::new("/home/u", "/bin/zsh");
        assert_eq!(
            locator.candidate_config_files(ShellFamily::Zsh),
            vec![PathBuf::from("/home/u/.zshrc"), PathBuf::from("/home/u/.zshenv")]
        );
        assert_eq!(
            locator.candidate_config_files(ShellFamily::Fish),
            vec![PathBuf::from("/home/u/.config/fish/config.fish")]
        );
        assert_eq!(
            locator.candidate_config_files(ShellFamily::Other),
            vec![
                PathBuf::from("/home/u/.bashrc"),
                PathBuf::from("/home/u/.zshrc"),
                PathBuf::from("/home/u/.profile"),
            ]
        );
    }

    #[test]
    fn test_existing_config_files_filters_and_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path();
        fs::write(home.join(".profile"), "").unwrap();
        fs::write(home.join(".bashrc"), "").unwrap();

        let locator = ShellLocator::new(home, "/bin/bash");
        assert_eq!(
            locator.existing_config_files(),
            vec![home.join(".bashrc"), home.join(".profile")]
        );

        let targets = locator.targets();
        assert_eq!(targets.len(), 3);
        assert!(!targets[1].exists);
    }

    #[test]
    fn test_no_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ShellLocator::new(temp_dir.path(), "/bin/zsh");
        assert!(locator.existing_config_files().is_empty());
        assert_eq!(locator.fallback_file(), temp_dir.path().join(".bashrc"));
    }
}
