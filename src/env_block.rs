//! The managed block of `export` lines written into shell rc files.
//!
//! A block looks like:
//!
//! ```text
//! # CCX - Claude Code API Provider Configuration
//! export ANTHROPIC_AUTH_TOKEN="sk-..."
//! export ANTHROPIC_BASE_URL="https://api.example.com"
//! export ANTHROPIC_MODEL="model-name"
//! ```
//!
//! Values are written verbatim between double quotes; embedded quotes are not
//! escaped.

use crate::store::ProviderProfile;

/// First line of every managed block
pub const MARKER: &str = "# CCX - Claude Code API Provider Configuration";

pub const AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";
pub const BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const MODEL: &str = "ANTHROPIC_MODEL";

/// Every variable this tool manages, in block order
pub const VAR_NAMES: [&str; 3] = [AUTH_TOKEN, BASE_URL, MODEL];

const EXPORT_PREFIX: &str = "export ANTHROPIC_";

/// Variables derived from a provider profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVars {
    pub auth_token: String,
    pub base_url: String,
    pub model: Option<String>,
}

impl EnvVars {
    pub fn from_profile(profile: &ProviderProfile) -> Self {
        let model = Some(profile.model.clone()).filter(|m| !m.is_empty());
        Self {
            auth_token: profile.api_key.clone(),
            base_url: profile.base_url.clone(),
            model,
        }
    }

    /// Defined `(name, value)` pairs in block order
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            (AUTH_TOKEN, self.auth_token.as_str()),
            (BASE_URL, self.base_url.as_str()),
        ];
        if let Some(model) = &self.model {
            pairs.push((MODEL, model.as_str()));
        }
        pairs
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }
}

/// A possibly incomplete view of the managed variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub auth_token: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl EnvSnapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            AUTH_TOKEN => self.auth_token.as_deref(),
            BASE_URL => self.base_url.as_deref(),
            MODEL => self.model.as_deref(),
            _ => None,
        }
    }

    /// Set a managed variable; unknown names are ignored
    pub fn set(&mut self, name: &str, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        match name {
            AUTH_TOKEN => self.auth_token = value,
            BASE_URL => self.base_url = value,
            MODEL => self.model = value,
            _ => {}
        }
    }

    /// Token and base URL are both present
    pub fn is_complete(&self) -> bool {
        self.auth_token.is_some() && self.base_url.is_some()
    }
}

impl From<&EnvVars> for EnvSnapshot {
    fn from(env: &EnvVars) -> Self {
        let mut snapshot = Self::default();
        for (name, value) in env.pairs() {
            snapshot.set(name, Some(value.to_string()));
        }
        snapshot
    }
}

/// `export` lines without the marker, suitable for `eval`
pub fn export_lines(env: &EnvVars) -> String {
    env.pairs()
        .into_iter()
        .map(|(name, value)| format!("export {}=\"{}\"", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Marker line followed by the export lines
pub fn render_block(env: &EnvVars) -> String {
    let exports = export_lines(env);
    if exports.is_empty() {
        MARKER.to_string()
    } else {
        format!("{}\n{}", MARKER, exports)
    }
}

fn is_marker(trimmed: &str) -> bool {
    trimmed.starts_with(MARKER)
}

fn is_managed_export(trimmed: &str) -> bool {
    trimmed.starts_with(EXPORT_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InBlock,
}

/// Remove every managed block, passing all other lines through unchanged.
///
/// Inside a block, marker lines, managed exports and blank lines are dropped;
/// the first other line ends the block and is kept.
pub fn strip_block(text: &str) -> String {
    let mut state = ScanState::Outside;
    let mut kept = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();
        state = match state {
            ScanState::Outside if is_marker(trimmed) => ScanState::InBlock,
            ScanState::Outside => {
                kept.push(line);
                ScanState::Outside
            }
            ScanState::InBlock
                if is_marker(trimmed) || is_managed_export(trimmed) || trimmed.is_empty() =>
            {
                ScanState::InBlock
            }
            ScanState::InBlock => {
                kept.push(line);
                ScanState::Outside
            }
        };
    }

    kept.join("\n")
}

/// Replace any existing block with a fresh one appended at the end
pub fn upsert_block(text: &str, env: &EnvVars) -> String {
    format!("{}\n{}\n", strip_block(text), render_block(env))
}

/// Collect `export ANTHROPIC_*=...` assignments from rc text; later lines win
pub fn read_exports(text: &str) -> EnvSnapshot {
    let mut snapshot = EnvSnapshot::default();
    for line in text.lines() {
        if let Some((name, value)) = parse_export(line) {
            snapshot.set(name, Some(value));
        }
    }
    snapshot
}

fn parse_export(line: &str) -> Option<(&'static str, String)> {
    let rest = line.strip_prefix("export")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, rest) = rest.trim_start().split_once('=')?;
    let name = VAR_NAMES.into_iter().find(|n| *n == name.trim_end())?;

    let value = rest.trim_start();
    let value = value.strip_prefix(['"', '\'']).unwrap_or(value);
    let value: String = value.chars().take_while(|c| *c != '"' && *c != '\'').collect();
    let value = value.trim_end().to_string();

    (!value.is_empty()).then_some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(token: &str, url: &str, model: Option<&str>) -> EnvVars {
        EnvVars {
            auth_token: token.to_string(),
            base_url: url.to_string(),
            model: model.map(str::to_string),
        }
    }

    #[test]
    fn test_from_profile_omits_empty_model() {
        let mut profile = ProviderProfile::new("X", "tok", "https://x", "m1");
        assert_eq!(
            EnvVars::from_profile(&profile),
            env("tok", "https://x", Some("m1"))
        );

        profile.model = String::new();
        let vars = EnvVars::from_profile(&profile);
        assert_eq!(vars.model, None);
        assert_eq!(vars.pairs().len(), 2);
    }

    #[test]
    fn test_from_profile_drops_headers() {
        let mut profile = ProviderProfile::new("X", "tok", "https://x", "m1");
        profile.headers.insert("X-Org".into(), "acme".into());
        let block = render_block(&EnvVars::from_profile(&profile));
        assert!(!block.contains("acme"));
    }

    #[test]
    fn test_render_block_exact() {
        let block = render_block(&env("tok", "https://x", Some("m")));
        assert_eq!(
            block,
            "# CCX - Claude Code API Provider Configuration\n\
             export ANTHROPIC_AUTH_TOKEN=\"tok\"\n\
             export ANTHROPIC_BASE_URL=\"https://x\"\n\
             export ANTHROPIC_MODEL=\"m\""
        );
    }

    #[test]
    fn test_render_block_does_not_escape_quotes() {
        let block = render_block(&env("a\"b", "https://x", None));
        assert!(block.contains("export ANTHROPIC_AUTH_TOKEN=\"a\"b\""));
    }

    #[test]
    fn test_strip_restores_original() {
        let vars = env("tok", "https://x", Some("m"));
        for original in ["", "export PATH=/usr/bin", "a\nb\n", "alias ll='ls -l'\n\n# end\n"] {
            let inserted = format!("{}\n{}\n", original, render_block(&vars));
            assert_eq!(strip_block(&inserted), original, "original: {:?}", original);
        }
    }

    #[test]
    fn test_strip_keeps_line_after_block() {
        let text = "before\n# CCX - Claude Code API Provider Configuration\n\
                    export ANTHROPIC_AUTH_TOKEN=\"t\"\n\n\
                    export ANTHROPIC_BASE_URL=\"u\"\n\
                    alias g=git\nafter";
        assert_eq!(strip_block(text), "before\nalias g=git\nafter");
    }

    #[test]
    fn test_strip_indented_exports() {
        let text = "# CCX - Claude Code API Provider Configuration\n  export ANTHROPIC_MODEL=\"m\"\nx";
        assert_eq!(strip_block(text), "x");
    }

    #[test]
    fn test_strip_leaves_unmarked_exports() {
        let text = "export ANTHROPIC_AUTH_TOKEN=\"mine\"\n";
        assert_eq!(strip_block(text), text);
    }

    #[test]
    fn test_strip_removes_duplicate_blocks() {
        let block = render_block(&env("old", "https://old", None));
        let text = format!("{}\n{}\nkeep\n{}\n", block, block, block);
        let stripped = strip_block(&text);
        assert_eq!(stripped, "keep");
        assert!(!stripped.contains("old"));
    }

    #[test]
    fn test_upsert_appends_single_block() {
        let vars = env("tok1", "https://x", None);
        let result = upsert_block("export PATH=/usr/bin\n", &vars);

        assert!(result.starts_with("export PATH=/usr/bin\n"));
        assert_eq!(result.matches(MARKER).count(), 1);
        assert!(result.contains("export ANTHROPIC_AUTH_TOKEN=\"tok1\""));
        assert!(result.contains("export ANTHROPIC_BASE_URL=\"https://x\""));
        assert!(!result.contains(MODEL));
        assert!(result.ends_with("\"https://x\"\n"));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let vars = env("tok", "https://x", Some("m"));
        for original in ["", "export PATH=/usr/bin", "a\n\n\nb\n"] {
            let once = upsert_block(original, &vars);
            let twice = upsert_block(&once, &vars);
            let thrice = upsert_block(&twice, &vars);
            assert_eq!(twice, once);
            assert_eq!(thrice, twice);
        }
    }

    #[test]
    fn test_upsert_replaces_previous_values() {
        let first = upsert_block("# my rc\n", &env("tok-x", "https://x", Some("mx")));
        let second = upsert_block(&first, &env("tok-y", "https://y", None));

        assert_eq!(second.matches(MARKER).count(), 1);
        assert!(!second.contains("tok-x"));
        assert!(!second.contains("https://x"));
        assert!(!second.contains("mx"));
        assert!(second.contains("tok-y"));
        assert!(second.starts_with("# my rc\n"));
    }

    #[test]
    fn test_upsert_moves_block_to_end() {
        let text = format!(
            "{}\nexport EDITOR=vim\n",
            render_block(&env("t", "u", None))
        );
        let result = upsert_block(&text, &env("t2", "u2", None));
        assert!(result.starts_with("export EDITOR=vim\n"));
        assert!(result.trim_end().ends_with("export ANTHROPIC_BASE_URL=\"u2\""));
    }

    #[test]
    fn test_read_exports() {
        let text = "export PATH=/bin\n\
                    export ANTHROPIC_AUTH_TOKEN=\"first\"\n\
                    export ANTHROPIC_BASE_URL='https://single'\n\
                    export  ANTHROPIC_MODEL = bare\n\
                    export ANTHROPIC_AUTH_TOKEN=\"second\"\n\
                    exportANTHROPIC_MODEL=\"nope\"\n";
        let snapshot = read_exports(text);
        assert_eq!(snapshot.auth_token.as_deref(), Some("second"));
        assert_eq!(snapshot.base_url.as_deref(), Some("https://single"));
        assert_eq!(snapshot.model.as_deref(), Some("bare"));
        assert!(snapshot.is_complete());
    }

    #[test]
    fn test_read_exports_ignores_other_prefixes() {
        let snapshot = read_exports("export ANTHROPIC_API_KEY=\"k\"\n# export ANTHROPIC_MODEL=\"m\"");
        assert_eq!(snapshot, EnvSnapshot::default());
    }

    #[test]
    fn test_export_lines() {
        assert_eq!(
            export_lines(&env("t", "u", None)),
            "export ANTHROPIC_AUTH_TOKEN=\"t\"\nexport ANTHROPIC_BASE_URL=\"u\""
        );
    }
}
