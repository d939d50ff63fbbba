//! Import of MCP server definitions from other tools.
//!
//! Each supported tool keeps an `mcpServers` map in a JSON file under the
//! home directory. Servers are copied into the store's `mcp` map under
//! `<tool>_<server>` so entries from different tools never collide.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A tool whose MCP config we know how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McpSource {
    pub tool: &'static str,
    /// Relative to home
    pub config_path: &'static str,
}

pub const MCP_SOURCES: &[McpSource] = &[
    McpSource {
        tool: "Cursor",
        config_path: ".cursor/mcp.json",
    },
    McpSource {
        tool: "VS Code",
        config_path: ".vscode/mcp.json",
    },
    McpSource {
        tool: "Windsurf",
        config_path: ".windsurf/mcp.json",
    },
    McpSource {
        tool: "Cline",
        config_path: ".cline/mcp.json",
    },
    McpSource {
        tool: "Claude Desktop",
        config_path: "Claude/claude_desktop_config.json",
    },
];

/// One server entry as stored in the `mcp` map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    /// Absent for URL-based servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl McpServer {
    /// Pick the known fields out of a raw entry, ignoring ones of the wrong type.
    ///
    /// Returns `None` when the entry is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let text = |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_string);

        let args = entry
            .get("args")
            .and_then(Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let env = entry
            .get("env")
            .and_then(Value::as_object)
            .map(|env| {
                env.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            command: text("command"),
            args,
            env,
            disabled: entry.get("disabled").and_then(Value::as_bool).unwrap_or(false),
            url: text("url"),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ToolConfig {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: Map<String, Value>,
}

/// A source found on disk with at least one server
#[derive(Debug, Clone)]
pub struct DetectedConfig {
    pub source: McpSource,
    pub path: PathBuf,
    pub servers: BTreeMap<String, McpServer>,
}

impl DetectedConfig {
    /// Key under which a server is stored, e.g. `vs code_filesystem`
    pub fn entry_name(&self, server: &str) -> String {
        format!("{}_{}", self.source.tool.to_lowercase(), server)
    }
}

/// Every known source under `home` that parses and lists servers
pub fn detect(home: &Path) -> Vec<DetectedConfig> {
    MCP_SOURCES
        .iter()
        .filter_map(|source| {
            let path = home.join(source.config_path);
            if !path.is_file() {
                return None;
            }
            let config = match read_tool_config(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(tool = source.tool, error = %format!("{:#}", e), "could not read MCP config");
                    return None;
                }
            };
            let servers = parse_servers(source, &config.mcp_servers);
            if servers.is_empty() {
                return None;
            }
            Some(DetectedConfig {
                source: *source,
                path,
                servers,
            })
        })
        .collect()
}

fn parse_servers(source: &McpSource, raw: &Map<String, Value>) -> BTreeMap<String, McpServer> {
    raw.iter()
        .filter_map(|(name, value)| match McpServer::from_value(value) {
            Some(server) => Some((name.clone(), server)),
            None => {
                warn!(tool = source.tool, server = %name, "skipping MCP server that is not an object");
                None
            }
        })
        .collect()
}

fn read_tool_config(path: &Path) -> Result<ToolConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Merge a detected config into `mcp`, returning the entry names written
pub fn merge(mcp: &mut Map<String, Value>, detected: &DetectedConfig) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(detected.servers.len());
    for (name, server) in &detected.servers {
        let entry = detected.entry_name(name);
        let value = serde_json::to_value(server).context("Failed to serialize MCP server")?;
        mcp.insert(entry.clone(), value);
        written.push(entry);
    }
    Ok(written)
}

/// Write the previous `mcp` map next to the store before it is replaced
pub fn write_backup(path: &Path, mcp: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(mcp).context("Failed to serialize MCP backup")?;
    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write MCP backup: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(home: &Path, relative: &str, content: &str) {
        let path = home.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_detect_finds_populated_sources() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path();
        write(
            home,
            ".cursor/mcp.json",
            r#"{"mcpServers":{"fs":{"command":"npx","args":["-y","server-fs"]}}}"#,
        );
        write(home, ".vscode/mcp.json", r#"{"mcpServers":{}}"#);
        write(home, ".windsurf/mcp.json", "not json");

        let detected = detect(home);
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].source.tool, "Cursor");
        assert_eq!(detected[0].servers["fs"].args, vec!["-y", "server-fs"]);
    }

    #[test]
    fn test_detect_keeps_servers_of_every_kind() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path();
        write(
            home,
            ".cursor/mcp.json",
            r#"{"mcpServers":{
                "fs":{"command":"npx","args":["-y","server-fs"]},
                "remote":{"url":"https://mcp.example.com/sse"},
                "odd":{"command":"run","args":[1,"two"],"env":{"A":"x","B":2}},
                "broken":"not an object"
            }}"#,
        );

        let detected = detect(home);
        assert_eq!(detected.len(), 1);
        let servers = &detected[0].servers;
        assert_eq!(servers.len(), 3);
        assert_eq!(servers["fs"].command.as_deref(), Some("npx"));
        assert_eq!(servers["remote"].command, None);
        assert_eq!(servers["remote"].url.as_deref(), Some("https://mcp.example.com/sse"));
        assert_eq!(servers["odd"].args, vec!["two"]);
        assert_eq!(servers["odd"].env.len(), 1);

        let mut mcp = Map::new();
        let written = merge(&mut mcp, &detected[0]).unwrap();
        assert_eq!(written, vec!["cursor_fs", "cursor_odd", "cursor_remote"]);
        assert_eq!(mcp["cursor_remote"]["args"], Value::Array(vec![]));
        assert_eq!(mcp["cursor_remote"]["disabled"], false);
        assert!(mcp["cursor_remote"].get("command").is_none());
    }

    #[test]
    fn test_merge_prefixes_and_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path();
        write(
            home,
            "Claude/claude_desktop_config.json",
            r#"{"mcpServers":{"git":{"command":"uvx","env":{"TOKEN":"x"}}},"other":1}"#,
        );

        let detected = detect(home);
        let mut mcp = Map::new();
        mcp.insert("existing".into(), Value::Bool(true));

        let written = merge(&mut mcp, &detected[0]).unwrap();
        assert_eq!(written, vec!["claude desktop_git"]);
        assert_eq!(mcp["existing"], Value::Bool(true));

        let entry = &mcp["claude desktop_git"];
        assert_eq!(entry["command"], "uvx");
        assert_eq!(entry["args"], Value::Array(vec![]));
        assert_eq!(entry["env"]["TOKEN"], "x");
        assert_eq!(entry["disabled"], false);
    }

    #[test]
    fn test_write_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".claude/mcp_backup_1.json");
        let mut mcp = Map::new();
        mcp.insert("a".into(), Value::from(1));

        write_backup(&path, &mcp).unwrap();
        let restored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored["a"], 1);
    }
}
