//! Handlers for each CLI subcommand.
//!
//! This is the coordination layer: it loads the [`ProviderStore`], prompts the
//! user, calls into the synchronizer and prober, and prints results through
//! [`Ui`]. Each public function corresponds to a subcommand in `main.rs`.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use inquire::{Confirm, MultiSelect, Password, PasswordDisplayMode, Select, Text, required};
use std::collections::BTreeMap;
use std::process::Command;

use crate::env_block::{self, EnvSnapshot, EnvVars};
use crate::error::StoreError;
use crate::migrate;
use crate::paths::Paths;
use crate::probe::{self, ProbeOutcome, Prober};
use crate::shell::ShellLocator;
use crate::store::{CurrentStatus, ProviderProfile, ProviderStore, Seed, normalize_key};
use crate::sync::{EnvSynchronizer, SessionEnv, SyncReport, TargetStatus};
use crate::ui::{Ui, mask_secret};

/// Per-run state shared by all handlers
pub struct App {
    pub paths: Paths,
    pub ui: Ui,
    pub seed: Seed,
    /// The managed variables as this process sees them
    pub session: SessionEnv,
}

impl App {
    pub fn new(paths: Paths, ui: Ui, seed: Seed) -> Self {
        Self {
            paths,
            ui,
            seed,
            session: SessionEnv::capture(),
        }
    }

    /// Load the store, telling the user if a broken file was replaced by defaults
    fn load_store(&self) -> ProviderStore {
        let store = ProviderStore::load(&self.paths.providers_file, self.seed);
        if let Some(reason) = store.recovered_from() {
            self.ui.warn(format!(
                "Could not load {} ({}); using defaults.",
                store.path().display(),
                reason
            ));
        }
        store
    }

    fn synchronizer(&self) -> EnvSynchronizer {
        EnvSynchronizer::new(ShellLocator::from_paths(&self.paths))
    }

    /// Look up a provider, listing the alternatives when it is missing
    fn require_provider<'s>(
        &self,
        store: &'s ProviderStore,
        key: &str,
    ) -> Result<&'s ProviderProfile> {
        if let Some(profile) = store.get(key) {
            return Ok(profile);
        }
        self.print_available(store);
        Err(StoreError::NotFound { key: key.to_string() }.into())
    }

    fn print_available(&self, store: &ProviderStore) {
        if store.is_empty() {
            self.ui.info("No providers configured. Use 'ccx add <provider>' to add one.");
            return;
        }
        self.ui.println("Available providers:");
        for key in store.keys() {
            self.ui.println(format!("  - {}", key));
        }
    }
}

// -----------------------------------------------------------------------------
// list / current
// -----------------------------------------------------------------------------

/// List all configured providers
pub fn list(app: &App) -> Result<()> {
    let ui = &app.ui;
    let store = app.load_store();

    if store.is_empty() {
        ui.warn("No API providers configured.");
        ui.println(format!("Add one with:  {} add <provider>", ui.bold("ccx")));
        return Ok(());
    }

    let current = store.config().current.as_str();
    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Provider"),
        ui.header_cell("Name"),
        ui.header_cell("Model"),
        ui.header_cell("Base URL"),
        ui.header_cell("API Key"),
    ]);

    for (key, profile) in &store.config().providers {
        let is_current = key == current;
        let marker = if is_current {
            ui.colored_cell(ui.icon_ok(), AnsiColor::Green)
        } else {
            ui.cell("")
        };
        let key_cell = if !profile.is_valid() {
            ui.colored_cell(format!("{} (incomplete)", key), AnsiColor::Yellow)
        } else if is_current {
            ui.colored_cell(key, AnsiColor::Green)
        } else {
            ui.cell(key)
        };
        table.add_row(vec![
            marker,
            key_cell,
            ui.cell(&profile.name),
            ui.cell(&profile.model),
            ui.cell(&profile.base_url),
            ui.cell(mask_secret(&profile.api_key)),
        ]);
    }

    ui.section("Available API Providers");
    ui.println(table.to_string());
    ui.newline();

    let mut summary = vec![("Total providers", store.config().providers.len().to_string())];
    if !current.is_empty() {
        summary.push(("Current provider", current.to_string()));
    }
    ui.println(ui.key_values(summary).to_string());
    Ok(())
}

/// Show the selected provider and the environment status
pub fn current(app: &App) -> Result<()> {
    let ui = &app.ui;
    let store = app.load_store();

    ui.section("CCX Configuration Status");
    ui.newline();

    match store.current_status() {
        CurrentStatus::Active { key, profile } => {
            ui.println(ui.colored(format!("{} Current provider", ui.icon_ok()), AnsiColor::Green));
            ui.println(profile_details(ui, key, profile).to_string());
        }
        CurrentStatus::Dangling { key } => {
            ui.err(format!(
                "Configured provider '{}' not found in {}.",
                key,
                store.path().display()
            ));
            ui.info("Use 'ccx use <provider>' to select a valid provider.");
        }
        CurrentStatus::Unset => {
            ui.warn("No provider currently configured.");
            ui.info("Use 'ccx use <provider>' to select a provider.");
        }
    }
    ui.newline();

    let sync = app.synchronizer();
    let locator = sync.locator();
    let files: Vec<String> = sync
        .planned_targets()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    ui.println(
        ui.key_values([
            ("Shell", locator.family().name().to_string()),
            ("Config files", files.join(", ")),
        ])
        .to_string(),
    );
    ui.newline();

    show_env_status(ui, &sync.configured_env(), app.session.vars());

    if !store.is_empty() {
        ui.newline();
        ui.section("Available Providers");
        let current = store.config().current.as_str();
        for key in store.keys() {
            let badge = if key == current {
                ui.colored(" ACTIVE", AnsiColor::Green)
            } else {
                String::new()
            };
            ui.println(format!("  ○ {}{}", ui.bold(key), badge));
        }
    }

    Ok(())
}

fn profile_details(ui: &Ui, key: &str, profile: &ProviderProfile) -> comfy_table::Table {
    let mut rows = vec![
        ("Provider", key.to_string()),
        ("Name", profile.name.clone()),
        ("Model", profile.model.clone()),
        ("Base URL", profile.base_url.clone()),
        ("API Key", mask_secret(&profile.api_key)),
    ];
    if !profile.headers.is_empty() {
        let names: Vec<&str> = profile.headers.keys().map(String::as_str).collect();
        rows.push(("Custom Headers", names.join(", ")));
    }
    ui.key_values(rows)
}

/// Compare what shell rc files configure with what this process sees
fn show_env_status(ui: &Ui, configured: &EnvSnapshot, active: &EnvSnapshot) {
    ui.section("Environment Variables");

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell("Variable"),
        ui.header_cell("Configured (shell files)"),
        ui.header_cell("Active (this session)"),
    ]);
    for name in env_block::VAR_NAMES {
        let display = |snapshot: &EnvSnapshot| match snapshot.get(name) {
            Some(value) if name == env_block::AUTH_TOKEN => mask_secret(value),
            Some(value) => value.to_string(),
            None => "Not set".to_string(),
        };
        table.add_row(vec![
            ui.cell(name),
            ui.cell(display(configured)),
            ui.cell(display(active)),
        ]);
    }
    ui.println(table.to_string());

    let is_configured = configured.is_complete();
    let is_active = active.is_complete();
    let synced = configured == active;
    let mark = |ok: bool| if ok { ui.icon_ok() } else { ui.icon_err() };
    ui.println(
        ui.key_values([
            ("Configured", mark(is_configured).to_string()),
            ("Active", mark(is_active).to_string()),
            ("Synced", mark(synced).to_string()),
        ])
        .to_string(),
    );

    if !is_configured {
        ui.warn("Environment variables are not configured in any shell file.");
    } else if !is_active {
        ui.warn("Environment variables are configured but not active in this session.");
        ui.info("Restart your terminal, or run: eval \"$(ccx env --export)\"");
    } else if !synced {
        ui.warn("Configured and active values differ. Restart your terminal to pick up the change.");
    } else {
        ui.ok("Environment variables are configured and active.");
    }
}

// -----------------------------------------------------------------------------
// use
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct UseOptions {
    pub skip_test: bool,
    /// Print only `export` lines on stdout, for `eval "$(ccx use <p> --eval)"`
    pub eval: bool,
    /// Answer prompts with their non-interactive choice
    pub yes: bool,
}

/// Switch to a provider: write shell config files and mark it current
pub fn use_provider(app: &mut App, name: &str, opts: UseOptions) -> Result<()> {
    let key = normalize_key(name);
    if opts.eval {
        app.ui.set_messages_to_stderr(true);
    }
    let mut store = app.load_store();
    let profile = app.require_provider(&store, &key)?.clone();

    if !profile.is_valid() {
        app.ui.info(format!("Use 'ccx add {}' to complete the configuration.", key));
    }
    profile.validate()?;

    // --eval keeps stdout clean for the shell, so the interactive probe is skipped
    let run_probe = !opts.skip_test && !opts.eval;
    if run_probe {
        let outcome = run_probe_with_spinner(&app.ui, &profile, &key)?;
        if !outcome.success() {
            show_probe_result(&app.ui, &outcome);
            if opts.yes {
                app.ui.warn("Connection test failed, proceeding anyway (--yes).");
            } else {
                let proceed = Confirm::new("Connection test failed. Proceed anyway?")
                    .with_default(false)
                    .prompt()
                    .context("Confirmation cancelled")?;
                if !proceed {
                    app.ui.info("Switch cancelled.");
                    return Ok(());
                }
            }
        }
    }

    let env = EnvVars::from_profile(&profile);
    let sync = app.synchronizer();
    let report = sync.apply(&env, &mut app.session);

    if opts.eval {
        for failed in report.failed() {
            if let TargetStatus::Failed(e) = &failed.status {
                app.ui.err(format!("{}: {:#}", failed.path.display(), e));
            }
        }
    } else {
        show_sync_report(&app.ui, &report);
    }
    if report.all_failed() {
        bail!("Failed to update any shell configuration file");
    }

    store.set_current(&key)?;

    if opts.eval {
        app.ui.stdout(env_block::export_lines(&env));
        return Ok(());
    }

    let ui = &app.ui;
    ui.newline();
    ui.ok(format!("Switched to {}", ui.bold(&key)));
    ui.println(profile_details(ui, &key, &profile).to_string());
    ui.newline();
    ui.info("New shells pick this up automatically. For this one, run: eval \"$(ccx env --export)\"");
    ui.newline();
    show_env_status(ui, &sync.configured_env(), app.session.vars());

    if run_probe {
        ui.newline();
        let outcome = run_probe_with_spinner(ui, &profile, &key)?;
        if outcome.success() {
            ui.ok("New configuration is working.");
        } else {
            ui.err("New configuration test failed. Please check your setup.");
            show_probe_result(ui, &outcome);
        }
    } else if !opts.yes {
        ui.newline();
        ui.println(format!("To test the new configuration, run:  {}", ui.bold("ccx test")));
    }

    Ok(())
}

fn show_sync_report(ui: &Ui, report: &SyncReport) {
    for target in &report.targets {
        let path = target.path.display();
        match &target.status {
            TargetStatus::Updated => ui.ok(format!("Updated {}", path)),
            TargetStatus::Created => ui.ok(format!("Created {}", path)),
            TargetStatus::Failed(e) => ui.err(format!("Could not update {}: {:#}", path, e)),
        }
        if let Some(backup) = &target.backup {
            ui.println(ui.dim(format!("   backup: {}", backup.display())));
        }
    }
}

// -----------------------------------------------------------------------------
// add
// -----------------------------------------------------------------------------

/// Field values given on the command line; anything missing is prompted for
#[derive(Debug, Default, Clone)]
pub struct AddArgs {
    pub display_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// `Name=Value` or `Name: Value`
    pub headers: Vec<String>,
    pub skip_test: bool,
    pub yes: bool,
}

/// Add or overwrite a provider
pub fn add(app: &App, name: &str, args: AddArgs) -> Result<()> {
    let ui = &app.ui;
    let key = normalize_key(name);
    if key.is_empty() {
        bail!("Provider name cannot be empty");
    }
    let mut store = app.load_store();

    if store.contains(&key) && !args.yes {
        ui.warn(format!("Provider '{}' already exists.", key));
        let overwrite = Confirm::new("Do you want to overwrite it?")
            .with_default(false)
            .prompt()
            .context("Confirmation cancelled")?;
        if !overwrite {
            ui.info("Add cancelled.");
            return Ok(());
        }
    }

    let profile = collect_profile(&key, &args)?;
    profile.validate()?;

    if !args.skip_test {
        let outcome = run_probe_with_spinner(ui, &profile, &profile.name)?;
        show_probe_result(ui, &outcome);
        if !outcome.success() && !args.yes {
            let save_anyway = Confirm::new("Connection test failed. Save anyway?")
                .with_default(false)
                .prompt()
                .context("Confirmation cancelled")?;
            if !save_anyway {
                ui.info("Add cancelled.");
                return Ok(());
            }
        }
    }

    let was_unset = store.config().current.is_empty();
    store.add_profile(&key, profile)?;
    ui.ok(format!("Provider '{}' added.", key));

    if was_unset {
        ui.println(format!("  {} Set as current provider.", ui.icon_ok()));
    } else if store.config().current != key && !args.yes {
        let switch_now = Confirm::new("Switch to this provider now?")
            .with_default(true)
            .prompt()
            .context("Confirmation cancelled")?;
        if switch_now {
            store.set_current(&key)?;
            ui.ok(format!("Current provider is now '{}'.", key));
        }
    }

    ui.newline();
    ui.println(format!(
        "To write it to your shell config, run:  {} use {}",
        ui.bold("ccx"),
        key
    ));
    Ok(())
}

fn collect_profile(key: &str, args: &AddArgs) -> Result<ProviderProfile> {
    let display_name = match &args.display_name {
        Some(v) => v.clone(),
        None => Text::new("Display name:")
            .with_default(key)
            .with_validator(required!("Display name is required"))
            .prompt()
            .context("Prompt cancelled")?,
    };
    let api_key = match &args.api_key {
        Some(v) => v.clone(),
        None => Password::new("API Key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .with_validator(required!("API key is required"))
            .prompt()
            .context("Prompt cancelled")?,
    };
    let base_url = match &args.base_url {
        Some(v) => v.clone(),
        None => Text::new("Base URL:")
            .with_validator(required!("Base URL is required"))
            .prompt()
            .context("Prompt cancelled")?,
    };
    let model = match &args.model {
        Some(v) => v.clone(),
        None => Text::new("Model:")
            .with_validator(required!("Model is required"))
            .prompt()
            .context("Prompt cancelled")?,
    };

    let headers = if !args.headers.is_empty() {
        args.headers
            .iter()
            .map(|h| parse_header_arg(h))
            .collect::<Result<BTreeMap<_, _>>>()?
    } else if args.display_name.is_none() || args.api_key.is_none() {
        // Interactive session: offer the optional headers prompt too
        let raw = Text::new("Custom headers (JSON object, optional):")
            .prompt()
            .context("Prompt cancelled")?;
        parse_headers_json(&raw).unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    Ok(ProviderProfile {
        name: display_name.trim().to_string(),
        api_key: api_key.trim().to_string(),
        base_url: base_url.trim().to_string(),
        model: model.trim().to_string(),
        headers,
    })
}

/// Parse `Name=Value` or `Name: Value`
pub fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .or_else(|| raw.split_once(':'))
        .with_context(|| format!("Invalid header '{}'. Expected NAME=VALUE", raw))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header '{}': empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a JSON object of string headers; blank or invalid input yields `None`
pub fn parse_headers_json(raw: &str) -> Option<BTreeMap<String, String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}

// -----------------------------------------------------------------------------
// remove
// -----------------------------------------------------------------------------

/// Remove a provider
pub fn remove(app: &App, name: &str, force: bool) -> Result<()> {
    let ui = &app.ui;
    let key = normalize_key(name);
    let mut store = app.load_store();
    let profile = app.require_provider(&store, &key)?.clone();

    ui.section("Provider to Remove");
    ui.println(profile_details(ui, &key, &profile).to_string());

    if !force {
        let confirm = Confirm::new(&format!("Are you sure you want to remove '{}'?", key))
            .with_default(false)
            .prompt()
            .context("Confirmation cancelled")?;
        if !confirm {
            ui.info("Remove cancelled.");
            return Ok(());
        }
    }

    let was_current = store.config().current == key;
    store.remove_profile(&key)?;
    ui.ok(format!("Provider '{}' removed.", key));

    if !was_current {
        return Ok(());
    }

    if store.is_empty() {
        ui.info("No providers remaining.");
        return Ok(());
    }

    if !force {
        let remaining: Vec<String> = store.keys().map(str::to_string).collect();
        let switch = Confirm::new("This was your current provider. Switch to another one?")
            .with_default(true)
            .prompt()
            .context("Confirmation cancelled")?;
        if switch {
            let choice = Select::new("Select new provider:", remaining)
                .prompt()
                .context("Selection cancelled")?;
            store.set_current(&choice)?;
        } else {
            store.clear_current()?;
            ui.info("No current provider selected.");
            return Ok(());
        }
    }

    ui.ok(format!(
        "Current provider is now '{}'. Run 'ccx use {}' to update your shell config.",
        store.config().current,
        store.config().current
    ));
    Ok(())
}

// -----------------------------------------------------------------------------
// test
// -----------------------------------------------------------------------------

/// Test connectivity of a provider, the current one, or the session variables
pub fn test(app: &App, name: Option<&str>, from_env: bool) -> Result<()> {
    let ui = &app.ui;

    let (label, profile) = if from_env {
        let profile = probe::profile_from_env(app.session.vars()).with_context(|| {
            format!(
                "{} and {} must be set to test the current environment",
                env_block::AUTH_TOKEN,
                env_block::BASE_URL
            )
        })?;
        ("current environment".to_string(), profile)
    } else {
        let store = app.load_store();
        let key = match name {
            Some(name) => normalize_key(name),
            None => match store.current_status() {
                CurrentStatus::Active { key, .. } => key.to_string(),
                CurrentStatus::Dangling { key } => key.to_string(),
                CurrentStatus::Unset => {
                    bail!("No current provider set.\nHint: Use 'ccx use <provider>' to set one first.")
                }
            },
        };
        let profile = app.require_provider(&store, &key)?.clone();
        (key, profile)
    };

    let outcome = run_probe_with_spinner(ui, &profile, &label)?;
    show_probe_result(ui, &outcome);
    Ok(())
}

fn run_probe_with_spinner(ui: &Ui, profile: &ProviderProfile, label: &str) -> Result<ProbeOutcome> {
    let prober = Prober::new()?;
    let spinner = ui.spinner(format!("Testing connection to {}...", label));
    let outcome = prober.probe(profile);
    let message = if outcome.success() {
        format!("Connection to {} successful", label)
    } else {
        format!("Connection to {} failed", label)
    };
    ui.spinner_finish(&spinner, outcome.success(), message);
    Ok(outcome)
}

fn show_probe_result(ui: &Ui, outcome: &ProbeOutcome) {
    ui.println(ui.dim(format!("   Response time: {}ms", outcome.elapsed_ms)));
    if let Some(failure) = &outcome.failure {
        ui.println(ui.colored(format!("   Error: {}", failure), AnsiColor::Yellow));
    }
}

// -----------------------------------------------------------------------------
// env / config
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvOptions {
    pub export: bool,
    pub show: bool,
}

/// Show or export the current provider's variables
pub fn env(app: &App, opts: EnvOptions) -> Result<()> {
    let ui = &app.ui;
    let store = app.load_store();
    let vars = match store.current_status() {
        CurrentStatus::Active { profile, .. } => Some(EnvVars::from_profile(profile)),
        _ => None,
    };
    let snapshot = vars.as_ref().map(EnvSnapshot::from).unwrap_or_default();

    if opts.export {
        if let Some(vars) = &vars {
            ui.stdout(env_block::export_lines(vars));
        }
        return Ok(());
    }

    if opts.show {
        ui.section("Current provider environment variables");
        let rows = env_block::VAR_NAMES.into_iter().map(|name| {
            let value = match snapshot.get(name) {
                Some(v) if name == env_block::AUTH_TOKEN => mask_secret(v),
                Some(v) => v.to_string(),
                None => "Not set".to_string(),
            };
            (name, value)
        });
        ui.println(ui.key_values(rows).to_string());
        return Ok(());
    }

    ui.section("Environment Variables Status");
    for name in env_block::VAR_NAMES {
        match snapshot.get(name) {
            Some(v) => {
                let shown = if name == env_block::AUTH_TOKEN {
                    mask_secret(v)
                } else {
                    v.to_string()
                };
                ui.println(format!("  {} {}: {}", ui.icon_ok(), name, shown));
            }
            None if name == env_block::MODEL => {
                ui.println(format!("  {} {}: Not set (using default)", ui.icon_warn(), name));
            }
            None => ui.println(format!("  {} {}: Not set", ui.icon_err(), name)),
        }
    }
    ui.newline();
    ui.section("Usage");
    ui.println("  ccx env --show              Show the current provider's variables");
    ui.println("  ccx env --export            Print export lines for shell eval");
    ui.println("  eval \"$(ccx env --export)\"  Apply them to this shell");
    Ok(())
}

/// Open the providers file in `$EDITOR`
pub fn config(app: &App) -> Result<()> {
    let ui = &app.ui;
    let store = app.load_store();
    if !store.path().exists() {
        store.save()?;
    }

    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "nano".to_string());
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("nano");

    ui.info(format!("Opening {} with {}...", store.path().display(), editor));
    let status = Command::new(program).args(parts).arg(store.path()).status();

    match status {
        Ok(status) if status.success() => {
            ui.ok("Configuration file updated.");
        }
        _ => {
            ui.warn("Could not open editor. Configuration file location:");
            ui.println(format!("  {}", store.path().display()));
            ui.info("You can edit it manually with your preferred editor.");
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// migrate
// -----------------------------------------------------------------------------

/// Import MCP server definitions from other tools
pub fn migrate(app: &App, yes: bool) -> Result<()> {
    let ui = &app.ui;
    ui.section("MCP Configuration Migration");
    ui.newline();

    let detected = migrate::detect(&app.paths.home);
    if detected.is_empty() {
        ui.warn("No MCP configurations found in supported tools.");
        ui.println("Searched locations:");
        for source in migrate::MCP_SOURCES {
            ui.println(ui.dim(format!("  - {}", app.paths.in_home(source.config_path).display())));
        }
        return Ok(());
    }

    let selected: Vec<&migrate::DetectedConfig> = if yes {
        detected.iter().collect()
    } else {
        let options: Vec<String> = detected
            .iter()
            .map(|d| format!("{} ({} servers)", d.source.tool, d.servers.len()))
            .collect();
        let defaults: Vec<usize> = (0..options.len()).collect();
        let chosen = MultiSelect::new("Select MCP configurations to migrate:", options.clone())
            .with_default(&defaults)
            .prompt()
            .context("Selection cancelled")?;
        chosen
            .iter()
            .filter_map(|c| options.iter().position(|o| o == c))
            .map(|i| &detected[i])
            .collect()
    };

    if selected.is_empty() {
        ui.warn("No configurations selected for migration.");
        return Ok(());
    }

    let mut store = app.load_store();
    let previous = store.config().mcp.clone();
    let mut merged = previous.clone();
    let mut migrated = Vec::new();

    ui.section("Migration Summary");
    for config in &selected {
        ui.println(ui.colored(format!("  {}:", config.source.tool), AnsiColor::Green));
        for server in config.servers.keys() {
            ui.println(ui.dim(format!("    - {}", server)));
        }
        for entry in migrate::merge(&mut merged, config)? {
            migrated.push((config.source.tool, entry));
        }
    }
    ui.newline();

    if !yes {
        let confirm = Confirm::new(&format!("Migrate {} MCP server(s)?", migrated.len()))
            .with_default(true)
            .prompt()
            .context("Confirmation cancelled")?;
        if !confirm {
            ui.info("Migration cancelled.");
            return Ok(());
        }
    }

    let backup = app.paths.mcp_backup(Utc::now().timestamp_millis());
    migrate::write_backup(&backup, &previous)?;
    ui.info(format!("Backup created: {}", backup.display()));

    store.set_mcp(merged)?;
    ui.ok(format!("Migrated {} MCP server(s).", migrated.len()));
    for (tool, entry) in &migrated {
        ui.println(ui.dim(format!("  {} (from {})", entry, tool)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_paths;
    use crate::ui::ColorMode;
    use std::fs;
    use tempfile::TempDir;

    fn test_app(temp_dir: &TempDir) -> App {
        App {
            paths: setup_test_paths(temp_dir, "/bin/zsh"),
            ui: Ui::new(ColorMode::Never, true),
            seed: Seed::Empty,
            session: SessionEnv::default(),
        }
    }

    fn full_args(model: &str) -> AddArgs {
        AddArgs {
            display_name: Some("Example".into()),
            api_key: Some("sk-example-123".into()),
            base_url: Some("https://api.example.com".into()),
            model: Some(model.into()),
            headers: vec!["X-Team=infra".into()],
            skip_test: true,
            yes: true,
        }
    }

    #[test]
    fn test_parse_header_arg() {
        assert_eq!(
            parse_header_arg("X-Org=acme").unwrap(),
            ("X-Org".to_string(), "acme".to_string())
        );
        assert_eq!(
            parse_header_arg("X-Org: acme").unwrap(),
            ("X-Org".to_string(), "acme".to_string())
        );
        assert!(parse_header_arg("novalue").is_err());
        assert!(parse_header_arg("=x").is_err());
    }

    #[test]
    fn test_parse_headers_json() {
        let headers = parse_headers_json(r#"{"X-A":"1"}"#).unwrap();
        assert_eq!(headers["X-A"], "1");
        assert!(parse_headers_json("  ").is_none());
        assert!(parse_headers_json("{broken").is_none());
    }

    #[test]
    fn test_add_non_interactive() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        add(&app, "Example", full_args("m1")).unwrap();

        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        let profile = store.get("example").unwrap();
        assert_eq!(profile.model, "m1");
        assert_eq!(profile.headers["X-Team"], "infra");
        assert_eq!(store.config().current, "example");
    }

    #[test]
    fn test_add_incomplete_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        let err = add(&app, "foo", full_args("  ")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation { .. })
        ));
        assert!(!app.paths.providers_file.exists());
    }

    #[test]
    fn test_use_writes_shell_config_and_current() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = test_app(&temp_dir);
        fs::write(temp_dir.path().join(".zshrc"), "export PATH=/usr/bin\n").unwrap();

        add(&app, "one", full_args("m1")).unwrap();
        add(&app, "two", full_args("m2")).unwrap();

        let opts = UseOptions {
            skip_test: true,
            eval: false,
            yes: true,
        };
        use_provider(&mut app, "TWO", opts).unwrap();

        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        assert_eq!(store.config().current, "two");

        let rc = fs::read_to_string(temp_dir.path().join(".zshrc")).unwrap();
        assert!(rc.starts_with("export PATH=/usr/bin\n"));
        assert!(rc.contains("export ANTHROPIC_MODEL=\"m2\""));
        assert_eq!(app.session.vars().model.as_deref(), Some("m2"));
    }

    #[test]
    fn test_use_eval_writes_config_and_keeps_stdout_for_exports() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = test_app(&temp_dir);
        add(&app, "one", full_args("m1")).unwrap();
        add(&app, "two", full_args("m2")).unwrap();

        let opts = UseOptions {
            skip_test: false,
            eval: true,
            yes: false,
        };
        use_provider(&mut app, "two", opts).unwrap();

        assert!(app.ui.messages_to_stderr);
        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        assert_eq!(store.config().current, "two");
        let rc = fs::read_to_string(temp_dir.path().join(".bashrc")).unwrap();
        assert!(rc.contains("export ANTHROPIC_MODEL=\"m2\""));
    }

    #[test]
    fn test_use_fails_when_no_shell_file_can_be_written() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = test_app(&temp_dir);
        add(&app, "one", full_args("m1")).unwrap();
        add(&app, "two", full_args("m2")).unwrap();
        let zshrc = temp_dir.path().join(".zshrc");
        fs::write(&zshrc, [0xff, 0xfe, b'\n']).unwrap();

        let opts = UseOptions {
            skip_test: true,
            eval: false,
            yes: true,
        };
        let err = use_provider(&mut app, "two", opts).unwrap_err();
        assert!(err.to_string().contains("Failed to update any shell configuration file"));

        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        assert_eq!(store.config().current, "one");
        assert_eq!(fs::read(&zshrc).unwrap(), vec![0xff, 0xfe, b'\n']);
        assert_eq!(app.session.vars(), &EnvSnapshot::default());
    }

    #[test]
    fn test_use_unknown_provider_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = test_app(&temp_dir);

        let err = use_provider(&mut app, "ghost", UseOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
        assert!(!temp_dir.path().join(".bashrc").exists());
    }

    #[test]
    fn test_remove_forced_reassigns_current() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        add(&app, "a", full_args("m")).unwrap();
        add(&app, "b", full_args("m")).unwrap();

        remove(&app, "a", true).unwrap();

        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        assert_eq!(store.config().current, "b");
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_migrate_non_interactive() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        let cursor = temp_dir.path().join(".cursor");
        fs::create_dir_all(&cursor).unwrap();
        fs::write(
            cursor.join("mcp.json"),
            r#"{"mcpServers":{"fs":{"command":"npx"}}}"#,
        )
        .unwrap();

        migrate(&app, true).unwrap();

        let store = ProviderStore::load(&app.paths.providers_file, Seed::Empty);
        assert_eq!(store.config().mcp["cursor_fs"]["command"], "npx");
        let backups = fs::read_dir(&app.paths.config_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("mcp_backup_"))
            .count();
        assert_eq!(backups, 1);
    }
}
