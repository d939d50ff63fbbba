use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, builder::BoolishValueParser};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ccx::{
    commands::{self, AddArgs, App, EnvOptions, UseOptions},
    error::StoreError,
    paths::Paths,
    store::Seed,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "ccx")]
#[command(about = "Claude Code provider switcher - manage API providers and shell environment")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Directory holding providers.json (default: ~/.claude)
    #[arg(long, global = true, value_name = "DIR", env = "CCX_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Start a new store with sample providers instead of an empty one
    #[arg(long, global = true, env = "CCX_SEED_SAMPLES", value_parser = BoolishValueParser::new())]
    seed_samples: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured providers
    #[command(alias = "ls")]
    List,

    /// Show the current provider and environment status
    #[command(alias = "curr")]
    Current,

    /// Switch to a provider and write it to your shell config
    Use {
        /// Provider to activate
        name: String,

        /// Skip the connection test
        #[arg(long)]
        skip_test: bool,

        /// Print only export lines, for `eval "$(ccx use <name> --eval)"`
        #[arg(long)]
        eval: bool,

        /// Do not prompt; proceed even if the connection test fails
        #[arg(long, short)]
        yes: bool,
    },

    /// Add or update a provider
    Add {
        /// Provider key (lowercased)
        name: String,

        /// Display name
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Extra request header, NAME=VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,

        /// Skip the connection test
        #[arg(long)]
        skip_test: bool,

        /// Do not prompt; overwrite and save even if the test fails
        #[arg(long, short)]
        yes: bool,
    },

    /// Remove a provider
    #[command(alias = "rm")]
    Remove {
        name: String,

        /// Skip confirmation
        #[arg(long, short)]
        force: bool,
    },

    /// Test connectivity of a provider (default: current)
    Test {
        name: Option<String>,

        /// Test the ANTHROPIC_* variables of this session instead
        #[arg(long, conflicts_with = "name")]
        env: bool,
    },

    /// Show or export the current provider's environment variables
    Env {
        /// Print export lines for eval
        #[arg(long, conflicts_with = "show")]
        export: bool,

        /// Show the values (API key masked)
        #[arg(long)]
        show: bool,
    },

    /// Open providers.json in $EDITOR
    Config,

    /// Import MCP server configs from other tools
    Migrate {
        /// Import everything found without prompting
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CCX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "ccx", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new(cli.config_dir)?;
    let ui = Ui::new(cli.color, cli.no_color);
    let seed = if cli.seed_samples {
        Seed::Samples
    } else {
        Seed::Empty
    };
    let mut app = App::new(paths, ui, seed);

    let result = match cli.command {
        Commands::List => commands::list(&app),
        Commands::Current => commands::current(&app),
        Commands::Use {
            name,
            skip_test,
            eval,
            yes,
        } => commands::use_provider(
            &mut app,
            &name,
            UseOptions {
                skip_test,
                eval,
                yes,
            },
        ),
        Commands::Add {
            name,
            display_name,
            api_key,
            base_url,
            model,
            headers,
            skip_test,
            yes,
        } => commands::add(
            &app,
            &name,
            AddArgs {
                display_name,
                api_key,
                base_url,
                model,
                headers,
                skip_test,
                yes,
            },
        ),
        Commands::Remove { name, force } => commands::remove(&app, &name, force),
        Commands::Test { name, env } => commands::test(&app, name.as_deref(), env),
        Commands::Env { export, show } => commands::env(&app, EnvOptions { export, show }),
        Commands::Config => commands::config(&app),
        Commands::Migrate { yes } => commands::migrate(&app, yes),
        Commands::Completions { .. } => Ok(()),
    };

    // Prefix store failures with their category
    result.map_err(|e| match e.downcast_ref::<StoreError>() {
        Some(store_err) => anyhow!("{}: {:#}", store_err.category(), e),
        None => e,
    })
}
