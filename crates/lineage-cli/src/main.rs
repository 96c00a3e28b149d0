//! Lineage command-line tool
//!
//! Finds every class in a mods directory that descends from a root class,
//! plans the hook sites a transformer would patch, and manages the scan
//! cache.

mod commands;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::{resolve_color_choice, StyledOutput};
use crate::settings::Overrides;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "Subclass discovery for JVM class-file corpora", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (LINEAGE_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    /// Config file (default: ./lineage.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the qualifying subclass set of a mods directory
    Scan {
        /// Mods directory
        #[arg(default_value = "mods")]
        dir: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
        /// Ignore stored cache entries (the cache is still rewritten)
        #[arg(long)]
        fresh: bool,
        /// Print the qualifying classes as a tree
        #[arg(long)]
        tree: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the methods a transformer would hook
    Plan {
        /// Mods directory
        #[arg(default_value = "mods")]
        dir: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
        /// Hook method name
        #[arg(long)]
        method: Option<String>,
        /// Hook method descriptor
        #[arg(long)]
        descriptor: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the scan cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Display environment and configuration info
    Info,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached units
    Show {
        /// Cache file
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every cached entry
    Clear {
        /// Cache file
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("LINEAGE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, out: &mut StyledOutput) -> anyhow::Result<()> {
    let config_file = cli.config.as_deref();
    match cli.command {
        Commands::Scan {
            dir,
            overrides,
            fresh,
            tree,
            json,
        } => {
            let config = settings::load(config_file, &overrides)?;
            commands::scan::execute(out, &dir, config, fresh, tree, json)
        }

        Commands::Plan {
            dir,
            overrides,
            method,
            descriptor,
            json,
        } => {
            let mut config = settings::load(config_file, &overrides)?;
            settings::override_hook(&mut config, method, descriptor)?;
            commands::plan::execute(out, &dir, config, json)
        }

        Commands::Cache { action } => match action {
            CacheAction::Show { cache, json } => {
                let config = settings::load(config_file, &Overrides::with_cache(cache))?;
                commands::cache::show(out, &config, json)
            }
            CacheAction::Clear { cache } => {
                let config = settings::load(config_file, &Overrides::with_cache(cache))?;
                commands::cache::clear(out, &config)
            }
        },

        Commands::Info => commands::info::execute(out, config_file),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
    if let Err(e) = run(cli, &mut out) {
        out.stderr_error("error: ");
        out.stderr_plain(&format!("{:#}\n", e));
        std::process::exit(1);
    }
}
