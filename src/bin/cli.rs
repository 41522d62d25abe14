//! Schedule of Classes crawler CLI
//!
//! `scrape` runs the live crawl; `replay` persists a snapshot file written
//! by an earlier run without touching the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use soc_crawler::{
    error::Result,
    models::{CatalogSnapshot, Config, ConfigSource},
    pipeline,
    services::{HttpTransport, SocParser},
    storage::{FileSink, Sink, SqlStore},
};

/// Configuration read when `--config` is not given.
const DEFAULT_CONFIG: &str = "data/config.toml";

/// soc-crawler - Schedule of Classes catalog harvester
#[derive(Parser, Debug)]
#[command(
    name = "soc-crawler",
    version,
    about = "Harvests the Schedule of Classes into a nested catalog snapshot"
)]
struct Cli {
    /// Path to the TOML configuration file [default: data/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every configured term and persist the snapshot
    Scrape {
        /// Snapshot file (default: output.file from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Persist a previously written snapshot file, skipping the crawl
    Replay {
        /// Snapshot JSON produced by an earlier run
        file: PathBuf,
    },

    /// Validate the configuration file
    Validate,

    /// Show counts and digest of a snapshot file
    Info {
        /// Snapshot file (default: output.file from the config)
        file: Option<PathBuf>,
    },
}

/// Initialize logging; RUST_LOG overrides the default filter.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the file sink and the store. The caller closes the returned sink.
fn open_sink(config: &Config) -> Result<Sink> {
    let store = SqlStore::connect(&config.output.database_url)?;
    Ok(Sink::new(FileSink::new(&config.output.file), store))
}

fn show_info(path: &Path) -> Result<()> {
    let snapshot = CatalogSnapshot::load(path)?;
    log::info!("Snapshot: {}", path.display());
    for term in &snapshot.terms {
        log::info!(
            "    {} ({}): {} departments",
            term.term.code,
            term.term.label,
            term.departments.len()
        );
    }
    log::info!(
        "Totals: {} terms, {} departments, {} courses",
        snapshot.term_count(),
        snapshot.department_count(),
        snapshot.course_count()
    );
    log::info!("Digest: {}", snapshot.digest()?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicitly named config file must load; only the implicit default may fall back.
    let resolved = Config::resolve(cli.config.as_deref(), Path::new(DEFAULT_CONFIG));
    let level = match (&resolved, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok((config, ConfigSource::File(_))), false) => config.logging.level.clone(),
        _ => "info".to_string(),
    };
    init_logging(&level);

    let mut config = match resolved {
        Ok((config, ConfigSource::File(path))) => {
            log::debug!("Loaded configuration from {}", path.display());
            config
        }
        Ok((config, ConfigSource::Defaults { path, error })) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                path.display(),
                error
            );
            config
        }
        Err(e) => {
            log::error!("Config load failed: {e}");
            return Err(e);
        }
    };

    match cli.command {
        Command::Scrape { output } => {
            if let Some(path) = output {
                config.output.file = path.display().to_string();
            }
            config.validate()?;

            let transport = Arc::new(HttpTransport::from_config(&config)?);
            let parser = Arc::new(SocParser::new()?);
            let sink = open_sink(&config)?;

            let result = pipeline::run_pipeline(&config, transport, parser, &sink).await;
            sink.close().await;
            result?;

            log::info!("Crawl complete!");
        }

        Command::Replay { file } => {
            let sink = open_sink(&config)?;

            let result = pipeline::run_replay(&file, &sink).await;
            sink.close().await;
            result?;

            log::info!("Replay complete!");
        }

        Command::Validate => pipeline::run_validate(&config)?,

        Command::Info { file } => {
            let path = file.unwrap_or_else(|| PathBuf::from(&config.output.file));
            show_info(&path)?;
        }
    }

    Ok(())
}
