//! The Carto CLI application.
//!
//! Loads configuration, installs logging, opens the [`Engine`] and
//! dispatches each command to its handler.

use crate::cli::{CliArgs, Command};
use crate::config::CartoConfig;
use crate::config_handlers;
use crate::handlers::{self, GapOptions, run_blocking};
use carto::Engine;
use carto_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CartoCli
// ============================================================================

/// The CLI application.
pub struct CartoCli {
    name: String,
    config: Arc<CartoConfig>,
    version: String,
}

impl CartoCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = CartoConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }

    /// Create a new CLI application.
    pub fn new(name: impl Into<String>, config: CartoConfig) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The loaded configuration.
    pub fn config(&self) -> &CartoConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity
    /// flags. `log` records from the engine crates are forwarded.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Ignore error if a subscriber is already set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);

        let command = match args.command {
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                return Ok(());
            }
            Some(Command::Config(config_cmd)) => {
                return config_handlers::handle_config_command(
                    args.config.as_deref(),
                    config_cmd.command,
                );
            }
            Some(command) => command,
            None => {
                println!("{} {} (use --help for usage)", self.name, self.version);
                return Ok(());
            }
        };

        let engine = self.open_engine().await?;
        let wrote = matches!(command, Command::Ingest { .. });
        let result = self.dispatch(&engine, command).await;
        self.close_engine(engine, wrote).await?;
        result
    }

    async fn open_engine(&self) -> Result<Engine> {
        let config = self.config.engine_config()?;
        tracing::debug!(data_dir = ?config.index.data_dir, "Opening engine");
        run_blocking("opening the index", None, move || Engine::open(config)).await
    }

    /// Persist the snapshot after writes, or when the one on disk was stale.
    async fn close_engine(&self, engine: Engine, wrote: bool) -> Result<()> {
        if !wrote && engine.stats()?.snapshot_fresh {
            return Ok(());
        }
        let saved = run_blocking("saving the snapshot", None, move || engine.shutdown()).await?;
        if let Some(saved) = saved {
            tracing::debug!(generation = saved.generation, "Snapshot saved");
        }
        Ok(())
    }

    async fn dispatch(&self, engine: &Engine, command: Command) -> Result<()> {
        match command {
            Command::Ingest { path } => {
                let engine = engine.clone();
                run_blocking("ingest", None, move || handlers::handle_ingest(&engine, &path))
                    .await?;
            }
            Command::Search { id, vector, limit } => {
                handlers::handle_search(engine, id.as_deref(), vector.as_deref(), limit)?;
            }
            Command::Explore { ids, limit } => {
                handlers::handle_explore(engine, &ids, limit)?;
            }
            Command::Centroid { ids } => {
                handlers::handle_centroid(engine, &ids)?;
            }
            Command::Bridges { a, b, top_k } => {
                handlers::handle_bridges(engine, &a, &b, top_k)?;
            }
            Command::Voids { ids, timeout_secs } => {
                let timeout = Duration::from_secs(timeout_secs);
                handlers::handle_voids(engine.clone(), ids, timeout).await?;
            }
            Command::Gaps {
                ids,
                samples,
                seed,
                limit,
                timeout_secs,
            } => {
                let options = GapOptions {
                    ids,
                    samples,
                    seed,
                    limit,
                };
                let timeout = Duration::from_secs(timeout_secs);
                handlers::handle_gaps(engine.clone(), options, timeout).await?;
            }
            Command::Stats { ids } => {
                handlers::handle_stats(engine, ids.as_deref())?;
            }
            Command::Version | Command::Config(_) => {}
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
