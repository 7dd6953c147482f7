//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// ============================================================================
// CLI argument types
// ============================================================================

/// Semantic cartography over paper embeddings.
#[derive(Parser, Debug)]
#[command(name = "carto", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "CARTO_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Carto commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add or replace papers from a JSON Lines file.
    ///
    /// Each line is `{"id": ..., "vector": [...], "metadata": {...}}`.
    Ingest {
        /// Path to the JSONL file.
        path: PathBuf,
    },

    /// Nearest-neighbor search by paper id or raw vector.
    Search {
        /// Seed paper; the paper itself is excluded from results.
        #[arg(long, conflicts_with = "vector", required_unless_present = "vector")]
        id: Option<String>,

        /// Comma-separated query vector.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Option<Vec<f32>>,

        /// Maximum results.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Papers near the centroid of a set of seed papers.
    Explore {
        /// Comma-separated seed paper ids.
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,

        /// Maximum results.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Print the centroid of a set of papers.
    Centroid {
        /// Comma-separated paper ids.
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },

    /// Papers bridging two clusters.
    Bridges {
        /// Comma-separated ids of the first cluster.
        #[arg(long, value_delimiter = ',', required = true)]
        a: Vec<String>,

        /// Comma-separated ids of the second cluster.
        #[arg(long, value_delimiter = ',', required = true)]
        b: Vec<String>,

        /// Number of bridges to report.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Persistent-homology voids in the corpus or a subset of it.
    Voids {
        /// Comma-separated paper ids; the whole corpus when absent.
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,

        /// Give up after this many seconds.
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Sample for the emptiest region and list the papers bordering it.
    Gaps {
        /// Comma-separated paper ids; the whole corpus when absent.
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,

        /// Candidate points to draw.
        #[arg(short, long)]
        samples: Option<usize>,

        /// RNG seed for reproducible sampling.
        #[arg(long)]
        seed: Option<u64>,

        /// Neighboring papers to list.
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Give up after this many seconds.
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Index counters, plus similarity-graph statistics for `--ids`.
    Stats {
        /// Comma-separated paper ids.
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,
    },

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration as TOML.
    Show,

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::parse_from(["carto"]);
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_args_flags() {
        let args = CliArgs::parse_from(["carto", "--verbose", "--config", "/etc/carto.toml"]);
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("/etc/carto.toml"));
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    #[test]
    fn test_search_by_id() {
        let args = CliArgs::parse_from(["carto", "search", "--id", "p1"]);
        match args.command {
            Some(Command::Search { id, vector, limit }) => {
                assert_eq!(id.as_deref(), Some("p1"));
                assert!(vector.is_none());
                assert_eq!(limit, 10);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_search_by_vector_with_negatives() {
        let args = CliArgs::parse_from(["carto", "search", "--vector", "-0.5,0.25,1", "-l", "3"]);
        match args.command {
            Some(Command::Search { id, vector, limit }) => {
                assert!(id.is_none());
                assert_eq!(vector, Some(vec![-0.5, 0.25, 1.0]));
                assert_eq!(limit, 3);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_search_requires_a_query() {
        assert!(CliArgs::try_parse_from(["carto", "search"]).is_err());
        assert!(
            CliArgs::try_parse_from(["carto", "search", "--id", "p1", "--vector", "1,2"]).is_err()
        );
    }

    // ------------------------------------------------------------------------
    // Navigator and cartographer commands
    // ------------------------------------------------------------------------

    #[test]
    fn test_bridges_command() {
        let args = CliArgs::parse_from(["carto", "bridges", "--a", "x,y", "--b", "z", "-k", "2"]);
        match args.command {
            Some(Command::Bridges { a, b, top_k }) => {
                assert_eq!(a, vec!["x", "y"]);
                assert_eq!(b, vec!["z"]);
                assert_eq!(top_k, Some(2));
            }
            _ => panic!("Expected Bridges command"),
        }
    }

    #[test]
    fn test_explore_requires_ids() {
        assert!(CliArgs::try_parse_from(["carto", "explore"]).is_err());
    }

    #[test]
    fn test_voids_defaults() {
        let args = CliArgs::parse_from(["carto", "voids"]);
        match args.command {
            Some(Command::Voids { ids, timeout_secs }) => {
                assert!(ids.is_none());
                assert_eq!(timeout_secs, 60);
            }
            _ => panic!("Expected Voids command"),
        }
    }

    #[test]
    fn test_gaps_command() {
        let args = CliArgs::parse_from(["carto", "gaps", "--samples", "500", "--seed", "7"]);
        match args.command {
            Some(Command::Gaps {
                ids,
                samples,
                seed,
                limit,
                ..
            }) => {
                assert!(ids.is_none());
                assert_eq!(samples, Some(500));
                assert_eq!(seed, Some(7));
                assert_eq!(limit, 5);
            }
            _ => panic!("Expected Gaps command"),
        }
    }

    #[test]
    fn test_config_init_command() {
        let args = CliArgs::parse_from(["carto", "config", "init", "--force"]);
        match args.command {
            Some(Command::Config(cmd)) => match cmd.command {
                ConfigAction::Init { file, force } => {
                    assert!(file.is_none());
                    assert!(force);
                }
                _ => panic!("Expected Init action"),
            },
            _ => panic!("Expected Config command"),
        }
    }
}
