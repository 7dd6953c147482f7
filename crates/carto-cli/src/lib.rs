//! Command-line front end for the Carto engine.
//!
//! - [`config::CartoConfig`]: file, environment and default configuration
//! - [`cli::CliArgs`]: the `carto` argument parser
//! - [`app::CartoCli`]: logging setup and command dispatch

#![doc = include_str!("../README.md")]

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod handlers;

pub use app::CartoCli;
pub use cli::{CliArgs, Command, ConfigAction};
pub use config::CartoConfig;
