//! Carto Core: shared types, traits, errors, and vector math.
//!
//! This crate provides the foundational types used across all Carto crates.
//! It has no internal Carto dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`math`]: Distances, norms, and dimension checks
//! - [`traits`]: Extension traits (`ConfigProvider`, `VectorSource`)

#![doc = include_str!("../README.md")]

pub mod error;
pub mod math;
pub mod traits;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use traits::{ConfigProvider, VectorSource};
