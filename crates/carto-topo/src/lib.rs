//! Cartographer for Carto.
//!
//! Persistent-homology void detection and maximin gap sampling over
//! point clouds of embeddings.

#![doc = include_str!("../README.md")]

pub mod cartographer;
pub mod homology;

pub use cartographer::{
    Cartographer, CartographerConfig, GapCandidate, MIN_VOID_POINTS, VOID_SIGNIFICANCE,
};
pub use homology::{PersistenceDiagram, TopologicalFeature, rips_persistence};
