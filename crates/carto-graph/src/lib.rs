//! Navigator for Carto.
//!
//! Centroid computation and bridge-paper discovery over a similarity
//! graph built with petgraph.
//!
//! # Modules
//!
//! - [`similarity`]: similarity graph construction
//! - [`centrality`]: weighted betweenness centrality
//! - [`stats`]: graph summaries
//! - [`navigator`]: `Navigator`, `centroid`, bridge ranking

#![doc = include_str!("../README.md")]

pub mod centrality;
pub mod navigator;
pub mod similarity;
pub mod stats;

// Re-exports: navigator
pub use navigator::{BridgePaper, Navigator, NavigatorConfig, centroid};

// Re-exports: graph
pub use centrality::{betweenness_centrality, similarity_cost};
pub use similarity::{SimilarityEdge, SimilarityGraph};
pub use stats::{GraphStats, compute_stats, top_nodes_by_degree};
