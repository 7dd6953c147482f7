//! Semantic cartography over paper embeddings.
//!
//! This crate re-exports the Carto component crates and adds the
//! [`Engine`] context object that ties them together.
//!
//! # Crates
//!
//! | Crate | Provides |
//! |-------|----------|
//! | `carto-core` | `Error`, `Result`, vector math, `VectorSource` |
//! | `carto-vector` | `VectorIndex`: durable store + ANN index |
//! | `carto-graph` | `Navigator`: centroids and bridge papers |
//! | `carto-topo` | `Cartographer`: voids and gaps |
//!
//! # Example
//!
//! ```rust,ignore
//! use carto::{Engine, EngineConfig, IndexConfig, Metadata};
//!
//! let engine = Engine::in_memory(EngineConfig {
//!     index: IndexConfig::new(4),
//!     ..Default::default()
//! })?;
//! engine.add("p1", &[1.0, 0.0, 0.0, 0.0], Metadata::new())?;
//! let hits = engine.search(&[1.0, 0.0, 0.0, 0.0], 5)?;
//! ```

#![doc = include_str!("../README.md")]

pub mod engine;

pub use engine::{Engine, EngineConfig};

// Re-exports: core
pub use carto_core::{ConfigProvider, Error, Result, VectorSource};

// Re-exports: vector index
pub use carto_vector::{
    AddOutcome, IndexBackend, IndexConfig, IndexMetadata, IndexStats, IngestError, IngestRecord,
    IngestReport, Metadata, Metric, PaperRecord, SearchHit, VectorIndex,
};

// Re-exports: navigator
pub use carto_graph::{BridgePaper, GraphStats, Navigator, NavigatorConfig, centroid};

// Re-exports: cartographer
pub use carto_topo::{
    Cartographer, CartographerConfig, GapCandidate, PersistenceDiagram, TopologicalFeature,
};
