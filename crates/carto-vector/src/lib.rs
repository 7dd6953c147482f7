//! Durable paper store and approximate nearest-neighbor index for Carto.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      carto-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorIndex (one lock, two-phase add)                      │
//! │  ├── VectorStore (redb: ids, keys, metadata, vectors)       │
//! │  └── AnnIndex trait                                         │
//! │      ├── HnswIndex (default)                                │
//! │      └── FlatIndex (exact scan)                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Persistence (snapshot + generation/checksum freshness)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use carto_vector::{IndexConfig, Metadata, VectorIndex};
//!
//! let index = VectorIndex::in_memory(IndexConfig::new(4))?;
//! index.add("p1", &[1.0, 0.0, 0.0, 0.0], Metadata::new())?;
//! index.add("p2", &[0.9, 0.1, 0.0, 0.0], Metadata::new())?;
//!
//! for hit in index.search(&[1.0, 0.0, 0.0, 0.0], 2)? {
//!     println!("{}: {:.4}", hit.external_id, hit.distance);
//! }
//! ```

#![doc = include_str!("../README.md")]

pub mod ann;
pub mod index;
pub mod persistence;
pub mod store;
pub mod types;

// Re-exports: core types
pub use types::{
    AddOutcome, HnswParams, IndexBackend, IndexConfig, IndexStats, IngestError, IngestRecord,
    IngestReport, Metadata, Metric, Neighbor, PaperRecord, SearchHit,
};

// Re-exports: index
pub use ann::{AnnIndex, AnnSnapshot, FlatIndex, HnswIndex, create_ann_index};
pub use index::VectorIndex;
pub use store::VectorStore;

// Re-exports: persistence
pub use persistence::{IndexMetadata, is_snapshot_fresh};
