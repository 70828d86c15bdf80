//! Retrieval-augmented salary benchmarking and document search engine.
//!
//! The crate chunks free text, embeds chunks into unit vectors, maintains a
//! persisted flat vector index, and answers similarity queries. The salary
//! variant layers location/market normalization, a statistical validation
//! gate at ingestion, and percentile aggregation on top of the same
//! retrieval core.

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod salary;
pub mod search;
pub mod store;
pub mod sync;
pub mod vector;

// Explicit exports for the common entry points.
pub use config::Settings;
pub use error::{EngineError, EngineResult, ErrorContext};
pub use search::{DocumentSearchEngine, SearchHit};
pub use sync::IndexSyncManager;
pub use vector::{ChunkId, FlatVectorIndex, IndexPaths, RecordId, Score, VectorDimension};
