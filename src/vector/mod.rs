//! Flat vector index over chunk embeddings.
//!
//! Vectors are unit-normalized at build time, so nearest-neighbor search is
//! a brute-force inner product scan (cosine similarity). The index persists
//! to a binary blob plus a JSON id-map and reloads without re-embedding.

pub mod codec;
mod index;
mod types;

pub use index::{FlatVectorIndex, IndexPaths};
pub use types::{ChunkId, DEFAULT_DIMENSION, RecordId, Score, VectorDimension, VectorError};
