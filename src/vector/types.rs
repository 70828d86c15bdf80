//! Type-safe wrappers and error types for the vector index.
//!
//! Ids, scores, and dimensions are newtypes so a chunk id can never be
//! confused with a record id or a raw row position, and so dimension
//! mismatches are caught at the boundary instead of corrupting a search.

use std::num::NonZeroU32;
use thiserror::Error;

/// Embedding dimension of the default model (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSION: usize = 384;

/// Identifier of a chunk row in the relational store.
///
/// Non-zero so an uninitialized id can never masquerade as a real one.
/// Positions in the index id-map hold these values in row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(NonZeroU32);

impl ChunkId {
    /// Returns `None` if `id` is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ChunkId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.get())
    }
}

/// Identifier of a source record (document or salary observation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(NonZeroU32);

impl RecordId {
    /// Returns `None` if `id` is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.get())
    }
}

/// Inner-product similarity between two unit-normalized vectors.
///
/// The value lies in [-1.0, 1.0]; 1.0 is an identical direction. NaN is
/// rejected at construction so scores always have a total order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Validates the raw similarity value.
    ///
    /// Returns an error if the value is NaN or outside [-1.0, 1.0].
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "similarity cannot be NaN",
            });
        }
        if !(-1.0..=1.0).contains(&value) {
            return Err(VectorError::InvalidScore {
                value,
                reason: "similarity must be in range [-1.0, 1.0]",
            });
        }
        Ok(Self(value))
    }

    /// Clamps a raw inner product into a valid score.
    ///
    /// Float rounding can push the dot product of two unit vectors a hair
    /// past 1.0; search uses this instead of failing the whole query.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(-1.0, 1.0))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("Score values are never NaN")
    }
}

impl serde::Serialize for Score {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.0)
    }
}

/// Validated vector dimension shared by every row of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// The dimension of the default embedding model.
    #[must_use]
    pub const fn default_model() -> Self {
        Self(DEFAULT_DIMENSION)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has this dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors raised by vector index and embedding operations.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid similarity score: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error("Index storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(
        "Index snapshot is invalid: {0}\nSuggestion: Delete the artifacts and rebuild the index"
    )]
    InvalidSnapshot(String),

    #[error(
        "Id-map length {id_count} disagrees with vector count {vector_count}\nSuggestion: Both artifacts must come from the same build; rebuild the index"
    )]
    IdMapMismatch {
        id_count: usize,
        vector_count: usize,
    },

    #[error(
        "Invalid snapshot version: expected {expected}, got {actual}\nSuggestion: Rebuild the index with this version of the engine"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is available and initialized"
    )]
    EmbeddingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_rejects_zero() {
        assert!(ChunkId::new(0).is_none());
        let id = ChunkId::new(7).unwrap();
        assert_eq!(id.get(), 7);
    }

    #[test]
    fn record_id_rejects_zero() {
        assert!(RecordId::new(0).is_none());
        assert_eq!(RecordId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn score_validation() {
        assert!(Score::new(0.5).is_ok());
        assert!(Score::new(-1.0).is_ok());
        assert!(Score::new(1.0).is_ok());
        assert!(Score::new(1.2).is_err());
        assert!(Score::new(f32::NAN).is_err());
    }

    #[test]
    fn score_clamping_absorbs_rounding() {
        assert_eq!(Score::clamped(1.000_001).get(), 1.0);
        assert_eq!(Score::clamped(-1.5).get(), -1.0);
        assert_eq!(Score::clamped(f32::NAN).get(), 0.0);
    }

    #[test]
    fn score_ordering_is_total() {
        let mut scores = vec![
            Score::clamped(0.3),
            Score::clamped(0.9),
            Score::clamped(-0.2),
        ];
        scores.sort();
        assert_eq!(scores[0].get(), -0.2);
        assert_eq!(scores[2].get(), 0.9);
    }

    #[test]
    fn dimension_validates_vectors() {
        let dim = VectorDimension::new(4).unwrap();
        assert!(dim.validate_vector(&[0.0; 4]).is_ok());
        assert!(dim.validate_vector(&[0.0; 3]).is_err());
        assert!(VectorDimension::new(0).is_err());
    }
}
