//! Relational-store boundary: typed records and the traits the engine
//! consumes them through.
//!
//! The engine never owns the source of truth. Documents, chunks, and salary
//! observations live in whatever backend implements these traits; the
//! engine only reads and appends. [`memory`] provides the in-process,
//! JSON-file-backed implementation used by the CLI and tests.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::{ChunkId, RecordId};

/// Errors raised by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record {id} not found in the store")]
    RecordNotFound { id: u32 },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store data is malformed: {0}")]
    Malformed(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An opaque unit of text owned by the relational store.
///
/// Immutable once chunked; the sync manager skips records that already
/// have chunks.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub id: RecordId,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub origin: Option<String>,
}

/// A new record before the store assigns its id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSourceRecord {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

/// A bounded slice of one record's text, the unit that gets embedded.
///
/// Ordinals are dense from 0 within their record.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub record_id: RecordId,
    pub ordinal: u32,
    pub word_count: u32,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Plausibility verdict assigned to a salary observation at ingestion.
///
/// Assigned once and never silently changed. Invalid observations stay in
/// the store but are excluded from chunking and embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Valid,
    Invalid,
}

impl ObservationStatus {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

/// A salary data point with its resolved location and validation verdict.
///
/// Monetary values are MAD per month throughout the engine.
#[derive(Debug, Clone, Serialize)]
pub struct SalaryObservation {
    pub id: RecordId,
    pub job_title: String,
    pub city: Option<String>,
    pub country: String,
    pub market: String,
    /// Coarse experience band label, e.g. "3-5 years".
    pub experience: String,
    pub estimated_min: f64,
    pub estimated_max: f64,
    pub salary: f64,
    pub status: ObservationStatus,
}

impl SalaryObservation {
    /// Renders the observation as the single text unit that gets indexed.
    ///
    /// Mirrors the query shape used at search time so row and query
    /// embeddings live in the same neighborhood.
    #[must_use]
    pub fn index_text(&self) -> String {
        let location = self.city.as_deref().unwrap_or(&self.country);
        format!(
            "Position: {} | Location: {} | Country: {} | Market: {} | Experience: {} | Salary: {} MAD/month | Range: {}-{} MAD",
            self.job_title,
            location,
            self.country,
            self.market,
            self.experience,
            self.salary as i64,
            self.estimated_min as i64,
            self.estimated_max as i64,
        )
    }
}

/// A new observation before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewSalaryObservation {
    pub job_title: String,
    pub city: Option<String>,
    pub country: String,
    pub market: String,
    pub experience: String,
    pub estimated_min: f64,
    pub estimated_max: f64,
    pub salary: f64,
    pub status: ObservationStatus,
}

/// Source of truth a vector index is synchronized against.
///
/// The sync manager drives the chunk and embedding lifecycle exclusively
/// through this trait, so documents and salary observations share one
/// pipeline.
pub trait ChunkCorpus: Send + Sync {
    /// Records that have no chunks yet, with the text to chunk.
    fn pending_records(&self) -> StoreResult<Vec<SourceRecord>>;

    /// Appends the chunks of one record, ordinals dense from 0.
    fn store_chunks(&self, record_id: RecordId, parts: &[String]) -> StoreResult<u32>;

    /// Chunks that exist but have no embedding yet.
    fn unembedded_chunks(&self) -> StoreResult<Vec<Chunk>>;

    /// Attaches an embedding to a chunk.
    fn store_embedding(&self, chunk_id: ChunkId, vector: &[f32]) -> StoreResult<()>;

    /// All chunks that carry an embedding, in insertion order.
    fn embedded_chunks(&self) -> StoreResult<Vec<Chunk>>;
}

/// Read/write access to documents and their chunks.
pub trait DocumentStore: ChunkCorpus {
    /// Inserts a new document.
    fn insert_record(&self, record: NewSourceRecord) -> StoreResult<RecordId>;

    /// Fetches a document by id.
    fn record(&self, id: RecordId) -> StoreResult<Option<SourceRecord>>;

    /// All documents, in insertion order.
    fn records(&self) -> StoreResult<Vec<SourceRecord>>;

    /// Resolves a chunk and its owning document in one lookup.
    ///
    /// `None` when the chunk (or its document) no longer exists; search
    /// drops such hits instead of failing.
    fn chunk_with_record(&self, id: ChunkId) -> StoreResult<Option<(Chunk, SourceRecord)>>;
}

/// Read/write access to salary observations and their chunks.
pub trait SalaryStore: ChunkCorpus {
    /// Inserts a new observation with its ingestion-time status.
    fn insert_observation(&self, observation: NewSalaryObservation) -> StoreResult<RecordId>;

    /// Fetches an observation by id.
    fn observation(&self, id: RecordId) -> StoreResult<Option<SalaryObservation>>;

    /// All observations, in insertion order.
    fn observations(&self) -> StoreResult<Vec<SalaryObservation>>;

    /// Resolves the observation that owns a chunk.
    fn observation_for_chunk(&self, id: ChunkId) -> StoreResult<Option<SalaryObservation>>;
}
