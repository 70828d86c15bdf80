//! In-memory store implementations with optional JSON-file persistence.
//!
//! These back the CLI and tests. Chunk embeddings serialize through the
//! shared codec as JSON array strings, the same text form a database
//! vector column would hold.

use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::store::{
    Chunk, ChunkCorpus, DocumentStore, NewSalaryObservation, NewSourceRecord, ObservationStatus,
    SalaryObservation, SalaryStore, SourceRecord, StoreError, StoreResult,
};
use crate::vector::{ChunkId, RecordId, codec};

#[derive(Default)]
struct ChunkTable {
    chunks: Vec<Chunk>,
    next_chunk_id: u32,
}

impl ChunkTable {
    fn insert(&mut self, record_id: RecordId, ordinal: u32, text: &str) -> ChunkId {
        self.next_chunk_id += 1;
        let id = ChunkId::new(self.next_chunk_id).expect("counter starts at 1");
        self.chunks.push(Chunk {
            id,
            record_id,
            ordinal,
            word_count: text.split_whitespace().count() as u32,
            text: text.to_string(),
            embedding: None,
        });
        id
    }

    fn has_chunks(&self, record_id: RecordId) -> bool {
        self.chunks.iter().any(|c| c.record_id == record_id)
    }

    fn attach_embedding(&mut self, chunk_id: ChunkId, vector: &[f32]) -> StoreResult<()> {
        let chunk = self
            .chunks
            .iter_mut()
            .find(|c| c.id == chunk_id)
            .ok_or(StoreError::RecordNotFound { id: chunk_id.get() })?;
        chunk.embedding = Some(vector.to_vec());
        Ok(())
    }
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<DocInner>,
}

#[derive(Default)]
struct DocInner {
    records: Vec<SourceRecord>,
    next_record_id: u32,
    table: ChunkTable,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads documents from a corpus description, skipping blank texts.
    pub fn load_documents(&self, documents: Vec<NewSourceRecord>) -> StoreResult<usize> {
        let mut loaded = 0;
        for doc in documents {
            if doc.text.trim().is_empty() {
                continue;
            }
            self.insert_record(doc)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Writes the full store (records, chunks, embeddings) to a JSON file.
    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        let inner = self.inner.read();
        let file = DocStoreFile {
            records: inner
                .records
                .iter()
                .map(|r| StoredRecord {
                    id: r.id.get(),
                    title: r.title.clone(),
                    text: r.text.clone(),
                    url: r.url.clone(),
                    origin: r.origin.clone(),
                })
                .collect(),
            chunks: inner.table.chunks.iter().map(StoredChunk::from).collect(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| StoreError::Malformed(format!("store serialization: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reads a store previously written by [`Self::save_to`].
    pub fn load_from(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: DocStoreFile = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Malformed(format!("store parse: {e}")))?;

        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for rec in file.records {
                let id = RecordId::new(rec.id)
                    .ok_or_else(|| StoreError::Malformed("zero record id".to_string()))?;
                inner.next_record_id = inner.next_record_id.max(rec.id);
                inner.records.push(SourceRecord {
                    id,
                    title: rec.title,
                    text: rec.text,
                    url: rec.url,
                    origin: rec.origin,
                });
            }
            for chunk in file.chunks {
                inner.table.next_chunk_id = inner.table.next_chunk_id.max(chunk.id);
                inner.table.chunks.push(chunk.into_chunk()?);
            }
        }
        Ok(store)
    }
}

impl ChunkCorpus for MemoryDocumentStore {
    fn pending_records(&self) -> StoreResult<Vec<SourceRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .records
            .iter()
            .filter(|r| !inner.table.has_chunks(r.id))
            .cloned()
            .collect())
    }

    fn store_chunks(&self, record_id: RecordId, parts: &[String]) -> StoreResult<u32> {
        let mut inner = self.inner.write();
        if inner.table.has_chunks(record_id) {
            return Ok(0);
        }
        for (ordinal, part) in parts.iter().enumerate() {
            if part.trim().is_empty() {
                continue;
            }
            inner.table.insert(record_id, ordinal as u32, part);
        }
        Ok(parts.len() as u32)
    }

    fn unembedded_chunks(&self) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .table
            .chunks
            .iter()
            .filter(|c| c.embedding.is_none())
            .cloned()
            .collect())
    }

    fn store_embedding(&self, chunk_id: ChunkId, vector: &[f32]) -> StoreResult<()> {
        self.inner.write().table.attach_embedding(chunk_id, vector)
    }

    fn embedded_chunks(&self) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .table
            .chunks
            .iter()
            .filter(|c| c.embedding.is_some())
            .cloned()
            .collect())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn insert_record(&self, record: NewSourceRecord) -> StoreResult<RecordId> {
        let mut inner = self.inner.write();
        inner.next_record_id += 1;
        let id = RecordId::new(inner.next_record_id).expect("counter starts at 1");
        inner.records.push(SourceRecord {
            id,
            title: record.title,
            text: record.text,
            url: record.url,
            origin: record.origin,
        });
        Ok(id)
    }

    fn record(&self, id: RecordId) -> StoreResult<Option<SourceRecord>> {
        Ok(self
            .inner
            .read()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    fn records(&self) -> StoreResult<Vec<SourceRecord>> {
        Ok(self.inner.read().records.clone())
    }

    fn chunk_with_record(&self, id: ChunkId) -> StoreResult<Option<(Chunk, SourceRecord)>> {
        let inner = self.inner.read();
        let Some(chunk) = inner.table.chunks.iter().find(|c| c.id == id) else {
            return Ok(None);
        };
        let Some(record) = inner.records.iter().find(|r| r.id == chunk.record_id) else {
            return Ok(None);
        };
        Ok(Some((chunk.clone(), record.clone())))
    }
}

/// In-memory salary observation store.
///
/// Only valid observations take part in the chunk/embedding lifecycle;
/// invalid rows are kept but never indexed.
#[derive(Default)]
pub struct MemorySalaryStore {
    inner: RwLock<SalaryInner>,
}

#[derive(Default)]
struct SalaryInner {
    observations: Vec<SalaryObservation>,
    next_record_id: u32,
    table: ChunkTable,
}

impl MemorySalaryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes observations and chunks to a JSON file.
    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        let inner = self.inner.read();
        let file = SalaryStoreFile {
            observations: inner
                .observations
                .iter()
                .map(StoredObservation::from)
                .collect(),
            chunks: inner.table.chunks.iter().map(StoredChunk::from).collect(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| StoreError::Malformed(format!("store serialization: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reads a store previously written by [`Self::save_to`].
    pub fn load_from(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: SalaryStoreFile = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Malformed(format!("store parse: {e}")))?;

        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for obs in file.observations {
                let id = RecordId::new(obs.id)
                    .ok_or_else(|| StoreError::Malformed("zero observation id".to_string()))?;
                inner.next_record_id = inner.next_record_id.max(obs.id);
                inner.observations.push(SalaryObservation {
                    id,
                    job_title: obs.job_title,
                    city: obs.city,
                    country: obs.country,
                    market: obs.market,
                    experience: obs.experience,
                    estimated_min: obs.estimated_min,
                    estimated_max: obs.estimated_max,
                    salary: obs.salary,
                    status: obs.status,
                });
            }
            for chunk in file.chunks {
                inner.table.next_chunk_id = inner.table.next_chunk_id.max(chunk.id);
                inner.table.chunks.push(chunk.into_chunk()?);
            }
        }
        Ok(store)
    }
}

impl ChunkCorpus for MemorySalaryStore {
    fn pending_records(&self) -> StoreResult<Vec<SourceRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .observations
            .iter()
            .filter(|o| o.status.is_valid() && !inner.table.has_chunks(o.id))
            .map(|o| SourceRecord {
                id: o.id,
                title: o.job_title.clone(),
                text: o.index_text(),
                url: None,
                origin: Some("salary_dataset".to_string()),
            })
            .collect())
    }

    fn store_chunks(&self, record_id: RecordId, parts: &[String]) -> StoreResult<u32> {
        let mut inner = self.inner.write();
        let valid = inner
            .observations
            .iter()
            .find(|o| o.id == record_id)
            .is_some_and(|o| o.status.is_valid());
        if !valid || inner.table.has_chunks(record_id) {
            return Ok(0);
        }
        for (ordinal, part) in parts.iter().enumerate() {
            if part.trim().is_empty() {
                continue;
            }
            inner.table.insert(record_id, ordinal as u32, part);
        }
        Ok(parts.len() as u32)
    }

    fn unembedded_chunks(&self) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .table
            .chunks
            .iter()
            .filter(|c| c.embedding.is_none())
            .cloned()
            .collect())
    }

    fn store_embedding(&self, chunk_id: ChunkId, vector: &[f32]) -> StoreResult<()> {
        self.inner.write().table.attach_embedding(chunk_id, vector)
    }

    fn embedded_chunks(&self) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .table
            .chunks
            .iter()
            .filter(|c| c.embedding.is_some())
            .cloned()
            .collect())
    }
}

impl SalaryStore for MemorySalaryStore {
    fn insert_observation(&self, observation: NewSalaryObservation) -> StoreResult<RecordId> {
        let mut inner = self.inner.write();
        inner.next_record_id += 1;
        let id = RecordId::new(inner.next_record_id).expect("counter starts at 1");
        inner.observations.push(SalaryObservation {
            id,
            job_title: observation.job_title,
            city: observation.city,
            country: observation.country,
            market: observation.market,
            experience: observation.experience,
            estimated_min: observation.estimated_min,
            estimated_max: observation.estimated_max,
            salary: observation.salary,
            status: observation.status,
        });
        Ok(id)
    }

    fn observation(&self, id: RecordId) -> StoreResult<Option<SalaryObservation>> {
        Ok(self
            .inner
            .read()
            .observations
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    fn observations(&self) -> StoreResult<Vec<SalaryObservation>> {
        Ok(self.inner.read().observations.clone())
    }

    fn observation_for_chunk(&self, id: ChunkId) -> StoreResult<Option<SalaryObservation>> {
        let inner = self.inner.read();
        let Some(chunk) = inner.table.chunks.iter().find(|c| c.id == id) else {
            return Ok(None);
        };
        Ok(inner
            .observations
            .iter()
            .find(|o| o.id == chunk.record_id)
            .cloned())
    }
}

// Serialized forms for the JSON-file store. Embeddings travel as the text
// form a database vector column holds, through the shared codec.

#[derive(Serialize, Deserialize)]
struct DocStoreFile {
    records: Vec<StoredRecord>,
    chunks: Vec<StoredChunk>,
}

#[derive(Serialize, Deserialize)]
struct SalaryStoreFile {
    observations: Vec<StoredObservation>,
    chunks: Vec<StoredChunk>,
}

#[derive(Serialize, Deserialize)]
struct StoredObservation {
    id: u32,
    job_title: String,
    #[serde(default)]
    city: Option<String>,
    country: String,
    market: String,
    experience: String,
    estimated_min: f64,
    estimated_max: f64,
    salary: f64,
    status: ObservationStatus,
}

impl From<&SalaryObservation> for StoredObservation {
    fn from(obs: &SalaryObservation) -> Self {
        Self {
            id: obs.id.get(),
            job_title: obs.job_title.clone(),
            city: obs.city.clone(),
            country: obs.country.clone(),
            market: obs.market.clone(),
            experience: obs.experience.clone(),
            estimated_min: obs.estimated_min,
            estimated_max: obs.estimated_max,
            salary: obs.salary,
            status: obs.status,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: u32,
    title: String,
    text: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    origin: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct StoredChunk {
    id: u32,
    record_id: u32,
    ordinal: u32,
    word_count: u32,
    text: String,
    #[serde(default)]
    embedding: Option<String>,
}

impl From<&Chunk> for StoredChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.get(),
            record_id: chunk.record_id.get(),
            ordinal: chunk.ordinal,
            word_count: chunk.word_count,
            text: chunk.text.clone(),
            embedding: chunk.embedding.as_deref().map(codec::vector_to_json),
        }
    }
}

impl StoredChunk {
    fn into_chunk(self) -> StoreResult<Chunk> {
        let embedding = match self.embedding {
            Some(raw) => Some(
                codec::vector_from_json(&raw)
                    .map_err(|e| StoreError::Malformed(format!("chunk {} embedding: {e}", self.id)))?,
            ),
            None => None,
        };
        Ok(Chunk {
            id: ChunkId::new(self.id)
                .ok_or_else(|| StoreError::Malformed("zero chunk id".to_string()))?,
            record_id: RecordId::new(self.record_id)
                .ok_or_else(|| StoreError::Malformed("zero record id".to_string()))?,
            ordinal: self.ordinal,
            word_count: self.word_count,
            text: self.text,
            embedding,
        })
    }
}

/// Convenience constructor for seeding observation stores.
pub fn observation_with_status(
    job_title: &str,
    city: Option<&str>,
    country: &str,
    market: &str,
    experience: &str,
    salary: f64,
    status: ObservationStatus,
) -> NewSalaryObservation {
    NewSalaryObservation {
        job_title: job_title.to_string(),
        city: city.map(str::to_string),
        country: country.to_string(),
        market: market.to_string(),
        experience: experience.to_string(),
        estimated_min: salary * 0.9,
        estimated_max: salary * 1.1,
        salary,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_doc(title: &str, text: &str) -> NewSourceRecord {
        NewSourceRecord {
            title: title.to_string(),
            text: text.to_string(),
            url: None,
            origin: Some("test".to_string()),
        }
    }

    #[test]
    fn document_lifecycle() {
        let store = MemoryDocumentStore::new();
        let id = store.insert_record(new_doc("Note", "Some text here.")).unwrap();

        let pending = store.pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        store
            .store_chunks(id, &["Some text here.".to_string()])
            .unwrap();
        assert!(store.pending_records().unwrap().is_empty());

        let unembedded = store.unembedded_chunks().unwrap();
        assert_eq!(unembedded.len(), 1);
        assert_eq!(unembedded[0].word_count, 3);

        store
            .store_embedding(unembedded[0].id, &[0.5, 0.5])
            .unwrap();
        assert!(store.unembedded_chunks().unwrap().is_empty());
        assert_eq!(store.embedded_chunks().unwrap().len(), 1);

        let (chunk, record) = store
            .chunk_with_record(unembedded[0].id)
            .unwrap()
            .expect("chunk resolves");
        assert_eq!(chunk.record_id, id);
        assert_eq!(record.title, "Note");
    }

    #[test]
    fn rechunking_is_skipped() {
        let store = MemoryDocumentStore::new();
        let id = store.insert_record(new_doc("Doc", "Text.")).unwrap();
        store.store_chunks(id, &["Text.".to_string()]).unwrap();
        store
            .store_chunks(id, &["Other.".to_string(), "Parts.".to_string()])
            .unwrap();
        assert_eq!(store.unembedded_chunks().unwrap().len(), 1);
    }

    #[test]
    fn document_store_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docs.store.json");

        let store = MemoryDocumentStore::new();
        let id = store.insert_record(new_doc("Doc", "Body text.")).unwrap();
        store.store_chunks(id, &["Body text.".to_string()]).unwrap();
        let chunk_id = store.unembedded_chunks().unwrap()[0].id;
        store.store_embedding(chunk_id, &[0.25, 0.75]).unwrap();
        store.save_to(&path).unwrap();

        let reloaded = MemoryDocumentStore::load_from(&path).unwrap();
        let chunks = reloaded.embedded_chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding.as_deref(), Some(&[0.25, 0.75][..]));
        assert!(reloaded.record(id).unwrap().is_some());

        // New inserts must not collide with reloaded ids.
        let next = reloaded.insert_record(new_doc("Another", "More.")).unwrap();
        assert!(next.get() > id.get());
    }

    #[test]
    fn invalid_observations_never_become_pending() {
        let store = MemorySalaryStore::new();
        store
            .insert_observation(observation_with_status(
                "Backend Developer",
                Some("Casablanca"),
                "Maroc",
                "Maghreb",
                "3-5 years",
                18_000.0,
                ObservationStatus::Valid,
            ))
            .unwrap();
        store
            .insert_observation(observation_with_status(
                "Backend Developer",
                Some("Casablanca"),
                "Maroc",
                "Maghreb",
                "3-5 years",
                900_000.0,
                ObservationStatus::Invalid,
            ))
            .unwrap();

        let pending = store.pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].text.contains("18000 MAD/month"));
    }

    #[test]
    fn salary_store_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("salary.store.json");

        let store = MemorySalaryStore::new();
        let id = store
            .insert_observation(observation_with_status(
                "Engineer",
                Some("Rabat"),
                "Maroc",
                "Maghreb",
                "5-10 years",
                25_000.0,
                ObservationStatus::Valid,
            ))
            .unwrap();
        let pending = store.pending_records().unwrap();
        store.store_chunks(id, &[pending[0].text.clone()]).unwrap();
        let chunk_id = store.unembedded_chunks().unwrap()[0].id;
        store.store_embedding(chunk_id, &[0.6, 0.8]).unwrap();
        store.save_to(&path).unwrap();

        let reloaded = MemorySalaryStore::load_from(&path).unwrap();
        let obs = reloaded.observation(id).unwrap().expect("observation kept");
        assert_eq!(obs.salary, 25_000.0);
        assert_eq!(obs.status, ObservationStatus::Valid);
        let chunks = reloaded.embedded_chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding.as_deref(), Some(&[0.6, 0.8][..]));
    }

    #[test]
    fn salary_chunk_resolves_to_observation() {
        let store = MemorySalaryStore::new();
        let id = store
            .insert_observation(observation_with_status(
                "Data Analyst",
                Some("Rabat"),
                "Maroc",
                "Maghreb",
                "0-2 years",
                9_000.0,
                ObservationStatus::Valid,
            ))
            .unwrap();
        let pending = store.pending_records().unwrap();
        store.store_chunks(id, &[pending[0].text.clone()]).unwrap();
        let chunk_id = store.unembedded_chunks().unwrap()[0].id;

        let obs = store
            .observation_for_chunk(chunk_id)
            .unwrap()
            .expect("resolves");
        assert_eq!(obs.id, id);
        assert_eq!(obs.job_title, "Data Analyst");
    }
}
