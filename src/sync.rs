//! Keeps the vector index consistent with the relational source of truth.
//!
//! [`IndexSyncManager`] owns the in-memory index for one corpus. On a cold
//! start it loads the persisted snapshot; when the snapshot is absent or
//! unreadable it runs the full pipeline — chunk pending records, embed
//! pending chunks, build, persist. Rebuilds are never incremental: chunks
//! added after a build only appear in results after the next full rebuild.
//!
//! The index sits behind a single-writer, multiple-reader lock, and every
//! successful swap bumps a version token, so concurrent readers never see
//! a half-built index and can detect that a snapshot changed under them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::embedding::EmbeddingProvider;
use crate::error::EngineResult;
use crate::store::ChunkCorpus;
use crate::vector::{ChunkId, FlatVectorIndex, IndexPaths, Score};

/// Orchestrates the chunk → embed → build → persist lifecycle for one
/// corpus and serves searches against the resulting index.
pub struct IndexSyncManager<C: ChunkCorpus> {
    corpus: Arc<C>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    batch_size: usize,
    paths: IndexPaths,
    index: RwLock<Option<FlatVectorIndex>>,
    version: AtomicU64,
}

impl<C: ChunkCorpus> IndexSyncManager<C> {
    pub fn new(
        corpus: Arc<C>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        batch_size: usize,
        paths: IndexPaths,
    ) -> Self {
        Self {
            corpus,
            embedder,
            chunking,
            batch_size: batch_size.max(1),
            paths,
            index: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Makes the index ready to serve queries. Idempotent.
    ///
    /// Loads the persisted snapshot when one exists; otherwise synchronizes
    /// pending work and builds a fresh index. An empty corpus yields a
    /// ready, empty index — queries return no hits, not an error.
    pub fn ensure_ready(&self) -> EngineResult<()> {
        if self.index.read().is_some() {
            return Ok(());
        }
        let mut guard = self.index.write();
        // Another caller may have won the race for the write lock.
        if guard.is_some() {
            return Ok(());
        }
        match FlatVectorIndex::load(&self.paths) {
            Ok(index) => {
                info!(
                    vectors = index.vector_count(),
                    "loaded index snapshot from disk"
                );
                *guard = Some(index);
                self.version.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                warn!("index snapshot unusable ({e}); rebuilding");
                self.rebuild_locked(&mut guard)
            }
        }
    }

    /// Discards any loaded index and rebuilds from the store.
    pub fn rebuild(&self) -> EngineResult<()> {
        let mut guard = self.index.write();
        self.rebuild_locked(&mut guard)
    }

    fn rebuild_locked(&self, guard: &mut Option<FlatVectorIndex>) -> EngineResult<()> {
        self.sync_pending()?;

        let rows: Vec<(ChunkId, Vec<f32>)> = self
            .corpus
            .embedded_chunks()?
            .into_iter()
            .filter_map(|chunk| chunk.embedding.map(|vector| (chunk.id, vector)))
            .collect();

        let index = FlatVectorIndex::build(self.embedder.dimension(), rows);
        index.persist(&self.paths)?;
        info!(vectors = index.vector_count(), "index rebuilt and persisted");
        *guard = Some(index);
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Chunks records without chunks, then embeds chunks without vectors.
    fn sync_pending(&self) -> EngineResult<()> {
        for record in self.corpus.pending_records()? {
            let parts = chunk_text(
                &record.text,
                self.chunking.max_chars,
                self.chunking.overlap_chars,
            );
            if parts.is_empty() {
                continue;
            }
            let stored = self.corpus.store_chunks(record.id, &parts)?;
            debug!(record = %record.id, chunks = stored, "record chunked");
        }

        let pending = self.corpus.unembedded_chunks()?;
        if pending.is_empty() {
            return Ok(());
        }
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                self.corpus.store_embedding(chunk.id, vector)?;
            }
        }
        debug!(chunks = pending.len(), "pending chunks embedded");
        Ok(())
    }

    /// True once a snapshot is loaded or built. Callers that dispatch
    /// `rebuild` on a background thread poll this instead of blocking.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.index.read().is_some()
    }

    /// Monotonic token bumped on every successful load or rebuild.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Number of vectors currently served, 0 when not ready.
    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.index
            .read()
            .as_ref()
            .map_or(0, FlatVectorIndex::vector_count)
    }

    /// Snapshot artifact locations.
    #[must_use]
    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Searches the loaded index. An unloaded or empty index returns no
    /// hits rather than an error.
    pub fn search(&self, query: &[f32], k: usize) -> EngineResult<Vec<(ChunkId, Score)>> {
        let guard = self.index.read();
        match guard.as_ref() {
            Some(index) if !index.is_empty() => Ok(index.search(query, k)?),
            _ => Ok(Vec::new()),
        }
    }
}
