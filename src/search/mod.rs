//! Query-side orchestration for document search.
//!
//! [`DocumentSearchEngine`] warms the index lazily, embeds the query,
//! searches, and resolves raw hits back to their source metadata. A cold
//! or empty index degrades to empty results; only embedding failures
//! propagate, because a degraded query vector would silently return wrong
//! neighbors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::EngineResult;
use crate::generation::{self, GenerativeModel};
use crate::store::DocumentStore;
use crate::sync::IndexSyncManager;
use crate::vector::{ChunkId, RecordId, Score};

/// One ranked search result with its resolved source metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub record_id: RecordId,
    pub ordinal: u32,
    pub text: String,
    pub title: String,
    pub url: Option<String>,
    pub origin: Option<String>,
    pub score: Score,
}

/// Typed response of a grounded document answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl DocumentAnswer {
    /// Fixed response used when the generation model fails or returns
    /// unparsable text.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            answer: "Analysis unavailable: the generation backend did not return a usable response."
                .to_string(),
            key_points: Vec::new(),
            recommendations: vec!["Retry once the generation backend is reachable.".to_string()],
        }
    }
}

/// Embeds queries, searches the index, and resolves hits to documents.
pub struct DocumentSearchEngine<S: DocumentStore> {
    store: Arc<S>,
    embedder: Arc<dyn EmbeddingProvider>,
    sync: Arc<IndexSyncManager<S>>,
}

impl<S: DocumentStore> DocumentSearchEngine<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn EmbeddingProvider>,
        sync: Arc<IndexSyncManager<S>>,
    ) -> Self {
        Self {
            store,
            embedder,
            sync,
        }
    }

    /// Returns the top `k` hits for a free-text query.
    ///
    /// Warms the index on first use. Ids that no longer resolve to a chunk
    /// and its document are dropped from the results, not errors: a chunk
    /// deleted after indexing should not fail the whole query.
    pub fn search(&self, query: &str, k: usize) -> EngineResult<Vec<SearchHit>> {
        self.sync.ensure_ready()?;
        if self.sync.vector_count() == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let raw = self.sync.search(&query_vector, k)?;

        let mut hits = Vec::with_capacity(raw.len());
        for (chunk_id, score) in raw {
            match self.store.chunk_with_record(chunk_id)? {
                Some((chunk, record)) => hits.push(SearchHit {
                    chunk_id,
                    record_id: record.id,
                    ordinal: chunk.ordinal,
                    text: chunk.text,
                    title: record.title,
                    url: record.url,
                    origin: record.origin,
                    score,
                }),
                None => {
                    debug!(chunk = %chunk_id, "dropping hit with no resolvable metadata");
                }
            }
        }
        Ok(hits)
    }

    /// Answers a question grounded in the top `k` retrieved chunks.
    ///
    /// Retrieval failures propagate; generation and parsing failures
    /// degrade to [`DocumentAnswer::unavailable`] and never escape.
    pub fn answer(
        &self,
        question: &str,
        k: usize,
        model: &dyn GenerativeModel,
    ) -> EngineResult<(DocumentAnswer, Vec<SearchHit>)> {
        let hits = self.search(question, k)?;
        let contexts: Vec<String> = hits.iter().map(|h| h.text.clone()).collect();
        let prompt = generation::document_answer_prompt(question, &contexts);

        let answer = match model
            .generate(&prompt)
            .and_then(|raw| generation::parse_response::<DocumentAnswer>(&raw))
        {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("document answer fell back to fixed response: {e}");
                DocumentAnswer::unavailable()
            }
        };
        Ok((answer, hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embedding::MockEmbeddingProvider;
    use crate::generation::testing::{FailingModel, StaticModel};
    use crate::store::memory::MemoryDocumentStore;
    use crate::store::{ChunkCorpus, NewSourceRecord};
    use crate::vector::IndexPaths;
    use tempfile::TempDir;

    fn engine_with_docs(
        temp: &TempDir,
        docs: &[(&str, &str)],
    ) -> (DocumentSearchEngine<MemoryDocumentStore>, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        for (title, text) in docs {
            store
                .insert_record(NewSourceRecord {
                    title: title.to_string(),
                    text: text.to_string(),
                    url: Some(format!("https://example.test/{title}")),
                    origin: Some("fixture".to_string()),
                })
                .unwrap();
        }
        let embedder = Arc::new(MockEmbeddingProvider::new(48));
        let sync = Arc::new(IndexSyncManager::new(
            store.clone(),
            embedder.clone(),
            ChunkingConfig::default(),
            16,
            IndexPaths::in_dir(temp.path(), "docs"),
        ));
        (
            DocumentSearchEngine::new(store.clone(), embedder, sync),
            store,
        )
    }

    #[test]
    fn empty_corpus_returns_empty_results() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(&temp, &[]);
        let hits = engine.search("anything at all", 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_carry_resolved_metadata() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(
            &temp,
            &[
                ("Payroll", "Gross salary includes base pay and bonuses."),
                ("Leave", "Annual leave accrues monthly for all employees."),
            ],
        );

        let hits = engine
            .search("Gross salary includes base pay and bonuses.", 2)
            .unwrap();
        assert!(!hits.is_empty());
        let top = &hits[0];
        assert_eq!(top.title, "Payroll");
        assert_eq!(top.ordinal, 0);
        assert_eq!(top.origin.as_deref(), Some("fixture"));
        assert!(top.score.get() >= 0.99);
    }

    #[test]
    fn results_are_sorted_descending() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(
            &temp,
            &[
                ("A", "Completely unrelated gardening advice for tomatoes."),
                ("B", "Payroll tax withholding rules for monthly salaries."),
                ("C", "Another note about salaries and payroll deadlines."),
            ],
        );
        let hits = engine.search("payroll salaries", 3).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn answer_parses_model_json() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(&temp, &[("Doc", "Net salary is gross minus deductions.")]);
        let model = StaticModel::new(
            "```json\n{\"answer\": \"Net equals gross minus deductions.\", \"key_points\": [\"deductions\"], \"recommendations\": []}\n```",
        );
        let (answer, hits) = engine.answer("what is net salary?", 3, &model).unwrap();
        assert_eq!(answer.answer, "Net equals gross minus deductions.");
        assert_eq!(answer.key_points, vec!["deductions".to_string()]);
        assert!(!hits.is_empty());

        // The retrieved context made it into the prompt.
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Net salary is gross minus deductions."));
    }

    #[test]
    fn answer_degrades_when_generation_fails() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(&temp, &[("Doc", "Some indexed content here.")]);
        let (answer, _) = engine.answer("question", 3, &FailingModel).unwrap();
        assert!(answer.answer.contains("Analysis unavailable"));
    }

    #[test]
    fn answer_degrades_when_model_returns_prose() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine_with_docs(&temp, &[("Doc", "Some indexed content here.")]);
        let model = StaticModel::new("I'm sorry, I cannot produce JSON today.");
        let (answer, _) = engine.answer("question", 3, &model).unwrap();
        assert!(answer.answer.contains("Analysis unavailable"));
    }

    #[test]
    fn unresolvable_hits_are_dropped_not_fatal() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_record(NewSourceRecord {
                title: "Doc".to_string(),
                text: "Indexed text that will lose its chunk.".to_string(),
                url: None,
                origin: None,
            })
            .unwrap();
        let embedder = Arc::new(MockEmbeddingProvider::new(48));
        let sync = Arc::new(IndexSyncManager::new(
            store.clone(),
            embedder.clone(),
            ChunkingConfig::default(),
            16,
            IndexPaths::in_dir(temp.path(), "docs"),
        ));
        sync.ensure_ready().unwrap();

        // Rebuild the engine against a store that no longer has the chunk:
        // same index snapshot, different (empty) store.
        let empty_store = Arc::new(MemoryDocumentStore::new());
        let orphan_sync = Arc::new(IndexSyncManager::new(
            empty_store.clone(),
            embedder.clone(),
            ChunkingConfig::default(),
            16,
            IndexPaths::in_dir(temp.path(), "docs"),
        ));
        let engine = DocumentSearchEngine::new(empty_store, embedder, orphan_sync);
        let hits = engine
            .search("Indexed text that will lose its chunk.", 5)
            .unwrap();
        assert!(hits.is_empty());

        // The underlying store really is empty.
        assert!(store.embedded_chunks().unwrap().len() == 1);
    }
}
