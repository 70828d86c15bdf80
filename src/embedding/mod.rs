//! Embedding generation for chunks and queries.
//!
//! The engine talks to the embedding model through [`EmbeddingProvider`], so
//! stores and indexes never depend on a concrete model. The production
//! implementation wraps fastembed; tests use a deterministic mock.
//!
//! A failed embedding call is a hard failure. Substituting a zero or
//! degraded vector would silently corrupt every similarity ranking that
//! touches it, so callers must propagate the error instead.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};

use crate::vector::{VectorDimension, VectorError, codec};

/// Embedding settings, loaded from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Model identifier, e.g. `all-minilm-l6-v2`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Cache directory for downloaded model weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Batch size for bulk chunk embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_model() -> String {
    "all-minilm-l6-v2".to_string()
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_dir: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Resolves a configured model name to a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        other => Err(VectorError::EmbeddingFailed(format!(
            "unsupported embedding model '{other}'; expected all-minilm-l6-v2 or bge-small-en-v1.5"
        ))),
    }
}

/// Produces L2-normalized vectors of a model-fixed dimension from text.
///
/// Implementations are pure functions of their input text and must be
/// thread-safe; batch calls return one vector per input, in input order.
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors.pop().ok_or_else(|| {
            VectorError::EmbeddingFailed("model returned no vector for input".to_string())
        })
    }

    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> VectorDimension;
}

/// Fastembed-backed provider (all-MiniLM-L6-v2 by default, 384 dimensions).
///
/// The underlying model is not `Sync`, so it sits behind a `Mutex`; batch
/// calls amortize the lock.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
}

impl FastEmbedProvider {
    /// Initializes the provider from configuration.
    ///
    /// The first call on a machine downloads the model weights; failures
    /// surface as [`VectorError::EmbeddingFailed`] with the cause.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, VectorError> {
        let model_kind = parse_embedding_model(&config.model)?;
        let mut options = InitOptions::new(model_kind).with_show_download_progress(false);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        let model = TextEmbedding::try_new(options).map_err(|e| {
            VectorError::EmbeddingFailed(format!(
                "failed to initialize embedding model '{}': {e}. First-time use needs network access to download the weights",
                config.model
            ))
        })?;
        Ok(Self {
            model: Mutex::new(model),
            dimension: VectorDimension::default_model(),
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<String> = texts.iter().map(|&t| t.to_string()).collect();
        let mut vectors = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "embedding model lock poisoned by a previous panic".to_string(),
                )
            })?
            .embed(inputs, None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;

        for vector in &mut vectors {
            self.dimension.validate_vector(vector)?;
            // The model emits unit vectors; renormalize so the invariant
            // holds regardless of the model build.
            codec::l2_normalize(vector);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Deterministic provider for tests: hashes words into buckets.
///
/// Identical texts map to identical unit vectors, and texts sharing words
/// land near each other, which is all the engine tests need.
#[cfg(test)]
pub struct MockEmbeddingProvider {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dim).expect("test dimension"),
        }
    }
}

#[cfg(test)]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        use std::hash::{Hash, Hasher};

        let dim = self.dimension.get();
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut vector = vec![0.0f32; dim];
            for word in text.to_lowercase().split_whitespace() {
                let mut hasher = std::hash::DefaultHasher::new();
                word.hash(&mut hasher);
                vector[(hasher.finish() % dim as u64) as usize] += 1.0;
            }
            if vector.iter().all(|&v| v == 0.0) {
                vector[0] = 1.0;
            }
            codec::l2_normalize(&mut vector);
            out.push(vector);
        }
        Ok(out)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_vectors_are_unit_length() {
        let provider = MockEmbeddingProvider::new(16);
        let vectors = provider
            .embed_batch(&["backend engineer casablanca", "data analyst rabat"])
            .unwrap();
        assert_eq!(vectors.len(), 2);
        for vector in &vectors {
            assert_eq!(vector.len(), 16);
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn mock_is_deterministic() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed("software engineer | Casablanca").unwrap();
        let b = provider.embed("software engineer | Casablanca").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_text_scores_near_one() {
        let provider = MockEmbeddingProvider::new(32);
        let a = provider.embed("accountant rabat junior").unwrap();
        let b = provider.embed("accountant rabat junior").unwrap();
        let dot = codec::inner_product(&a, &b);
        assert!(dot >= 0.99);
    }

    #[test]
    fn model_name_parsing() {
        assert!(parse_embedding_model("all-minilm-l6-v2").is_ok());
        assert!(parse_embedding_model("BGE-Small-EN-v1.5").is_ok());
        assert!(parse_embedding_model("word2vec").is_err());
    }

    #[test]
    fn empty_batch_is_empty() {
        let provider = MockEmbeddingProvider::new(8);
        assert!(provider.embed_batch(&[]).unwrap().is_empty());
    }
}
