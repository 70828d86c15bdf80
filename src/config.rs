//! Layered configuration for the engine.
//!
//! Settings resolve in order: built-in defaults, then a `wagescope.toml`
//! file, then environment variables. Environment variables are prefixed
//! with `WS_` and use double underscores for nesting:
//! - `WS_DATA_DIR=/var/lib/wagescope` sets `data_dir`
//! - `WS_CHUNKING__MAX_CHARS=800` sets `chunking.max_chars`
//! - `WS_EMBEDDING__MODEL=bge-small-en-v1.5` sets `embedding.model`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunking::ChunkingConfig;
use crate::embedding::EmbeddingConfig;
use crate::error::{EngineError, EngineResult};
use crate::vector::IndexPaths;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "wagescope.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding index snapshots and store files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Chunking parameters.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query-side settings.
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Hits returned when the caller does not pick a limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Candidates pulled per scope during tiered salary search.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Context chunks retrieved for grounded answers.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
}

fn default_version() -> u32 {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".wagescope")
}

fn default_limit() -> usize {
    6
}

fn default_candidate_pool() -> usize {
    200
}

fn default_context_chunks() -> usize {
    6
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            candidate_pool: default_candidate_pool(),
            context_chunks: default_context_chunks(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `wagescope.toml`, and `WS_*` env vars.
    pub fn load() -> EngineResult<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads settings with an explicit config file path.
    pub fn load_from(config_file: &Path) -> EngineResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("WS_").split("__"))
            .extract()
            .map_err(|e| EngineError::Config {
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.chunking.max_chars == 0 {
            return Err(EngineError::Config {
                reason: "chunking.max_chars must be positive".to_string(),
            });
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(EngineError::Config {
                reason: format!(
                    "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                    self.chunking.overlap_chars, self.chunking.max_chars
                ),
            });
        }
        if self.search.candidate_pool == 0 {
            return Err(EngineError::Config {
                reason: "search.candidate_pool must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Snapshot artifact paths for a named index under the data directory.
    #[must_use]
    pub fn index_paths(&self, name: &str) -> IndexPaths {
        IndexPaths::in_dir(&self.data_dir, name)
    }
}
