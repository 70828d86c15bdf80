//! Flat inner-product index over chunk embeddings.
//!
//! The index is a dense row-major matrix of unit-normalized vectors plus an
//! id-map: the ordered list of chunk ids whose vector occupies each row.
//! Search is brute force, O(n·d) per query, which is the right trade at the
//! corpus sizes this engine serves (hundreds to low thousands of chunks).
//!
//! # Snapshot Format
//!
//! A persisted index is two companion artifacts:
//! - a binary blob: magic bytes, format version, dimension, row count, then
//!   contiguous little-endian f32 rows
//! - a JSON array of chunk ids in row order
//!
//! Loading requires both files; an id-map whose length disagrees with the
//! blob's row count is rejected.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use tracing::{debug, warn};

use crate::vector::codec;
use crate::vector::types::{ChunkId, Score, VectorDimension, VectorError};

/// Magic bytes identifying a wagescope vector blob.
const SNAPSHOT_MAGIC: &[u8; 4] = b"WVEC";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Size of the blob header in bytes: magic, version, dimension, row count.
const HEADER_SIZE: usize = 16;

/// Locations of the two snapshot artifacts for one index instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    /// Binary vector blob.
    pub blob: PathBuf,
    /// JSON id-map, one id per index row.
    pub id_map: PathBuf,
}

impl IndexPaths {
    /// Conventional artifact names for a named index inside a data directory.
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            blob: dir.join(format!("{name}.vec")),
            id_map: dir.join(format!("{name}.map.json")),
        }
    }

    /// True when both artifacts exist on disk.
    #[must_use]
    pub fn exist(&self) -> bool {
        self.blob.exists() && self.id_map.exists()
    }
}

/// In-memory flat index: vector rows and the parallel id-map.
#[derive(Debug, Clone)]
pub struct FlatVectorIndex {
    dimension: VectorDimension,
    /// Row-major vector data, `id_map.len() * dimension` values.
    data: Vec<f32>,
    id_map: Vec<ChunkId>,
}

impl FlatVectorIndex {
    /// Builds an index from `(chunk id, vector)` rows.
    ///
    /// Every vector is L2-normalized so the inner product at query time is
    /// cosine similarity. Rows whose dimension disagrees with `dimension`
    /// are dropped with a warning and the build continues; they are never
    /// truncated or padded.
    pub fn build(
        dimension: VectorDimension,
        rows: impl IntoIterator<Item = (ChunkId, Vec<f32>)>,
    ) -> Self {
        let mut data = Vec::new();
        let mut id_map = Vec::new();
        for (id, mut vector) in rows {
            if let Err(e) = dimension.validate_vector(&vector) {
                warn!(chunk = %id, "dropping vector row: {e}");
                continue;
            }
            codec::l2_normalize(&mut vector);
            data.extend_from_slice(&vector);
            id_map.push(id);
        }
        debug!(vectors = id_map.len(), dim = dimension.get(), "index built");
        Self {
            dimension,
            data,
            id_map,
        }
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.id_map.len()
    }

    /// True when the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }

    /// Dimension shared by every row.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// The id-map in row order.
    #[must_use]
    pub fn ids(&self) -> &[ChunkId] {
        &self.id_map
    }

    /// Returns the `k` nearest chunk ids by inner product.
    ///
    /// Results are sorted by descending score; equal scores keep ascending
    /// row order, so repeated queries return an identical ranking. Returns
    /// fewer than `k` hits when the index holds fewer vectors, and an empty
    /// list for an empty index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, Score)>, VectorError> {
        self.dimension.validate_vector(query)?;
        if self.id_map.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let dim = self.dimension.get();
        let mut scored: Vec<(usize, Score)> = self
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(row, vector)| (row, Score::clamped(codec::inner_product(query, vector))))
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, score)| (self.id_map[row], score))
            .collect())
    }

    /// Writes the snapshot artifacts.
    ///
    /// The blob and the id-map are written whole-file; callers serialize
    /// writers through [`crate::sync::IndexSyncManager`].
    pub fn persist(&self, paths: &IndexPaths) -> Result<(), VectorError> {
        for path in [&paths.blob, &paths.id_map] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut blob = File::create(&paths.blob)?;
        blob.write_all(SNAPSHOT_MAGIC)?;
        blob.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        blob.write_all(&(self.dimension.get() as u32).to_le_bytes())?;
        blob.write_all(&(self.id_map.len() as u32).to_le_bytes())?;
        blob.write_all(&codec::encode_vector(&self.data))?;
        blob.flush()?;

        let ids: Vec<u32> = self.id_map.iter().map(ChunkId::get).collect();
        let json = serde_json::to_string(&ids)
            .map_err(|e| VectorError::InvalidSnapshot(format!("id-map serialization: {e}")))?;
        std::fs::write(&paths.id_map, json)?;

        debug!(
            vectors = self.id_map.len(),
            blob = %paths.blob.display(),
            "index snapshot persisted"
        );
        Ok(())
    }

    /// Loads a snapshot from its two artifacts.
    ///
    /// Fails if either file is missing or unreadable, the header is not a
    /// supported wagescope blob, or the id-map length disagrees with the
    /// blob's row count. Callers treat any failure as "no index".
    pub fn load(paths: &IndexPaths) -> Result<Self, VectorError> {
        let file = File::open(&paths.blob)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        if mmap.len() < HEADER_SIZE {
            return Err(VectorError::InvalidSnapshot(
                "blob too small to contain a header".to_string(),
            ));
        }
        if &mmap[0..4] != SNAPSHOT_MAGIC {
            return Err(VectorError::InvalidSnapshot(
                "unrecognized magic bytes".to_string(),
            ));
        }
        let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                actual: version,
            });
        }
        let dim = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
        let dimension = VectorDimension::new(dim)?;
        let count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

        let expected_len = HEADER_SIZE + count * dim * codec::BYTES_PER_COMPONENT;
        if mmap.len() != expected_len {
            return Err(VectorError::InvalidSnapshot(format!(
                "blob length {} does not match header (expected {expected_len})",
                mmap.len()
            )));
        }

        let mut data = Vec::with_capacity(count * dim);
        for row in mmap[HEADER_SIZE..].chunks_exact(dim * codec::BYTES_PER_COMPONENT) {
            data.extend_from_slice(&codec::decode_vector(row, dimension)?);
        }

        let raw_ids = std::fs::read_to_string(&paths.id_map)?;
        let ids: Vec<u32> = serde_json::from_str(&raw_ids)
            .map_err(|e| VectorError::InvalidSnapshot(format!("id-map parse: {e}")))?;
        if ids.len() != count {
            return Err(VectorError::IdMapMismatch {
                id_count: ids.len(),
                vector_count: count,
            });
        }
        let id_map: Vec<ChunkId> = ids
            .into_iter()
            .map(|id| {
                ChunkId::new(id)
                    .ok_or_else(|| VectorError::InvalidSnapshot("zero id in id-map".to_string()))
            })
            .collect::<Result<_, _>>()?;

        debug!(vectors = count, dim, "index snapshot loaded");
        Ok(Self {
            dimension,
            data,
            id_map,
        })
    }
}
