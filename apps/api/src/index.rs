//! Vector Index — exact L2 search over job-offer embeddings.
//!
//! Every vector is stored next to the document it was computed from, so a hit
//! position maps straight back to `(id, text)`. Snapshots are written with bincode
//! to a temp file and renamed into place.

use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{documents} documents but {vectors} vectors")]
    LengthMismatch { documents: usize, vectors: usize },

    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dim: Option<usize>,
    /// Row-major, `len * dim` floats.
    vectors: Vec<f32>,
    documents: Vec<IndexedDocument>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn document(&self, position: usize) -> Option<&IndexedDocument> {
        self.documents.get(position)
    }

    /// Appends documents with their embeddings. The first add fixes the dimension.
    pub fn add(
        &mut self,
        documents: Vec<IndexedDocument>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        if documents.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                documents: documents.len(),
                vectors: vectors.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let expected = self.dim.unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        self.dim = Some(expected);
        self.vectors.extend(vectors.into_iter().flatten());
        self.documents.extend(documents);
        Ok(())
    }

    /// Returns up to `k` `(distances, positions)` ordered by ascending squared L2
    /// distance. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<(Vec<f32>, Vec<usize>), IndexError> {
        let Some(dim) = self.dim else {
            return Ok((Vec::new(), Vec::new()));
        };
        if query.len() != dim {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(dim)
            .enumerate()
            .map(|(position, vector)| (squared_l2(query, vector), position))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored.into_iter().unzip())
    }

    /// Writes a snapshot to a fresh temp file in the target directory, then renames
    /// it over `path`. Concurrent saves never share a temp file.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let data = bincode::serialize(self)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&data)?;
        temp.persist(path).map_err(|e| IndexError::Io(e.error))?;
        info!("Saved vector index ({} vectors) to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let data = fs::read(path)?;
        let index: VectorIndex = bincode::deserialize(&data)?;
        info!("Loaded vector index ({} vectors) from {}", index.len(), path.display());
        Ok(index)
    }

    /// Like `load`, but a missing file yields an empty index.
    pub fn load_or_empty(path: &Path) -> Result<Self, IndexError> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No vector index at {}; starting empty", path.display());
            Ok(Self::new())
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
