//! Immutable flat (exact) vector index.
//!
//! Vectors are stored row-major; row *i* belongs to chunk *i*. Search is an
//! exhaustive scan, which is what a FAISS `IndexFlat*` does as well.

mod faiss_flat;
mod json_index;

#[cfg(test)]
pub(crate) use faiss_flat::encode as faiss_flat_bytes;

use std::path::Path;

use tracing::debug;

use crate::errors::{KnowledgeBaseError, RagError};
use crate::record::Neighbor;

/// Distance metric of the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Squared Euclidean distance.
    L2,
    /// Inner product; reported as `-dot` so smaller is closer.
    InnerProduct,
}

impl Metric {
    fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Metric::InnerProduct => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VectorIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Builds an index from row-major `data`.
    ///
    /// # Errors
    /// [`RagError::Config`] if `dim == 0` or `data.len()` is not a multiple of `dim`.
    pub fn new(dim: usize, metric: Metric, data: Vec<f32>) -> Result<Self, RagError> {
        if dim == 0 {
            return Err(RagError::Config("index dimension must be > 0".into()));
        }
        if data.len() % dim != 0 {
            return Err(RagError::Config(format!(
                "{} floats cannot be split into rows of {dim}",
                data.len()
            )));
        }
        Ok(Self { dim, metric, data })
    }

    /// Convenience constructor from rows; all rows must have the same length.
    pub fn from_rows(metric: Metric, rows: &[Vec<f32>]) -> Result<Self, RagError> {
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(RagError::VectorSizeMismatch {
                got: bad.len(),
                want: dim,
            });
        }
        Self::new(dim, metric, rows.concat())
    }

    /// Loads an index artifact, choosing the reader by file extension
    /// (`.json` → JSON index, anything else → FAISS flat binary).
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let bytes = std::fs::read(path).map_err(|e| KnowledgeBaseError::from_io(path, e))?;
        let index = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => json_index::parse(path, &bytes)?,
            _ => faiss_flat::parse(path, &bytes)?,
        };
        debug!(
            path = ?path,
            dim = index.dim,
            vectors = index.len(),
            metric = ?index.metric,
            "vector index loaded"
        );
        Ok(index)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns up to `k` nearest rows, nearest first.
    ///
    /// Ties keep insertion order (lower position first).
    ///
    /// # Errors
    /// [`RagError::VectorSizeMismatch`] if `query.len() != self.dim()`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RagError> {
        if query.len() != self.dim {
            return Err(RagError::VectorSizeMismatch {
                got: query.len(),
                want: self.dim,
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut all: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: self.metric.distance(query, row),
            })
            .collect();

        // Stable sort keeps equal distances in position order.
        all.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        all.truncate(k);
        Ok(all)
    }
}
