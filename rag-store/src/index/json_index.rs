//! JSON index artifact: `{"metric": "l2" | "ip", "dim": n, "vectors": [[..], ..]}`.

use std::path::Path;

use serde::Deserialize;

use crate::errors::{KnowledgeBaseError, RagError};
use crate::index::{Metric, VectorIndex};

#[derive(Deserialize)]
struct JsonIndex {
    #[serde(default = "default_metric")]
    metric: String,
    #[serde(default)]
    dim: Option<usize>,
    vectors: Vec<Vec<f32>>,
}

fn default_metric() -> String {
    "l2".into()
}

pub(super) fn parse(path: &Path, bytes: &[u8]) -> Result<VectorIndex, RagError> {
    let raw: JsonIndex = serde_json::from_slice(bytes)
        .map_err(|e| KnowledgeBaseError::corrupt(path, format!("invalid JSON index: {e}")))?;

    let metric = match raw.metric.to_ascii_lowercase().as_str() {
        "l2" => Metric::L2,
        "ip" | "inner_product" | "dot" => Metric::InnerProduct,
        other => {
            return Err(KnowledgeBaseError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("metric `{other}` is not supported"),
            }
            .into());
        }
    };

    let dim = raw
        .dim
        .or_else(|| raw.vectors.first().map(Vec::len))
        .unwrap_or(0);
    if dim == 0 {
        return Err(KnowledgeBaseError::corrupt(path, "dimension is zero or unknown").into());
    }
    if let Some((i, v)) = raw.vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(KnowledgeBaseError::corrupt(
            path,
            format!("vector {i} has {} values, expected {dim}", v.len()),
        )
        .into());
    }

    VectorIndex::new(dim, metric, raw.vectors.concat())
}
