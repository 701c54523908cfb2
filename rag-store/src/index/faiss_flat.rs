//! Reader for FAISS `IndexFlat` files written by `faiss.write_index`.
//!
//! Layout (little-endian):
//!
//! ```text
//! fourcc      "IxF2" (L2) | "IxFI" (inner product) | "IxFl" (metric from header)
//! d           i32
//! ntotal      i64
//! dummy       i64 x2
//! is_trained  u8
//! metric_type i32    0 = inner product, 1 = L2
//! metric_arg  f32    only when metric_type > 1
//! count       u64    number of floats, must equal d * ntotal
//! data        f32 x count
//! ```

use std::path::Path;

use crate::errors::{KnowledgeBaseError, RagError};
use crate::index::{Metric, VectorIndex};

const METRIC_INNER_PRODUCT: i32 = 0;
const METRIC_L2: i32 = 1;

pub(super) fn parse(path: &Path, bytes: &[u8]) -> Result<VectorIndex, RagError> {
    let corrupt = |reason: &str| KnowledgeBaseError::corrupt(path, reason);
    let mut r = Reader { bytes, pos: 0 };

    let magic = r.take(4).ok_or_else(|| corrupt("file shorter than header"))?;
    let fourcc_metric = match magic {
        b"IxF2" => Some(Metric::L2),
        b"IxFI" => Some(Metric::InnerProduct),
        b"IxFl" => None,
        other => {
            return Err(KnowledgeBaseError::Unsupported {
                path: path.to_path_buf(),
                reason: format!(
                    "index type `{}` is not a flat index",
                    String::from_utf8_lossy(other)
                ),
            }
            .into());
        }
    };

    let truncated = || corrupt("truncated header");
    let d = r.i32().ok_or_else(truncated)?;
    let ntotal = r.i64().ok_or_else(truncated)?;
    r.take(16).ok_or_else(truncated)?; // two dummy idx_t
    r.take(1).ok_or_else(truncated)?; // is_trained
    let metric_type = r.i32().ok_or_else(truncated)?;
    if metric_type > 1 {
        r.take(4).ok_or_else(truncated)?; // metric_arg
    }

    let header_metric = match metric_type {
        METRIC_INNER_PRODUCT => Metric::InnerProduct,
        METRIC_L2 => Metric::L2,
        other => {
            return Err(KnowledgeBaseError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("metric type {other} is not supported"),
            }
            .into());
        }
    };
    let metric = fourcc_metric.unwrap_or(header_metric);

    if d <= 0 || ntotal < 0 {
        return Err(corrupt(&format!("invalid shape d={d} ntotal={ntotal}")).into());
    }
    let (d, ntotal) = (d as usize, ntotal as usize);

    let count = r.u64().ok_or_else(|| corrupt("missing vector count"))? as usize;
    if Some(count) != d.checked_mul(ntotal) {
        return Err(corrupt(&format!(
            "vector payload holds {count} floats, expected {d} x {ntotal}"
        ))
        .into());
    }

    let raw = count
        .checked_mul(4)
        .and_then(|n| r.take(n))
        .ok_or_else(|| corrupt("truncated vector payload"))?;
    let data = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    VectorIndex::new(d, metric, data)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_le_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }
}

/// Serializes `rows` the way `faiss.write_index(IndexFlatL2/IP)` does.
#[cfg(test)]
pub(crate) fn encode(metric: Metric, rows: &[Vec<f32>]) -> Vec<u8> {
    let d = rows.first().map(Vec::len).unwrap_or(0);
    let mut out = Vec::new();
    out.extend_from_slice(match metric {
        Metric::L2 => b"IxF2",
        Metric::InnerProduct => b"IxFI",
    });
    out.extend_from_slice(&(d as i32).to_le_bytes());
    out.extend_from_slice(&(rows.len() as i64).to_le_bytes());
    out.extend_from_slice(&(1i64 << 20).to_le_bytes());
    out.extend_from_slice(&(1i64 << 20).to_le_bytes());
    out.push(1);
    let mt = match metric {
        Metric::L2 => METRIC_L2,
        Metric::InnerProduct => METRIC_INNER_PRODUCT,
    };
    out.extend_from_slice(&mt.to_le_bytes());
    out.extend_from_slice(&((d * rows.len()) as u64).to_le_bytes());
    for v in rows.iter().flatten() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> &'static Path {
        Path::new("test.faiss")
    }

    #[test]
    fn reads_l2_and_ip_flat_indexes() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];

        let idx = parse(p(), &encode(Metric::L2, &rows)).unwrap();
        assert_eq!((idx.dim(), idx.len(), idx.metric()), (3, 2, Metric::L2));
        assert_eq!(idx.search(&[4.0, 5.0, 6.0], 1).unwrap()[0].position, 1);

        let idx = parse(p(), &encode(Metric::InnerProduct, &rows)).unwrap();
        assert_eq!(idx.metric(), Metric::InnerProduct);
    }

    #[test]
    fn generic_flat_takes_metric_from_header() {
        let mut bytes = encode(Metric::InnerProduct, &[vec![1.0]]);
        bytes[..4].copy_from_slice(b"IxFl");
        assert_eq!(parse(p(), &bytes).unwrap().metric(), Metric::InnerProduct);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let bytes = encode(Metric::L2, &[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let err = parse(p(), &bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(
            err,
            RagError::KnowledgeBase(KnowledgeBaseError::Corrupt { .. })
        ));
        assert!(parse(p(), &bytes[..10]).is_err());
    }

    #[test]
    fn non_flat_index_is_unsupported() {
        let mut bytes = encode(Metric::L2, &[vec![1.0]]);
        bytes[..4].copy_from_slice(b"IHNf");
        assert!(matches!(
            parse(p(), &bytes).unwrap_err(),
            RagError::KnowledgeBase(KnowledgeBaseError::Unsupported { .. })
        ));
    }

    #[test]
    fn count_must_match_shape() {
        let mut bytes = encode(Metric::L2, &[vec![1.0, 2.0]]);
        // count field sits right after the 4+4+8+16+1+4 byte header
        bytes[37..45].copy_from_slice(&3u64.to_le_bytes());
        assert!(parse(p(), &bytes).is_err());
    }
}
