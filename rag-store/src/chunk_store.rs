//! Chunk store readers: position-addressed passage texts.
//!
//! Supported artifacts:
//! - `.json`  → array of strings or `{ "text": .. }` objects
//! - `.jsonl` → one string or `{ "text": .. }` object per line (empty lines skipped)
//!
//! Pickle files are rejected as unsupported.

use std::io::{BufRead, BufReader};
use std::{fs::File, path::Path};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{KnowledgeBaseError, RagError};

/// Row shapes accepted in both formats. Extra object fields are ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkRow {
    Text(String),
    Object { text: String },
}

impl From<ChunkRow> for String {
    fn from(row: ChunkRow) -> Self {
        match row {
            ChunkRow::Text(t) | ChunkRow::Object { text: t } => t,
        }
    }
}

/// Ordered chunk texts; position *i* pairs with index vector *i*.
#[derive(Clone, Debug, Default)]
pub struct ChunkStore {
    chunks: Vec<String>,
}

impl ChunkStore {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    /// Loads a chunk artifact, choosing the reader by extension.
    ///
    /// # Errors
    /// [`RagError::KnowledgeBase`] if the file is missing, unreadable,
    /// malformed, or a pickle.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        info!("Reading chunk store: {:?}", path);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let chunks = match ext.as_deref() {
            Some("pkl" | "pickle") => {
                return Err(KnowledgeBaseError::Unsupported {
                    path: path.to_path_buf(),
                    reason: "pickle chunk stores are not supported; export the chunks to JSON".into(),
                }
                .into());
            }
            Some("jsonl") => read_jsonl(path)?,
            _ => read_json_array(path)?,
        };

        debug!("Loaded {} chunks", chunks.len());
        Ok(Self { chunks })
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.chunks.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn read_json_array(path: &Path) -> Result<Vec<String>, RagError> {
    let file = File::open(path).map_err(|e| KnowledgeBaseError::from_io(path, e))?;
    let rows: Vec<ChunkRow> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| KnowledgeBaseError::corrupt(path, format!("invalid chunk array: {e}")))?;
    Ok(rows.into_iter().map(String::from).collect())
}

fn read_jsonl(path: &Path) -> Result<Vec<String>, RagError> {
    let file = File::open(path).map_err(|e| KnowledgeBaseError::from_io(path, e))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| KnowledgeBaseError::from_io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row: ChunkRow = serde_json::from_str(&line).map_err(|e| {
            KnowledgeBaseError::corrupt(path, format!("line {} parse error: {e}", i + 1))
        })?;
        out.push(row.into());
    }
    Ok(out)
}
