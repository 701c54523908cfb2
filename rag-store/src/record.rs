//! Core data models used by the library.

use serde::Serialize;

/// One retrieval hit: the chunk at `position` and its distance to the query.
///
/// Smaller `distance` is closer for every metric.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub position: usize,
    pub distance: f32,
    pub text: String,
}

/// Nearest-neighbour result from the vector index, before chunk lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}
