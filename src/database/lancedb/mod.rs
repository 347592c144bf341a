// LanceDB vector database module
// Stores one embedding per chunk position and answers flat L2 searches


pub mod vector_store;

pub use vector_store::VectorStore;

/// Name of the table holding chunk embeddings
pub const VECTOR_TABLE_NAME: &str = "chunk_vectors";

/// A nearest-neighbour hit: the chunk position and its L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorMatch {
    pub position: u32,
    pub distance: f32,
}

/// Order matches by ascending distance, breaking ties by ascending position
#[inline]
pub fn sort_matches(matches: &mut [VectorMatch]) {
    matches.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.position.cmp(&b.position))
    });
}
