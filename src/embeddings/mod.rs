// Embeddings module
// Chunk building and the encoder seam used by indexing and retrieval

pub mod chunking;

use anyhow::{Result, anyhow};

pub use chunking::{build_chunks, contact_chunk, estimate_token_count, faq_chunk, product_chunk};

/// Turns text into fixed-length vectors. Chunks and queries must go through
/// the same encoder so their vectors are comparable.
pub trait Embedder: Send + Sync {
    /// Identifier persisted with the index so a model switch can be detected
    fn model_name(&self) -> &str;

    /// Embed every text, returning one vector per input in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Encoder returned no embedding"))
    }
}
