// Retrieval module
// Nearest-chunk lookup for a query over the loaded index pair


use std::sync::Arc;

use tracing::debug;

use crate::RagError;
use crate::database::lancedb::VectorStore;
use crate::embeddings::Embedder;
use crate::indexer::{ChunkTable, IndexHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub position: u32,
    pub text: String,
    pub distance: f32,
}

/// Everything a query needs: the index, the chunk texts, and the encoder
/// that produced the index vectors.
pub struct Retriever {
    vector_store: Arc<VectorStore>,
    chunk_table: Arc<ChunkTable>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    #[inline]
    pub fn new(
        vector_store: Arc<VectorStore>,
        chunk_table: Arc<ChunkTable>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            vector_store,
            chunk_table,
            embedder,
        }
    }

    #[inline]
    pub fn from_index(index: IndexHandle, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            Arc::new(index.vector_store),
            Arc::new(index.chunk_table),
            embedder,
        )
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_table.len()
    }

    /// The `k` chunks nearest to `query`, closest first
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        let k = k.min(self.chunk_table.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(query)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let matches = self.vector_store.search(&query_vector, k).await?;

        let retrieved = matches
            .into_iter()
            .map(|hit| {
                let text = self.chunk_table.get(hit.position).ok_or_else(|| {
                    RagError::Database(format!(
                        "Vector position {} has no chunk ({} chunks loaded)",
                        hit.position,
                        self.chunk_table.len()
                    ))
                })?;
                Ok(RetrievedChunk {
                    position: hit.position,
                    text: text.to_string(),
                    distance: hit.distance,
                })
            })
            .collect::<Result<Vec<_>, RagError>>()?;

        debug!("Retrieved {} chunks for query", retrieved.len());
        Ok(retrieved)
    }

    /// Texts of the `k` nearest chunks, closest first
    #[inline]
    pub async fn retrieve_texts(&self, query: &str, k: usize) -> Result<Vec<String>, RagError> {
        Ok(self
            .retrieve(query, k)
            .await?
            .into_iter()
            .map(|chunk| chunk.text)
            .collect())
    }
}
