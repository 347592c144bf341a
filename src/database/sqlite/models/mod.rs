
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChunkRecord {
    pub position: i64,
    pub content: String,
}

/// Metadata written as the last step of a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexMeta {
    pub dataset_fingerprint: String,
    pub embedding_model: String,
    pub dimension: i64,
    pub chunk_count: i64,
    pub built_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIndexMeta {
    pub dataset_fingerprint: String,
    pub embedding_model: String,
    pub dimension: i64,
}

impl IndexMeta {
    #[inline]
    pub fn matches_dataset(&self, fingerprint: &str) -> bool {
        self.dataset_fingerprint == fingerprint
    }

    #[inline]
    pub fn matches_model(&self, embedding_model: &str) -> bool {
        self.embedding_model == embedding_model
    }

    /// First 12 characters of the fingerprint, for display
    #[inline]
    pub fn short_fingerprint(&self) -> &str {
        self.dataset_fingerprint
            .get(..12)
            .unwrap_or(&self.dataset_fingerprint)
    }
}
