#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

pub struct ChunkQueries;

impl ChunkQueries {
    /// All chunks ordered by position
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ChunkRecord>> {
        sqlx::query_as::<_, ChunkRecord>("SELECT position, content FROM chunks ORDER BY position")
            .fetch_all(pool)
            .await
            .context("Failed to list chunks")
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")
    }

    /// Replace every chunk and the build metadata in one transaction.
    ///
    /// The metadata row is written last, so it only exists for a table that
    /// was written completely.
    #[inline]
    pub async fn replace_all(
        pool: &SqlitePool,
        chunks: &[String],
        meta: &NewIndexMeta,
    ) -> Result<IndexMeta> {
        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin transaction for chunk table replace")?;

        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *transaction)
            .await
            .context("Failed to clear index metadata")?;

        sqlx::query("DELETE FROM chunks")
            .execute(&mut *transaction)
            .await
            .context("Failed to clear chunks")?;

        for (position, content) in chunks.iter().enumerate() {
            let position = i64::try_from(position).context("Chunk position out of range")?;
            sqlx::query("INSERT INTO chunks (position, content) VALUES (?, ?)")
                .bind(position)
                .bind(content)
                .execute(&mut *transaction)
                .await
                .with_context(|| format!("Failed to insert chunk {}", position))?;
        }

        let stored = IndexMeta {
            dataset_fingerprint: meta.dataset_fingerprint.clone(),
            embedding_model: meta.embedding_model.clone(),
            dimension: meta.dimension,
            chunk_count: i64::try_from(chunks.len()).context("Chunk count out of range")?,
            built_at: Utc::now().naive_utc(),
        };

        sqlx::query(
            r#"
            INSERT INTO index_meta (id, dataset_fingerprint, embedding_model, dimension, chunk_count, built_at)
            VALUES (1, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.dataset_fingerprint)
        .bind(&stored.embedding_model)
        .bind(stored.dimension)
        .bind(stored.chunk_count)
        .bind(stored.built_at)
        .execute(&mut *transaction)
        .await
        .context("Failed to write index metadata")?;

        transaction
            .commit()
            .await
            .context("Failed to commit chunk table replace transaction")?;

        debug!("Stored {} chunks", chunks.len());
        Ok(stored)
    }
}

pub struct IndexMetaQueries;

impl IndexMetaQueries {
    #[inline]
    pub async fn get(pool: &SqlitePool) -> Result<Option<IndexMeta>> {
        sqlx::query_as::<_, IndexMeta>(
            r#"
            SELECT dataset_fingerprint, embedding_model, dimension, chunk_count, built_at
            FROM index_meta WHERE id = 1
            "#,
        )
        .fetch_optional(pool)
        .await
        .context("Failed to get index metadata")
    }

    /// Forget the last build so the pair is treated as incomplete
    #[inline]
    pub async fn clear(pool: &SqlitePool) -> Result<()> {
        sqlx::query("DELETE FROM index_meta")
            .execute(pool)
            .await
            .context("Failed to clear index metadata")?;
        Ok(())
    }
}
