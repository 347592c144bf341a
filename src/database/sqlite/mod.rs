use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{ChunkRecord, IndexMeta, NewIndexMeta};
use crate::database::sqlite::queries::{ChunkQueries, IndexMetaQueries};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// File name of the chunk table database inside the data directory
pub const CHUNK_DATABASE_FILE: &str = "chunks.db";

/// The chunk table and the metadata of the build that wrote it
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join(CHUNK_DATABASE_FILE);

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(&db_path).await
    }

    // Chunk table operations
    pub async fn load_chunks(&self) -> Result<Vec<ChunkRecord>> {
        ChunkQueries::list_all(&self.pool).await
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        ChunkQueries::count(&self.pool).await
    }

    pub async fn replace_chunks(&self, chunks: &[String], meta: &NewIndexMeta) -> Result<IndexMeta> {
        let stored = ChunkQueries::replace_all(&self.pool, chunks, meta).await?;
        info!("Chunk table replaced with {} chunks", stored.chunk_count);
        Ok(stored)
    }

    // Build metadata operations
    pub async fn load_meta(&self) -> Result<Option<IndexMeta>> {
        IndexMetaQueries::get(&self.pool).await
    }

    pub async fn clear_meta(&self) -> Result<()> {
        IndexMetaQueries::clear(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
