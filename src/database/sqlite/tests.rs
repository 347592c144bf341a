use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = ["chunks", "index_meta"].into_iter().collect();

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn database_file_lives_in_config_dir() -> Result<()> {
    let (temp_dir, _database) = create_test_database().await?;

    assert!(temp_dir.path().join(CHUNK_DATABASE_FILE).exists());

    Ok(())
}

#[tokio::test]
async fn reopen_keeps_chunks_and_meta() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let chunks = vec!["first".to_string(), "second".to_string()];
    let meta = NewIndexMeta {
        dataset_fingerprint: "fp".to_string(),
        embedding_model: "all-minilm:latest".to_string(),
        dimension: 384,
    };

    {
        let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
        database.replace_chunks(&chunks, &meta).await?;
        database.close().await;
    }

    let reopened = Database::initialize_from_config_dir(temp_dir.path()).await?;
    let loaded: Vec<String> = reopened
        .load_chunks()
        .await?
        .into_iter()
        .map(|r| r.content)
        .collect();
    assert_eq!(loaded, chunks);
    assert_eq!(reopened.chunk_count().await?, 2);

    let stored = reopened.load_meta().await?.expect("meta should persist");
    assert_eq!(stored.dimension, 384);

    reopened.clear_meta().await?;
    assert!(reopened.load_meta().await?.is_none());

    Ok(())
}
