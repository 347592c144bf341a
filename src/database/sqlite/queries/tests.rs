use super::*;
use crate::database::sqlite::Database;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

fn new_meta() -> NewIndexMeta {
    NewIndexMeta {
        dataset_fingerprint: "abc123".to_string(),
        embedding_model: "all-minilm:latest".to_string(),
        dimension: 3,
    }
}

fn chunks(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| (*t).to_string()).collect()
}

#[tokio::test]
async fn replace_all_writes_chunks_and_meta() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();

    let stored = ChunkQueries::replace_all(pool, &chunks(&["a", "b", "c"]), &new_meta()).await?;
    assert_eq!(stored.chunk_count, 3);

    let records = ChunkQueries::list_all(pool).await?;
    let positions: Vec<i64> = records.iter().map(|r| r.position).collect();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(contents, vec!["a", "b", "c"]);

    let meta = IndexMetaQueries::get(pool).await?.expect("meta should exist");
    assert_eq!(meta.dataset_fingerprint, stored.dataset_fingerprint);
    assert_eq!(meta.embedding_model, "all-minilm:latest");
    assert_eq!(meta.chunk_count, 3);
    assert_eq!(meta.dimension, 3);

    Ok(())
}

#[tokio::test]
async fn replace_all_discards_previous_rows() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();

    ChunkQueries::replace_all(pool, &chunks(&["a", "b", "c"]), &new_meta()).await?;
    let second = NewIndexMeta {
        dataset_fingerprint: "def456".to_string(),
        ..new_meta()
    };
    ChunkQueries::replace_all(pool, &chunks(&["z"]), &second).await?;

    assert_eq!(ChunkQueries::count(pool).await?, 1);
    let rows = ChunkQueries::list_all(pool).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].position, 0);
    assert_eq!(rows[0].content, "z");

    let meta = IndexMetaQueries::get(pool).await?.expect("meta should exist");
    assert_eq!(meta.dataset_fingerprint, "def456");
    assert_eq!(meta.chunk_count, 1);

    Ok(())
}

#[tokio::test]
async fn empty_database_has_no_meta() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    assert!(IndexMetaQueries::get(database.pool()).await?.is_none());
    assert_eq!(ChunkQueries::count(database.pool()).await?, 0);

    Ok(())
}

#[tokio::test]
async fn clear_removes_only_meta() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();

    ChunkQueries::replace_all(pool, &chunks(&["a", "b"]), &new_meta()).await?;
    IndexMetaQueries::clear(pool).await?;

    assert!(IndexMetaQueries::get(pool).await?.is_none());
    assert_eq!(ChunkQueries::count(pool).await?, 2);

    Ok(())
}

#[tokio::test]
async fn chunk_text_round_trips_unicode() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();

    let text = "Starting Price: ₹122720 | Colors: N/A";
    ChunkQueries::replace_all(pool, &chunks(&[text]), &new_meta()).await?;

    let records = ChunkQueries::list_all(pool).await?;
    assert_eq!(records[0].content, text);

    Ok(())
}
