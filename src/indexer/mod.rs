// Indexer module
// Builds the persisted index pair or reuses it when it is still valid

pub mod consistency;


use std::fmt;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::RagError;
use crate::config::{CachePolicy, Config};
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{IndexMeta, NewIndexMeta};
use crate::embeddings::Embedder;

pub use consistency::{ConsistencyReport, ConsistencyValidator, compare_positions};

/// Chunk texts addressed by index position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkTable {
    chunks: Vec<String>,
}

impl ChunkTable {
    #[inline]
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    #[inline]
    pub fn get(&self, position: u32) -> Option<&str> {
        self.chunks.get(position as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.chunks
    }
}

/// Why the index pair was (re)built instead of loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Forced,
    Missing,
    Inconsistent,
    DatasetChanged,
    ModelChanged,
}

impl fmt::Display for RebuildReason {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RebuildReason::Forced => write!(f, "rebuild requested"),
            RebuildReason::Missing => write!(f, "no persisted index"),
            RebuildReason::Inconsistent => write!(f, "persisted index is inconsistent"),
            RebuildReason::DatasetChanged => write!(f, "dataset changed"),
            RebuildReason::ModelChanged => write!(f, "embedding model changed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Loaded,
    Built(RebuildReason),
}

/// The index pair ready for retrieval
pub struct IndexHandle {
    pub vector_store: VectorStore,
    pub chunk_table: ChunkTable,
    pub meta: IndexMeta,
    pub source: IndexSource,
}

/// Hex SHA-256 of the chunk texts, each terminated by a newline
#[inline]
pub fn dataset_fingerprint(chunks: &[String]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Load the persisted index pair, or build it from `chunks`.
///
/// A complete, consistent pair is reused according to the configured cache
/// policy. Under `reuse` the persisted chunk table wins over `chunks` even if
/// the dataset changed. Anything else triggers a full build, which encodes
/// every chunk with `embedder` and replaces both artifacts.
#[inline]
pub async fn get_or_build_index(
    config: &Config,
    chunks: &[String],
    embedder: &dyn Embedder,
    force_rebuild: bool,
) -> Result<IndexHandle, RagError> {
    let database = open_chunk_database(config).await?;
    let mut vector_store = VectorStore::open(config).await?;

    let fingerprint = dataset_fingerprint(chunks);

    let decision = if force_rebuild {
        Some(RebuildReason::Forced)
    } else {
        check_persisted(
            &database,
            &vector_store,
            &fingerprint,
            embedder.model_name(),
            config.dataset.cache_policy,
        )
        .await?
    };

    if let Some(reason) = decision {
        info!("Building index: {}", reason);
        let meta = build_index(&database, &mut vector_store, chunks, &fingerprint, embedder).await?;
        database.close().await;
        return Ok(IndexHandle {
            vector_store,
            chunk_table: ChunkTable::new(chunks.to_vec()),
            meta,
            source: IndexSource::Built(reason),
        });
    }

    let meta = database
        .load_meta()
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))?
        .ok_or_else(|| RagError::Database("Index metadata disappeared".to_string()))?;
    let chunk_table = ChunkTable::new(
        database
            .load_chunks()
            .await
            .map_err(|e| RagError::Database(format!("{:#}", e)))?
            .into_iter()
            .map(|record| record.content)
            .collect(),
    );
    database.close().await;

    info!(
        "Loaded persisted index with {} chunks (built {})",
        chunk_table.len(),
        meta.built_at
    );

    Ok(IndexHandle {
        vector_store,
        chunk_table,
        meta,
        source: IndexSource::Loaded,
    })
}

/// Open the chunk table database in the configured data directory
#[inline]
pub async fn open_chunk_database(config: &Config) -> Result<Database, RagError> {
    Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))
}

/// Decide whether the persisted pair can be used. `None` means load it.
async fn check_persisted(
    database: &Database,
    vector_store: &VectorStore,
    fingerprint: &str,
    embedding_model: &str,
    policy: CachePolicy,
) -> Result<Option<RebuildReason>, RagError> {
    let meta = database
        .load_meta()
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))?;

    let Some(meta) = meta else {
        return Ok(Some(RebuildReason::Missing));
    };
    if !vector_store.has_index().await? {
        return Ok(Some(RebuildReason::Missing));
    }

    let report = ConsistencyValidator::new(database, vector_store)
        .validate_consistency()
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))?;
    if !report.is_consistent {
        return Ok(Some(RebuildReason::Inconsistent));
    }

    // Query vectors must come from the model that encoded the chunks
    if !meta.matches_model(embedding_model) {
        return Ok(Some(RebuildReason::ModelChanged));
    }

    if !meta.matches_dataset(fingerprint) {
        match policy {
            CachePolicy::RebuildOnChange => return Ok(Some(RebuildReason::DatasetChanged)),
            CachePolicy::Reuse => warn!(
                "Dataset changed since the index was built ({}); reusing the persisted chunk table",
                meta.short_fingerprint()
            ),
        }
    }

    debug!("Persisted index is usable");
    Ok(None)
}

async fn build_index(
    database: &Database,
    vector_store: &mut VectorStore,
    chunks: &[String],
    fingerprint: &str,
    embedder: &dyn Embedder,
) -> Result<IndexMeta, RagError> {
    // Until the new meta row is written the pair counts as incomplete
    database
        .clear_meta()
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))?;

    let bar = progress_spinner();
    let result = write_index(database, vector_store, chunks, fingerprint, embedder, &bar).await;
    bar.finish_and_clear();

    let meta = result?;
    info!(
        "Index built with {} chunks of dimension {}",
        meta.chunk_count, meta.dimension
    );
    Ok(meta)
}

async fn write_index(
    database: &Database,
    vector_store: &mut VectorStore,
    chunks: &[String],
    fingerprint: &str,
    embedder: &dyn Embedder,
    bar: &ProgressBar,
) -> Result<IndexMeta, RagError> {
    bar.set_message(format!(
        "Encoding {} chunks with {}",
        chunks.len(),
        embedder.model_name()
    ));

    let vectors = embedder
        .embed_batch(chunks)
        .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
    if vectors.len() != chunks.len() {
        return Err(RagError::Embedding(format!(
            "Encoder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    bar.set_message("Writing vector index");
    vector_store.replace_vectors(&vectors).await?;

    bar.set_message("Writing chunk table");
    let dimension = vector_store
        .dimension()
        .and_then(|dim| i64::try_from(dim).ok())
        .unwrap_or_default();
    database
        .replace_chunks(
            chunks,
            &NewIndexMeta {
                dataset_fingerprint: fingerprint.to_string(),
                embedding_model: embedder.model_name().to_string(),
                dimension,
            },
        )
        .await
        .map_err(|e| RagError::Database(format!("{:#}", e)))
}

fn progress_spinner() -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    }
}
