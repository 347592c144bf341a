
use super::{VECTOR_TABLE_NAME, VectorMatch, sort_matches};
use crate::{RagError, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Persisted embedding index, searched exhaustively by L2 distance
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Open the vector store under the configured data directory
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, RagError> {
        Self::open_at(&config.vector_database_path()).await
    }

    /// Open (or create) a vector store rooted at `db_path`
    ///
    /// # Arguments
    /// * `db_path` - Directory that holds the LanceDB dataset
    ///
    /// # Returns
    /// * `Result<Self, RagError>` - Store with its vector dimension detected, if a table exists
    #[inline]
    pub async fn open_at(db_path: &Path) -> Result<Self, RagError> {
        debug!("Opening LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        RagError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(RagError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: VECTOR_TABLE_NAME.to_string(),
            vector_dimension: None,
        };

        if store.has_index().await? {
            let dim = store.detect_existing_vector_dimension().await?;
            debug!("Detected existing vector dimension: {}", dim);
            store.vector_dimension = Some(dim);
        }

        Ok(store)
    }

    /// Whether a vector table has been persisted
    #[inline]
    pub async fn has_index(&self) -> Result<bool, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Dimension of the stored vectors, once a table exists
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, RagError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        RagError::Database(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("position", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim,
                ),
                false,
            ),
        ]))
    }

    async fn open_table(&self) -> Result<lancedb::Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Replace the whole index with `vectors`; vector `i` is stored at position `i`
    ///
    /// All vectors must share one dimension, which becomes the table's dimension.
    #[inline]
    pub async fn replace_vectors(&mut self, vectors: &[Vec<f32>]) -> Result<(), RagError> {
        let vector_dim = vectors
            .first()
            .map(Vec::len)
            .filter(|dim| *dim > 0)
            .ok_or_else(|| RagError::Database("Cannot build an index without vectors".to_string()))?;

        if let Some((position, bad)) = vectors.iter().enumerate().find(|(_, v)| v.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Vector at position {} has dimension {}, expected {}",
                position,
                bad.len(),
                vector_dim
            )));
        }

        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", vector_dim)))?;

        self.drop_table_if_exists().await?;
        self.vector_dimension = None;

        let schema = Self::create_schema(dim);
        let table = self
            .connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        let record_batch = Self::create_record_batch(schema, dim, vectors)?;
        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        self.vector_dimension = Some(vector_dim);
        info!(
            "Stored {} vectors with dimension {}",
            vectors.len(),
            vector_dim
        );
        Ok(())
    }

    fn create_record_batch(
        schema: Arc<Schema>,
        dim: i32,
        vectors: &[Vec<f32>],
    ) -> Result<RecordBatch, RagError> {
        let positions = (0..vectors.len())
            .map(|i| {
                u32::try_from(i)
                    .map_err(|_| RagError::Database(format!("Too many vectors: {}", vectors.len())))
            })
            .collect::<Result<Vec<u32>, RagError>>()?;

        let flat_values: Vec<f32> = vectors.iter().flatten().copied().collect();
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(field, dim, Arc::new(values_array), None)
            .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt32Array::from(positions)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Find the `k` stored vectors nearest to `query_vector` by L2 distance
    ///
    /// Every vector is compared (no approximate index) and every row is
    /// returned before truncating, so a tie at the k-th distance always keeps
    /// the lowest positions. Results are ordered by ascending distance, ties
    /// by ascending position.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<VectorMatch>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let dim = self
            .vector_dimension
            .ok_or_else(|| RagError::Database("Vector index has not been built".to_string()))?;
        if query_vector.len() != dim {
            return Err(RagError::Embedding(format!(
                "Query vector has dimension {}, index expects {}",
                query_vector.len(),
                dim
            )));
        }

        let table = self.open_table().await?;
        let row_count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        debug!("Searching for {} nearest of {} vectors", k, row_count);

        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .limit(row_count.max(k))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut matches = Vec::new();
        for batch in &batches {
            matches.extend(Self::parse_search_batch(batch)?);
        }
        sort_matches(&mut matches);
        matches.truncate(k);

        debug!("Search returned {} matches", matches.len());
        Ok(matches)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<VectorMatch>, RagError> {
        let positions = position_column(batch)?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| VectorMatch {
                position: positions.value(row),
                distance: distances.value(row),
            })
            .collect())
    }

    /// Number of stored vectors; zero when no table exists
    #[inline]
    pub async fn count(&self) -> Result<usize, RagError> {
        if !self.has_index().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Every stored position, ascending
    #[inline]
    pub async fn list_positions(&self) -> Result<Vec<u32>, RagError> {
        let count = self.count().await?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&["position"]))
            .limit(count)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to query positions: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read positions: {}", e)))?;

        let mut positions = Vec::with_capacity(count);
        for batch in &batches {
            let column = position_column(batch)?;
            positions.extend((0..batch.num_rows()).map(|row| column.value(row)));
        }
        positions.sort_unstable();
        Ok(positions)
    }

    async fn drop_table_if_exists(&self) -> Result<(), RagError> {
        if self.has_index().await? {
            info!("Dropping existing vector table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), RagError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path: PathBuf = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                RagError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        Ok(())
    }
}

fn position_column(batch: &RecordBatch) -> Result<&UInt32Array, RagError> {
    batch
        .column_by_name("position")
        .ok_or_else(|| RagError::Database("Missing position column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database("Invalid position column type".to_string()))
}
