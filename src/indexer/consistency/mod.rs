// Index pair consistency validation
// Ensures the chunk table and the vector index describe the same positions

#[cfg(test)]
mod tests;

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;

/// Consistency check results between the chunk table and the vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of rows in the chunk table
    pub chunk_rows: usize,
    /// Number of vectors in the index
    pub vector_rows: usize,
    /// Chunk count recorded by the last completed build, if any
    pub recorded_chunks: Option<usize>,
    /// Positions with a chunk but no vector
    pub missing_vectors: Vec<u32>,
    /// Positions with a vector but no chunk
    pub orphaned_vectors: Vec<u32>,
    /// Chunk positions are exactly `0..chunk_rows`
    pub positions_contiguous: bool,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    #[inline]
    pub fn total_issues(&self) -> usize {
        let mut issues = self.missing_vectors.len() + self.orphaned_vectors.len();
        if self.chunk_rows != self.vector_rows {
            issues += 1;
        }
        if !self.positions_contiguous {
            issues += 1;
        }
        if self.recorded_chunks != Some(self.chunk_rows) {
            issues += 1;
        }
        issues
    }

    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            return format!(
                "Index is consistent: {} chunks, {} vectors",
                self.chunk_rows, self.vector_rows
            );
        }

        let mut parts = Vec::new();
        if self.recorded_chunks.is_none() {
            parts.push("no completed build recorded".to_string());
        } else if self.recorded_chunks != Some(self.chunk_rows) {
            parts.push("chunk count differs from the last build".to_string());
        }
        if self.chunk_rows != self.vector_rows {
            parts.push(format!(
                "{} chunks vs {} vectors",
                self.chunk_rows, self.vector_rows
            ));
        }
        if !self.missing_vectors.is_empty() {
            parts.push(format!("{} missing vectors", self.missing_vectors.len()));
        }
        if !self.orphaned_vectors.is_empty() {
            parts.push(format!("{} orphaned vectors", self.orphaned_vectors.len()));
        }
        if !self.positions_contiguous {
            parts.push("chunk positions have gaps".to_string());
        }

        format!("{} inconsistencies found: {}", self.total_issues(), parts.join(", "))
    }
}

/// Compares the persisted chunk table with the persisted vector index
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    vector_store: &'a VectorStore,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, vector_store: &'a VectorStore) -> Self {
        Self {
            database,
            vector_store,
        }
    }

    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        debug!("Starting index pair consistency validation");

        let chunk_positions: Vec<i64> = self
            .database
            .load_chunks()
            .await?
            .into_iter()
            .map(|record| record.position)
            .collect();
        let vector_positions = self.vector_store.list_positions().await?;
        let recorded_chunks = self
            .database
            .load_meta()
            .await?
            .and_then(|meta| usize::try_from(meta.chunk_count).ok());

        let report = compare_positions(&chunk_positions, &vector_positions, recorded_chunks);

        if report.is_consistent {
            info!("Index consistency validation passed");
        } else {
            warn!("Index consistency validation found issues: {}", report.summary());
        }

        Ok(report)
    }
}

/// Build a report from the positions found in each store
#[inline]
pub fn compare_positions(
    chunk_positions: &[i64],
    vector_positions: &[u32],
    recorded_chunks: Option<usize>,
) -> ConsistencyReport {
    let positions_contiguous = chunk_positions
        .iter()
        .enumerate()
        .all(|(i, position)| i64::try_from(i).is_ok_and(|i| i == *position));

    let chunk_set: BTreeSet<u32> = chunk_positions
        .iter()
        .filter_map(|p| u32::try_from(*p).ok())
        .collect();
    let vector_set: BTreeSet<u32> = vector_positions.iter().copied().collect();

    let missing_vectors: Vec<u32> = chunk_set.difference(&vector_set).copied().collect();
    let orphaned_vectors: Vec<u32> = vector_set.difference(&chunk_set).copied().collect();

    let chunk_rows = chunk_positions.len();
    let vector_rows = vector_positions.len();

    let is_consistent = positions_contiguous
        && chunk_rows == vector_rows
        && missing_vectors.is_empty()
        && orphaned_vectors.is_empty()
        && recorded_chunks == Some(chunk_rows);

    ConsistencyReport {
        chunk_rows,
        vector_rows,
        recorded_chunks,
        missing_vectors,
        orphaned_vectors,
        positions_contiguous,
        is_consistent,
    }
}
