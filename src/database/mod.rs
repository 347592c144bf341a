// Database module
// The persisted index pair: SQLite for the chunk table, LanceDB for vectors

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{VectorMatch, VectorStore};
pub use sqlite::*;
