mod embedded;
mod mongo;

pub use mongo::{CsvFileDocument, MongoStore};

use async_trait::async_trait;
use thiserror::Error;

use crate::indexes::{IndexInfo, IndexSpec};
use crate::storage::models::{CsvFileRecord, UserRow};
use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key in index {index}: {key}")]
    DuplicateKey { index: String, key: String },
    #[error("Index {0} already exists with a different definition")]
    IndexConflict(String),
    #[error("Index {0} cannot be created or dropped")]
    ProtectedIndex(String),
    #[error("Embedded store error: {0}")]
    Embedded(DatabaseError),
    #[error("MongoDB error: {0}")]
    Mongo(Box<mongodb::error::Error>),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::DuplicateKey { index, key } => StoreError::DuplicateKey { index, key },
            DatabaseError::IndexConflict(name) => StoreError::IndexConflict(name),
            DatabaseError::ProtectedIndex(name) => StoreError::ProtectedIndex(name),
            other => StoreError::Embedded(other),
        }
    }
}

/// Index management surface of a document engine.
/// Creating an index that already exists with the same definition is a no-op.
#[async_trait]
pub trait IndexCatalog: Send + Sync {
    /// Returns false when an identical index was already present.
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<bool, StoreError>;
    /// Returns false when no index had that name.
    async fn drop_index(&self, name: &str) -> Result<bool, StoreError>;
    /// All indexes, the implicit primary key index first.
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError>;
}

/// CRUD over the `csv_files` collection.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert_file(&self, file: &CsvFileRecord) -> Result<(), StoreError>;
    async fn find_by_filename(&self, filename: &str) -> Result<Option<CsvFileRecord>, StoreError>;
    async fn delete_by_filename(&self, filename: &str) -> Result<u64, StoreError>;
    async fn replace_content(
        &self,
        filename: &str,
        users: Vec<UserRow>,
        csv_content: &str,
    ) -> Result<Option<CsvFileRecord>, StoreError>;
    async fn list_recent(&self, limit: usize) -> Result<Vec<CsvFileRecord>, StoreError>;
    async fn list_recently_modified(&self, limit: usize)
        -> Result<Vec<CsvFileRecord>, StoreError>;
}
