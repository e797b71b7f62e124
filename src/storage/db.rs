use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::models::CsvFileRecord;
use super::tables::*;
use crate::indexes::IndexSpec;

/// Separates the index name from the key in `UNIQUE_KEYS` entries.
pub(crate) const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("Duplicate key in index {index}: {key}")]
    DuplicateKey { index: String, key: String },
    #[error("Index {0} already exists with a different definition")]
    IndexConflict(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index {0} cannot be created or dropped")]
    ProtectedIndex(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Catalog row for one declared index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexEntry {
    /// Creation order, listings follow it
    pub ordinal: u64,
    pub spec: IndexSpec,
}

/// Embedded single-collection document store with engine-style indexes.
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("csv-index-provisioner.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(INDEXES)?;
            let _ = write_txn.open_table(UNIQUE_KEYS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }
}

/// Catalog entries in creation order.
pub(crate) fn load_entries(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> Result<Vec<IndexEntry>, DatabaseError> {
    let mut entries = Vec::new();
    for result in table.iter()? {
        let (_, value) = result?;
        let entry: IndexEntry = rmp_serde::from_slice(value.value())?;
        entries.push(entry);
    }
    entries.sort_by_key(|e| e.ordinal);
    Ok(entries)
}

/// All file records in the table.
pub(crate) fn load_records(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> Result<Vec<CsvFileRecord>, DatabaseError> {
    let mut files = Vec::new();
    for result in table.iter()? {
        let (_, value) = result?;
        let file: CsvFileRecord = rmp_serde::from_slice(value.value())?;
        files.push(file);
    }
    Ok(files)
}

/// Key of `record` under a unique index, as the JSON array of its field values.
pub(crate) fn index_key(spec: &IndexSpec, record: &CsvFileRecord) -> String {
    let values: Vec<serde_json::Value> = spec.fields().map(|f| record.field(f)).collect();
    serde_json::Value::Array(values).to_string()
}

/// `UNIQUE_KEYS` entry for `record` under a unique index.
pub(crate) fn unique_entry(spec: &IndexSpec, record: &CsvFileRecord) -> String {
    format!("{}{}{}", spec.name, KEY_SEPARATOR, index_key(spec, record))
}

/// Half-open range covering every `UNIQUE_KEYS` entry of one index.
pub(crate) fn entry_range(index: &str) -> (String, String) {
    let next = char::from_u32(KEY_SEPARATOR as u32 + 1).unwrap_or(KEY_SEPARATOR);
    (
        format!("{index}{KEY_SEPARATOR}"),
        format!("{index}{next}"),
    )
}
