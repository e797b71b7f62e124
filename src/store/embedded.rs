use async_trait::async_trait;

use super::{FileRepository, IndexCatalog, StoreError};
use crate::indexes::{IndexInfo, IndexSpec};
use crate::storage::models::{CsvFileRecord, UserRow};
use crate::storage::Database;

#[async_trait]
impl IndexCatalog for Database {
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<bool, StoreError> {
        Ok(Database::ensure_index(self, spec)?)
    }

    async fn drop_index(&self, name: &str) -> Result<bool, StoreError> {
        Ok(Database::drop_index(self, name)?)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError> {
        Ok(Database::list_indexes(self)?)
    }
}

#[async_trait]
impl FileRepository for Database {
    async fn insert_file(&self, file: &CsvFileRecord) -> Result<(), StoreError> {
        Ok(Database::insert_file(self, file)?)
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<CsvFileRecord>, StoreError> {
        Ok(Database::find_by_filename(self, filename)?)
    }

    async fn delete_by_filename(&self, filename: &str) -> Result<u64, StoreError> {
        Ok(Database::delete_by_filename(self, filename)?)
    }

    async fn replace_content(
        &self,
        filename: &str,
        users: Vec<UserRow>,
        csv_content: &str,
    ) -> Result<Option<CsvFileRecord>, StoreError> {
        Ok(Database::replace_content(self, filename, users, csv_content)?)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<CsvFileRecord>, StoreError> {
        Ok(Database::list_recent(self, limit)?)
    }

    async fn list_recently_modified(
        &self,
        limit: usize,
    ) -> Result<Vec<CsvFileRecord>, StoreError> {
        Ok(Database::list_recently_modified(self, limit)?)
    }
}
