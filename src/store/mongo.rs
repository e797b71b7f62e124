//! MongoDB backend.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FileRepository, IndexCatalog, StoreError};
use crate::indexes::{
    Direction, IndexInfo, IndexKey, IndexSpec, FIELD_FILENAME, FIELD_LAST_MODIFIED,
    FIELD_UPLOADED_AT, PRIMARY_INDEX,
};
use crate::storage::models::{CsvFileRecord, UserRow};

const DUPLICATE_KEY: i32 = 11000;
const DUPLICATE_KEY_LEGACY: i32 = 11001;
const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_NOT_FOUND: i32 = 27;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;

/// MongoDB document for a CSV file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvFileDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub users: Vec<UserRow>,
    #[serde(default)]
    pub csv_content: String,
    /// BSON date, so a TTL index on it can expire the document
    pub uploaded_at: bson::DateTime,
    pub last_modified: bson::DateTime,
}

impl From<&CsvFileRecord> for CsvFileDocument {
    fn from(record: &CsvFileRecord) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            users: record.users.clone(),
            csv_content: record.csv_content.clone(),
            uploaded_at: bson::DateTime::from_chrono(record.uploaded_at),
            last_modified: bson::DateTime::from_chrono(record.last_modified),
        }
    }
}

impl From<CsvFileDocument> for CsvFileRecord {
    fn from(doc: CsvFileDocument) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename,
            users: doc.users,
            csv_content: doc.csv_content,
            uploaded_at: doc.uploaded_at.to_chrono(),
            last_modified: doc.last_modified.to_chrono(),
        }
    }
}

/// MongoDB client bound to one collection.
pub struct MongoStore {
    collection: Collection<CsvFileDocument>,
}

impl MongoStore {
    /// Connect and ping the server.
    pub async fn connect(
        uri: &str,
        database_name: &str,
        collection_name: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database_name);
        database.run_command(doc! { "ping": 1 }, None).await?;

        let collection = database.collection::<CsvFileDocument>(collection_name);
        Ok(Self { collection })
    }

    pub fn collection(&self) -> &Collection<CsvFileDocument> {
        &self.collection
    }

    async fn find_sorted(
        &self,
        field: &str,
        limit: usize,
    ) -> Result<Vec<CsvFileRecord>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { field: -1 })
            .limit(find_limit(limit))
            .build();
        let cursor = self.collection.find(doc! {}, options).await?;
        let docs: Vec<CsvFileDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(CsvFileRecord::from).collect())
    }
}

/// Server-side limit for a listing. Zero means no limit, the same as the server.
fn find_limit(limit: usize) -> Option<i64> {
    match limit {
        0 => None,
        n => Some(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}

/// Driver model for a declared index. Builds in the background, as the
/// collection may already be serving traffic.
pub fn index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for key in &spec.keys {
        keys.insert(key.field.clone(), key.direction.as_i32());
    }

    let mut options = IndexOptions::default();
    options.name = Some(spec.name.clone());
    options.background = Some(true);
    if spec.unique {
        options.unique = Some(true);
    }
    options.expire_after = spec.expire_after;

    IndexModel::builder().keys(keys).options(options).build()
}

/// Engine listing entry to [`IndexInfo`]. Key values may come back as int32, int64 or double.
pub fn index_info(model: &IndexModel) -> IndexInfo {
    let keys = model
        .keys
        .iter()
        .map(|(field, value)| {
            let direction = match value {
                Bson::Int32(v) => i64::from(*v),
                Bson::Int64(v) => *v,
                Bson::Double(v) if *v < 0.0 => -1,
                Bson::Double(_) => 1,
                _ => 1,
            };
            IndexKey {
                field: field.clone(),
                direction: Direction::from_i64(direction),
            }
        })
        .collect();

    let options = model.options.as_ref();
    IndexInfo {
        name: options
            .and_then(|o| o.name.clone())
            .unwrap_or_default(),
        keys,
        unique: options.and_then(|o| o.unique).unwrap_or(false),
        expire_after_secs: options.and_then(|o| o.expire_after).map(|d| d.as_secs()),
    }
}

fn server_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => Some(e.code),
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        _ => None,
    }
}

fn server_message(err: &mongodb::error::Error) -> String {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => e.message.clone(),
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.message.clone(),
        _ => err.to_string(),
    }
}

/// Pull the index name and key out of an E11000 message such as
/// `E11000 duplicate key error collection: db.csv_files index: idx_filename_exact dup key: { filename: "a.csv" }`.
pub fn parse_duplicate_key(message: &str) -> (String, String) {
    let index = message
        .split_once("index: ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string();
    let key = message
        .split_once("dup key: ")
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default();
    (index, key)
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        match server_code(&e) {
            Some(DUPLICATE_KEY | DUPLICATE_KEY_LEGACY) => {
                let (index, key) = parse_duplicate_key(&server_message(&e));
                StoreError::DuplicateKey { index, key }
            }
            _ => StoreError::Mongo(Box::new(e)),
        }
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[async_trait]
impl IndexCatalog for MongoStore {
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<bool, StoreError> {
        let existing = self.list_indexes().await?;
        if let Some(info) = existing.iter().find(|i| i.name == spec.name) {
            if info.matches(spec) {
                debug!(index = %spec.name, "Index already present");
                return Ok(false);
            }
            return Err(StoreError::IndexConflict(spec.name.clone()));
        }

        match self.collection.create_index(index_model(spec), None).await {
            Ok(result) => {
                debug!(index = %result.index_name, "Index created");
                Ok(true)
            }
            Err(e) => match server_code(&e) {
                Some(INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT) => {
                    Err(StoreError::IndexConflict(spec.name.clone()))
                }
                _ => Err(e.into()),
            },
        }
    }

    async fn drop_index(&self, name: &str) -> Result<bool, StoreError> {
        if name == PRIMARY_INDEX {
            return Err(StoreError::ProtectedIndex(name.to_string()));
        }
        match self.collection.drop_index(name, None).await {
            Ok(()) => Ok(true),
            Err(e) if server_code(&e) == Some(INDEX_NOT_FOUND) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError> {
        let cursor = match self.collection.list_indexes(None).await {
            Ok(cursor) => cursor,
            // Collection not created yet
            Err(e) if server_code(&e) == Some(NAMESPACE_NOT_FOUND) => {
                return Ok(vec![IndexInfo::primary()]);
            }
            Err(e) => return Err(e.into()),
        };
        let models: Vec<IndexModel> = cursor.try_collect().await?;
        Ok(models.iter().map(index_info).collect())
    }
}

#[async_trait]
impl FileRepository for MongoStore {
    async fn insert_file(&self, file: &CsvFileRecord) -> Result<(), StoreError> {
        self.collection
            .insert_one(CsvFileDocument::from(file), None)
            .await?;
        Ok(())
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<CsvFileRecord>, StoreError> {
        let doc = self
            .collection
            .find_one(doc! { FIELD_FILENAME: filename }, None)
            .await?;
        Ok(doc.map(CsvFileRecord::from))
    }

    async fn delete_by_filename(&self, filename: &str) -> Result<u64, StoreError> {
        let result = self
            .collection
            .delete_many(doc! { FIELD_FILENAME: filename }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn replace_content(
        &self,
        filename: &str,
        users: Vec<UserRow>,
        csv_content: &str,
    ) -> Result<Option<CsvFileRecord>, StoreError> {
        let update = doc! {
            "$set": {
                "users": bson::to_bson(&users)?,
                "csvContent": csv_content,
                FIELD_LAST_MODIFIED: bson::DateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let doc = self
            .collection
            .find_one_and_update(doc! { FIELD_FILENAME: filename }, update, options)
            .await?;
        Ok(doc.map(CsvFileRecord::from))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<CsvFileRecord>, StoreError> {
        self.find_sorted(FIELD_UPLOADED_AT, limit).await
    }

    async fn list_recently_modified(
        &self,
        limit: usize,
    ) -> Result<Vec<CsvFileRecord>, StoreError> {
        self.find_sorted(FIELD_LAST_MODIFIED, limit).await
    }
}
