use redb::ReadableTable;

use super::catalog::remove_record;
use super::db::{load_entries, load_records, unique_entry, Database, DatabaseError};
use super::models::{CsvFileRecord, UserRow};
use super::tables::*;
use crate::indexes::{IndexSpec, FIELD_FILENAME, PRIMARY_INDEX};

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Insert a file record, rejecting it when any unique index already holds its key
    pub fn insert_file(&self, file: &CsvFileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");

        let write_txn = self.begin_write()?;

        let unique_specs: Vec<IndexSpec> = {
            let table = write_txn.open_table(INDEXES)?;
            load_entries(&table)?
                .into_iter()
                .map(|e| e.spec)
                .filter(|s| s.unique)
                .collect()
        };

        let id_taken = {
            let table = write_txn.open_table(FILES)?;
            let taken = table.get(file.id.as_str())?.is_some();
            taken
        };
        if id_taken {
            write_txn.abort()?;
            return Err(DatabaseError::DuplicateKey {
                index: PRIMARY_INDEX.to_string(),
                key: serde_json::json!([file.id]).to_string(),
            });
        }

        if let Err(e) = insert_unique_entries(&write_txn, &unique_specs, file) {
            write_txn.abort()?;
            return Err(e);
        }

        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Find a file by filename, through the unique filename index when one exists
    pub fn find_by_filename(&self, filename: &str) -> Result<Option<CsvFileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(INDEXES)?;
        let files_table = read_txn.open_table(FILES)?;

        let lookup = load_entries(&index_table)?
            .into_iter()
            .map(|e| e.spec)
            .find(|s| s.unique && s.fields().eq([FIELD_FILENAME]));

        if let Some(spec) = lookup {
            let key = serde_json::json!([filename]).to_string();
            let entry = format!("{}{}{}", spec.name, super::db::KEY_SEPARATOR, key);
            let unique_table = read_txn.open_table(UNIQUE_KEYS)?;
            let id = match unique_table.get(entry.as_str())? {
                Some(id) => id.value().to_string(),
                None => return Ok(None),
            };
            return match files_table.get(id.as_str())? {
                Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
                None => Ok(None),
            };
        }

        Ok(load_records(&files_table)?
            .into_iter()
            .find(|f| f.filename == filename))
    }

    /// Delete every file with the given filename. Returns how many were removed.
    pub fn delete_by_filename(&self, filename: &str) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;

        let (specs, matching) = {
            let index_table = write_txn.open_table(INDEXES)?;
            let files_table = write_txn.open_table(FILES)?;
            let specs: Vec<IndexSpec> = load_entries(&index_table)?
                .into_iter()
                .map(|e| e.spec)
                .collect();
            let matching: Vec<CsvFileRecord> = load_records(&files_table)?
                .into_iter()
                .filter(|f| f.filename == filename)
                .collect();
            (specs, matching)
        };

        for record in &matching {
            remove_record(&write_txn, &specs, record)?;
        }

        write_txn.commit()?;
        Ok(matching.len() as u64)
    }

    /// Replace a file's rows and content. Returns the updated record, or None if absent.
    pub fn replace_content(
        &self,
        filename: &str,
        users: Vec<UserRow>,
        csv_content: &str,
    ) -> Result<Option<CsvFileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let (unique_specs, existing) = {
            let index_table = write_txn.open_table(INDEXES)?;
            let files_table = write_txn.open_table(FILES)?;
            let unique_specs: Vec<IndexSpec> = load_entries(&index_table)?
                .into_iter()
                .map(|e| e.spec)
                .filter(|s| s.unique)
                .collect();
            let existing = load_records(&files_table)?
                .into_iter()
                .find(|f| f.filename == filename);
            (unique_specs, existing)
        };

        let Some(existing) = existing else {
            write_txn.abort()?;
            return Ok(None);
        };

        let mut updated = existing.clone();
        updated.replace_content(users, csv_content);

        // Re-key unique entries, the timestamp may be part of a unique key
        {
            let mut unique_table = write_txn.open_table(UNIQUE_KEYS)?;
            for spec in &unique_specs {
                unique_table.remove(unique_entry(spec, &existing).as_str())?;
            }
        }
        if let Err(e) = insert_unique_entries(&write_txn, &unique_specs, &updated) {
            write_txn.abort()?;
            return Err(e);
        }

        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(&updated)?;
            table.insert(updated.id.as_str(), data.as_slice())?;
        }

        write_txn.commit()?;
        Ok(Some(updated))
    }

    /// Get all files
    pub fn get_all_files(&self) -> Result<Vec<CsvFileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        load_records(&table)
    }

    /// Most recently uploaded files first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<CsvFileRecord>, DatabaseError> {
        let mut files = self.get_all_files()?;
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        truncate_listing(&mut files, limit);
        Ok(files)
    }

    /// Most recently modified files first
    pub fn list_recently_modified(
        &self,
        limit: usize,
    ) -> Result<Vec<CsvFileRecord>, DatabaseError> {
        let mut files = self.get_all_files()?;
        files.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        truncate_listing(&mut files, limit);
        Ok(files)
    }
}

/// Zero means no limit, as in a MongoDB find.
fn truncate_listing(files: &mut Vec<CsvFileRecord>, limit: usize) {
    if limit > 0 {
        files.truncate(limit);
    }
}

/// Claim the record's key in every unique index, failing on the first one already taken.
fn insert_unique_entries(
    write_txn: &redb::WriteTransaction,
    unique_specs: &[IndexSpec],
    record: &CsvFileRecord,
) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(UNIQUE_KEYS)?;
    for spec in unique_specs {
        let entry = unique_entry(spec, record);
        if table.get(entry.as_str())?.is_some() {
            return Err(DatabaseError::DuplicateKey {
                index: spec.name.clone(),
                key: super::db::index_key(spec, record),
            });
        }
        table.insert(entry.as_str(), record.id.as_str())?;
    }
    Ok(())
}
