use std::collections::HashMap;

use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{
    entry_range, index_key, load_entries, load_records, unique_entry, Database, DatabaseError,
    IndexEntry,
};
use super::models::CsvFileRecord;
use super::tables::*;
use crate::indexes::{IndexInfo, IndexKey, IndexSpec, FIELD_ID, PRIMARY_INDEX};

impl Database {
    // ========================================================================
    // Index operations
    // ========================================================================

    /// Create an index. Returns false when an identical index already exists.
    pub fn ensure_index(&self, spec: &IndexSpec) -> Result<bool, DatabaseError> {
        if spec.name == PRIMARY_INDEX {
            return Err(DatabaseError::ProtectedIndex(spec.name.clone()));
        }

        let write_txn = self.begin_write()?;

        let entries = {
            let table = write_txn.open_table(INDEXES)?;
            load_entries(&table)?
        };

        if let Some(existing) = entries.iter().find(|e| e.spec.name == spec.name) {
            let identical = existing.spec.same_definition(spec);
            write_txn.abort()?;
            return if identical {
                Ok(false)
            } else {
                Err(DatabaseError::IndexConflict(spec.name.clone()))
            };
        }

        // One index per key pattern, the primary key included
        let primary_keys = vec![IndexKey::asc(FIELD_ID)];
        if spec.keys == primary_keys || entries.iter().any(|e| e.spec.keys == spec.keys) {
            write_txn.abort()?;
            return Err(DatabaseError::IndexConflict(spec.name.clone()));
        }

        if spec.unique {
            let records = {
                let table = write_txn.open_table(FILES)?;
                load_records(&table)?
            };

            let mut seen: HashMap<String, String> = HashMap::new();
            for record in &records {
                let key = index_key(spec, record);
                if seen.insert(key.clone(), record.id.clone()).is_some() {
                    write_txn.abort()?;
                    return Err(DatabaseError::DuplicateKey {
                        index: spec.name.clone(),
                        key,
                    });
                }
            }

            let mut unique_table = write_txn.open_table(UNIQUE_KEYS)?;
            for record in &records {
                unique_table.insert(unique_entry(spec, record).as_str(), record.id.as_str())?;
            }
        }

        let ordinal = entries.last().map(|e| e.ordinal + 1).unwrap_or(1);
        let entry = IndexEntry {
            ordinal,
            spec: spec.clone(),
        };
        {
            let mut table = write_txn.open_table(INDEXES)?;
            let data = rmp_serde::to_vec_named(&entry)?;
            table.insert(spec.name.as_str(), data.as_slice())?;
        }

        write_txn.commit()?;
        Ok(true)
    }

    /// Drop an index by name. Returns false when it does not exist.
    pub fn drop_index(&self, name: &str) -> Result<bool, DatabaseError> {
        if name == PRIMARY_INDEX {
            return Err(DatabaseError::ProtectedIndex(name.to_string()));
        }

        let write_txn = self.begin_write()?;

        let removed = {
            let mut table = write_txn.open_table(INDEXES)?;
            let removed = table.remove(name)?.is_some();
            removed
        };

        if removed {
            let (start, end) = entry_range(name);
            let keys: Vec<String> = {
                let table = write_txn.open_table(UNIQUE_KEYS)?;
                let keys = table
                    .range(start.as_str()..end.as_str())?
                    .map(|r| r.map(|(k, _)| k.value().to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                keys
            };

            let mut table = write_txn.open_table(UNIQUE_KEYS)?;
            for key in keys {
                table.remove(key.as_str())?;
            }
        }

        write_txn.commit()?;
        Ok(removed)
    }

    /// Every index, the implicit primary key index first.
    pub fn list_indexes(&self) -> Result<Vec<IndexInfo>, DatabaseError> {
        let mut infos = vec![IndexInfo::primary()];
        infos.extend(self.index_specs()?.iter().map(IndexInfo::from));
        Ok(infos)
    }

    /// Declared index specs in creation order.
    pub fn index_specs(&self) -> Result<Vec<IndexSpec>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(INDEXES)?;
        Ok(load_entries(&table)?.into_iter().map(|e| e.spec).collect())
    }

    // ========================================================================
    // Expiry
    // ========================================================================

    /// Remove documents whose TTL-indexed timestamp is older than the index allows.
    pub fn expire_documents(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;

        let (specs, records) = {
            let index_table = write_txn.open_table(INDEXES)?;
            let files_table = write_txn.open_table(FILES)?;
            let specs: Vec<IndexSpec> = load_entries(&index_table)?
                .into_iter()
                .map(|e| e.spec)
                .collect();
            (specs, load_records(&files_table)?)
        };

        let expired: Vec<&CsvFileRecord> = records
            .iter()
            .filter(|record| {
                specs.iter().any(|spec| {
                    let (Some(ttl), Some(field)) = (spec.expire_after, spec.fields().next())
                    else {
                        return false;
                    };
                    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
                        return false;
                    };
                    record
                        .timestamp(field)
                        .and_then(|ts| ts.checked_add_signed(ttl))
                        .is_some_and(|expires| expires < now)
                })
            })
            .collect();

        for record in &expired {
            remove_record(&write_txn, &specs, record)?;
        }

        write_txn.commit()?;
        Ok(expired.len() as u64)
    }
}

/// Delete a record and its unique index entries inside an open write transaction.
pub(crate) fn remove_record(
    write_txn: &redb::WriteTransaction,
    specs: &[IndexSpec],
    record: &CsvFileRecord,
) -> Result<(), DatabaseError> {
    {
        let mut table = write_txn.open_table(FILES)?;
        table.remove(record.id.as_str())?;
    }
    let mut unique_table = write_txn.open_table(UNIQUE_KEYS)?;
    for spec in specs.iter().filter(|s| s.unique) {
        unique_table.remove(unique_entry(spec, record).as_str())?;
    }
    Ok(())
}
