use redb::TableDefinition;

/// File records: _id -> CsvFileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("csv_files");

/// Index catalog: index name -> IndexEntry (msgpack)
pub const INDEXES: TableDefinition<&str, &[u8]> = TableDefinition::new("index_catalog");

/// Unique index entries: "<index name>\u{1f}<key json>" -> _id
pub const UNIQUE_KEYS: TableDefinition<&str, &str> = TableDefinition::new("unique_keys");
