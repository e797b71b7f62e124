//! Shared test helpers for unit tests.

use crate::storage::models::{CsvFileRecord, UserRow};
use crate::storage::Database;

/// Open an embedded database in a fresh temporary directory.
pub fn test_database() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Database::open(dir.path().join("data")).expect("Failed to open test database");
    (dir, db)
}

/// A record with one user row.
pub fn sample_file(filename: &str) -> CsvFileRecord {
    CsvFileRecord::new(
        filename,
        vec![UserRow {
            id: 1,
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }],
        "id,email,name\n1,ada@example.com,Ada\n",
    )
}
