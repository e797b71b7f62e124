use std::time::Duration;

use chrono::Utc;
use csv_index_provisioner::indexes::{self, IndexKey, PRIMARY_INDEX};
use csv_index_provisioner::storage::models::{CsvFileRecord, UserRow};
use csv_index_provisioner::storage::{Database, DatabaseError};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(filename: &str) -> CsvFileRecord {
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

fn sample_file_uploaded(filename: &str, minutes_ago: i64) -> CsvFileRecord {
    let mut file = sample_file(filename);
    file.uploaded_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
    file.last_modified = file.uploaded_at;
    file
}

// ============================================================================
// Index catalog
// ============================================================================

#[test]
fn test_fresh_database_lists_primary_index_only() {
    let (_dir, db) = test_db();
    let indexes = db.list_indexes().unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, PRIMARY_INDEX);
    assert_eq!(indexes[0].keys, vec![IndexKey::asc("_id")]);
}

#[test]
fn test_ensure_index_is_idempotent() {
    let (_dir, db) = test_db();
    let spec = indexes::uploaded_at_desc();

    assert!(db.ensure_index(&spec).unwrap());
    assert!(!db.ensure_index(&spec).unwrap());
    assert_eq!(db.list_indexes().unwrap().len(), 2);
}

#[test]
fn test_listing_follows_creation_order() {
    let (_dir, db) = test_db();
    // Created out of alphabetical order on purpose
    db.ensure_index(&indexes::last_modified_desc()).unwrap();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.ensure_index(&indexes::uploaded_at_desc()).unwrap();

    let names: Vec<String> = db
        .list_indexes()
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "_id_",
            "idx_lastModified_desc",
            "idx_filename_exact",
            "idx_uploadedAt_desc",
        ]
    );
}

#[test]
fn test_same_name_different_definition_conflicts() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::uploaded_at_desc()).unwrap();

    let mut redefined = indexes::last_modified_desc();
    redefined.name = indexes::IDX_UPLOADED_AT_DESC.to_string();

    assert!(matches!(
        db.ensure_index(&redefined),
        Err(DatabaseError::IndexConflict(name)) if name == "idx_uploadedAt_desc"
    ));
}

#[test]
fn test_same_keys_different_name_conflicts() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::uploaded_at_desc()).unwrap();

    let mut renamed = indexes::uploaded_at_desc();
    renamed.name = "another_name".to_string();
    assert!(matches!(
        db.ensure_index(&renamed),
        Err(DatabaseError::IndexConflict(_))
    ));
}

#[test]
fn test_ttl_and_sort_index_on_same_field_coexist() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::uploaded_at_desc()).unwrap();
    db.ensure_index(&indexes::ttl_cleanup(Duration::from_secs(60)))
        .unwrap();

    let ttl = db
        .list_indexes()
        .unwrap()
        .into_iter()
        .find(|i| i.name == "idx_ttl_cleanup")
        .expect("ttl index should be listed");
    assert_eq!(ttl.expire_after_secs, Some(60));
}

#[test]
fn test_drop_index() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();

    assert!(db.drop_index("idx_filename_exact").unwrap());
    assert!(!db.drop_index("idx_filename_exact").unwrap());
    assert_eq!(db.list_indexes().unwrap().len(), 1);
}

#[test]
fn test_primary_index_is_protected() {
    let (_dir, db) = test_db();
    assert!(matches!(
        db.drop_index(PRIMARY_INDEX),
        Err(DatabaseError::ProtectedIndex(_))
    ));
}

// ============================================================================
// Unique constraint
// ============================================================================

#[test]
fn test_duplicate_filename_allowed_before_unique_index() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("users.csv")).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();
    assert_eq!(db.get_all_files().unwrap().len(), 2);
}

#[test]
fn test_duplicate_filename_rejected_after_unique_index() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();

    let err = db.insert_file(&sample_file("users.csv")).unwrap_err();
    match err {
        DatabaseError::DuplicateKey { index, key } => {
            assert_eq!(index, "idx_filename_exact");
            assert_eq!(key, r#"["users.csv"]"#);
        }
        other => panic!("expected duplicate key error, got {other}"),
    }
    assert_eq!(db.get_all_files().unwrap().len(), 1);
}

#[test]
fn test_unique_index_build_fails_over_existing_duplicates() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file("users.csv")).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();

    assert!(matches!(
        db.ensure_index(&indexes::filename_exact()),
        Err(DatabaseError::DuplicateKey { .. })
    ));
    // Nothing was half-built
    assert_eq!(db.list_indexes().unwrap().len(), 1);
    db.insert_file(&sample_file("users.csv")).unwrap();
}

#[test]
fn test_duplicate_id_rejected() {
    let (_dir, db) = test_db();
    let file = sample_file("users.csv");
    db.insert_file(&file).unwrap();

    let mut clash = sample_file("other.csv");
    clash.id = file.id.clone();
    assert!(matches!(
        db.insert_file(&clash),
        Err(DatabaseError::DuplicateKey { index, .. }) if index == PRIMARY_INDEX
    ));
}

#[test]
fn test_dropping_unique_index_lifts_constraint() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();
    db.drop_index("idx_filename_exact").unwrap();

    db.insert_file(&sample_file("users.csv")).unwrap();
    assert_eq!(db.get_all_files().unwrap().len(), 2);
}

#[test]
fn test_compound_index_is_not_unique() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_uploaded_at()).unwrap();
    let first = sample_file("users.csv");
    let mut second = sample_file("users.csv");
    second.uploaded_at = first.uploaded_at;

    db.insert_file(&first).unwrap();
    db.insert_file(&second).unwrap();
}

// ============================================================================
// File operations
// ============================================================================

#[test]
fn test_find_by_filename_with_and_without_index() {
    let (_dir, db) = test_db();
    let file = sample_file("users.csv");
    db.insert_file(&file).unwrap();
    db.insert_file(&sample_file("orders.csv")).unwrap();

    let scanned = db.find_by_filename("users.csv").unwrap().unwrap();
    assert_eq!(scanned.id, file.id);

    db.ensure_index(&indexes::filename_exact()).unwrap();
    let indexed = db.find_by_filename("users.csv").unwrap().unwrap();
    assert_eq!(indexed, scanned);

    assert!(db.find_by_filename("missing.csv").unwrap().is_none());
}

#[test]
fn test_delete_by_filename_frees_unique_key() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();

    assert_eq!(db.delete_by_filename("users.csv").unwrap(), 1);
    assert_eq!(db.delete_by_filename("users.csv").unwrap(), 0);
    assert!(db.find_by_filename("users.csv").unwrap().is_none());

    db.insert_file(&sample_file("users.csv")).unwrap();
}

#[test]
fn test_replace_content_bumps_last_modified() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    let file = sample_file_uploaded("users.csv", 30);
    db.insert_file(&file).unwrap();

    let rows = vec![
        UserRow {
            id: 1,
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        },
        UserRow {
            id: 2,
            email: "alan@example.com".to_string(),
            name: "Alan".to_string(),
        },
    ];
    let content = "id,email,name\n1,ada@example.com,Ada\n2,alan@example.com,Alan\n";
    let updated = db
        .replace_content("users.csv", rows, content)
        .unwrap()
        .expect("file should exist");

    assert_eq!(updated.users.len(), 2);
    assert_eq!(updated.uploaded_at, file.uploaded_at);
    assert!(updated.last_modified > file.last_modified);

    let stored = db.find_by_filename("users.csv").unwrap().unwrap();
    assert_eq!(stored, updated);

    assert!(db
        .replace_content("missing.csv", Vec::new(), "")
        .unwrap()
        .is_none());
}

#[test]
fn test_list_recent_orders_by_upload_time() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file_uploaded("old.csv", 60)).unwrap();
    db.insert_file(&sample_file_uploaded("new.csv", 1)).unwrap();
    db.insert_file(&sample_file_uploaded("mid.csv", 30)).unwrap();

    let names: Vec<String> = db
        .list_recent(2)
        .unwrap()
        .into_iter()
        .map(|f| f.filename)
        .collect();
    assert_eq!(names, vec!["new.csv", "mid.csv"]);
}

#[test]
fn test_list_recent_with_zero_limit_returns_everything() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file_uploaded("old.csv", 60)).unwrap();
    db.insert_file(&sample_file_uploaded("new.csv", 1)).unwrap();

    assert_eq!(db.list_recent(0).unwrap().len(), 2);
    assert_eq!(db.list_recently_modified(0).unwrap().len(), 2);
}

#[test]
fn test_replace_content_after_delete_does_not_resurrect() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.insert_file(&sample_file("users.csv")).unwrap();
    db.delete_by_filename("users.csv").unwrap();

    assert!(db
        .replace_content("users.csv", Vec::new(), "id,email,name\n")
        .unwrap()
        .is_none());
    assert!(db.get_all_files().unwrap().is_empty());
    db.insert_file(&sample_file("users.csv")).unwrap();
}

#[test]
fn test_list_recently_modified_orders_by_modification_time() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file_uploaded("a.csv", 60)).unwrap();
    db.insert_file(&sample_file_uploaded("b.csv", 30)).unwrap();
    db.replace_content("a.csv", Vec::new(), "id,email,name\n")
        .unwrap();

    let names: Vec<String> = db
        .list_recently_modified(10)
        .unwrap()
        .into_iter()
        .map(|f| f.filename)
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv"]);
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_expire_documents_without_ttl_index_is_noop() {
    let (_dir, db) = test_db();
    db.insert_file(&sample_file_uploaded("ancient.csv", 60 * 24 * 365))
        .unwrap();
    assert_eq!(db.expire_documents(Utc::now()).unwrap(), 0);
}

#[test]
fn test_expire_documents_removes_old_uploads() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::filename_exact()).unwrap();
    db.ensure_index(&indexes::ttl_cleanup(Duration::from_secs(3600)))
        .unwrap();

    db.insert_file(&sample_file_uploaded("stale.csv", 120)).unwrap();
    db.insert_file(&sample_file_uploaded("fresh.csv", 5)).unwrap();

    assert_eq!(db.expire_documents(Utc::now()).unwrap(), 1);
    assert!(db.find_by_filename("stale.csv").unwrap().is_none());
    assert!(db.find_by_filename("fresh.csv").unwrap().is_some());

    // Unique key of the expired document is free again
    db.insert_file(&sample_file("stale.csv")).unwrap();
}

#[test]
fn test_expire_documents_with_huge_ttl_keeps_everything() {
    let (_dir, db) = test_db();
    db.ensure_index(&indexes::ttl_cleanup(Duration::from_secs(10_000_000_000_000)))
        .unwrap();
    db.insert_file(&sample_file_uploaded("users.csv", 5)).unwrap();

    assert_eq!(db.expire_documents(Utc::now()).unwrap(), 0);
    assert_eq!(db.get_all_files().unwrap().len(), 1);
}
