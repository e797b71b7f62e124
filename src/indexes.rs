//! Index plan for the `csv_files` collection.
//!
//! Indexes, in the order they are ensured:
//! - `{ "_id": 1 }` - Primary key (implicit, created by the engine)
//! - `{ "filename": 1 }` unique - Exact lookup, every CRUD path goes through it
//! - `{ "uploadedAt": -1 }` - Recent uploads, pagination
//! - `{ "lastModified": -1 }` - Audit trail, recently changed files
//! - `{ "filename": 1, "uploadedAt": -1 }` - Versions of one file, newest first
//! - `{ "uploadedAt": 1 }` TTL - Retention cleanup, inactive unless enabled

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const FIELD_ID: &str = "_id";
pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_UPLOADED_AT: &str = "uploadedAt";
pub const FIELD_LAST_MODIFIED: &str = "lastModified";

/// Name the engine gives the implicit primary key index.
pub const PRIMARY_INDEX: &str = "_id_";

pub const IDX_FILENAME_EXACT: &str = "idx_filename_exact";
pub const IDX_UPLOADED_AT_DESC: &str = "idx_uploadedAt_desc";
pub const IDX_LAST_MODIFIED_DESC: &str = "idx_lastModified_desc";
pub const IDX_FILENAME_UPLOADED_AT: &str = "idx_filename_uploadedAt";
pub const IDX_TTL_CLEANUP: &str = "idx_ttl_cleanup";

/// 90 days
pub const DEFAULT_TTL_SECONDS: u64 = 7_776_000;
/// Largest expireAfterSeconds the server accepts
pub const MAX_TTL_SECONDS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Numeric form used in key patterns.
    pub fn as_i32(self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value < 0 {
            Direction::Descending
        } else {
            Direction::Ascending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: Direction,
}

impl IndexKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

/// Rollout phase an index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Essential,
    Recommended,
    FutureProofing,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Essential, Phase::Recommended, Phase::FutureProofing];

    pub fn number(self) -> u8 {
        match self {
            Phase::Essential => 1,
            Phase::Recommended => 2,
            Phase::FutureProofing => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Essential => "Essential Indexes",
            Phase::Recommended => "Recommended Indexes",
            Phase::FutureProofing => "Future-Proofing Indexes",
        }
    }
}

/// Declared definition of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    #[serde(default)]
    pub expire_after: Option<Duration>,
    pub phase: Phase,
}

impl IndexSpec {
    fn new(name: &str, keys: Vec<IndexKey>, phase: Phase) -> Self {
        Self {
            name: name.to_string(),
            keys,
            unique: false,
            expire_after: None,
            phase,
        }
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn expire_after(mut self, ttl: Duration) -> Self {
        self.expire_after = Some(ttl);
        self
    }

    pub fn is_compound(&self) -> bool {
        self.keys.len() > 1
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.field.as_str())
    }

    /// Key pattern as an ordered JSON object, e.g. `{"filename":1,"uploadedAt":-1}`.
    pub fn key_document(&self) -> serde_json::Value {
        key_document(&self.keys)
    }

    /// Whether two specs describe the same index, ignoring name and phase.
    pub fn same_definition(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys
            && self.unique == other.unique
            && self.expire_after.map(|d| d.as_secs()) == other.expire_after.map(|d| d.as_secs())
    }

    /// Short tag printed after the name in progress output.
    pub fn label(&self) -> Option<&'static str> {
        if self.unique {
            Some("UNIQUE")
        } else if self.expire_after.is_some() {
            Some("TTL")
        } else if self.is_compound() {
            Some("COMPOUND")
        } else {
            None
        }
    }
}

pub fn key_document(keys: &[IndexKey]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for key in keys {
        map.insert(key.field.clone(), key.direction.as_i32().into());
    }
    serde_json::Value::Object(map)
}

/// Index as reported back by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    pub expire_after_secs: Option<u64>,
}

impl IndexInfo {
    pub fn primary() -> Self {
        Self {
            name: PRIMARY_INDEX.to_string(),
            keys: vec![IndexKey::asc(FIELD_ID)],
            unique: false,
            expire_after_secs: None,
        }
    }

    pub fn key_document(&self) -> serde_json::Value {
        key_document(&self.keys)
    }

    pub fn matches(&self, spec: &IndexSpec) -> bool {
        self.name == spec.name
            && self.keys == spec.keys
            && self.unique == spec.unique
            && self.expire_after_secs == spec.expire_after.map(|d| d.as_secs())
    }
}

impl From<&IndexSpec> for IndexInfo {
    fn from(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name.clone(),
            keys: spec.keys.clone(),
            unique: spec.unique,
            expire_after_secs: spec.expire_after.map(|d| d.as_secs()),
        }
    }
}

pub fn filename_exact() -> IndexSpec {
    IndexSpec::new(
        IDX_FILENAME_EXACT,
        vec![IndexKey::asc(FIELD_FILENAME)],
        Phase::Essential,
    )
    .unique()
}

pub fn uploaded_at_desc() -> IndexSpec {
    IndexSpec::new(
        IDX_UPLOADED_AT_DESC,
        vec![IndexKey::desc(FIELD_UPLOADED_AT)],
        Phase::Recommended,
    )
}

pub fn last_modified_desc() -> IndexSpec {
    IndexSpec::new(
        IDX_LAST_MODIFIED_DESC,
        vec![IndexKey::desc(FIELD_LAST_MODIFIED)],
        Phase::Recommended,
    )
}

pub fn filename_uploaded_at() -> IndexSpec {
    IndexSpec::new(
        IDX_FILENAME_UPLOADED_AT,
        vec![IndexKey::asc(FIELD_FILENAME), IndexKey::desc(FIELD_UPLOADED_AT)],
        Phase::FutureProofing,
    )
}

pub fn ttl_cleanup(ttl: Duration) -> IndexSpec {
    IndexSpec::new(
        IDX_TTL_CLEANUP,
        vec![IndexKey::asc(FIELD_UPLOADED_AT)],
        Phase::FutureProofing,
    )
    .expire_after(ttl)
}

/// The indexes a run ensures, in order. The TTL index is included only when enabled.
pub fn active_plan(config: &Config) -> Vec<IndexSpec> {
    let mut plan = vec![
        filename_exact(),
        uploaded_at_desc(),
        last_modified_desc(),
        filename_uploaded_at(),
    ];
    if config.indexes.enable_ttl {
        plan.push(ttl_cleanup(config.ttl()));
    }
    plan
}
