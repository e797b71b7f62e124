//! csv-index-provisioner - Idempotent index provisioning for the `csv_files` collection
//!
//! A run ensures a fixed set of indexes, then lists what the engine reports back:
//! - Unique exact lookup on `filename`
//! - Descending sort indexes on `uploadedAt` and `lastModified`
//! - Compound `filename` + `uploadedAt` index for per-file history
//! - Optional TTL index for retention cleanup
//!
//! Two engines sit behind the same traits: MongoDB, and an embedded redb
//! store that applies the same index semantics for local runs and tests.

pub mod config;
pub mod indexes;
pub mod provision;
pub mod report;
pub mod storage;
pub mod store;
#[cfg(test)]
pub mod testutil;
