//! The provisioning run: ensure every planned index phase by phase, then read
//! the engine's listing back and check it against the plan.

use std::io::Write;

use thiserror::Error;
use tracing::{info, warn};

use crate::indexes::{IndexInfo, IndexSpec, Phase, IDX_TTL_CLEANUP};
use crate::report;
use crate::store::{IndexCatalog, StoreError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub collection: String,
    /// Drop each index before ensuring it
    pub rebuild: bool,
    /// Expiry shown in the inactive TTL description
    pub ttl_seconds: u64,
}

/// A planned index the listing does not agree with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    Missing(String),
    Mismatch {
        expected: IndexInfo,
        actual: IndexInfo,
    },
}

#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Indexes this run built
    pub created: Vec<String>,
    /// Indexes that already existed with the same definition
    pub unchanged: Vec<String>,
    /// Engine listing after the run
    pub indexes: Vec<IndexInfo>,
    pub discrepancies: Vec<Discrepancy>,
}

/// Compare the engine listing with the plan.
pub fn verify(plan: &[IndexSpec], listing: &[IndexInfo]) -> Vec<Discrepancy> {
    plan.iter()
        .filter_map(|spec| match listing.iter().find(|i| i.name == spec.name) {
            None => Some(Discrepancy::Missing(spec.name.clone())),
            Some(actual) if !actual.matches(spec) => Some(Discrepancy::Mismatch {
                expected: IndexInfo::from(spec),
                actual: actual.clone(),
            }),
            Some(_) => None,
        })
        .collect()
}

/// Ensure every index in `plan`, writing progress to `out`.
///
/// Calls are strictly sequential. The first failing call stops the run and
/// earlier indexes are left in place.
pub async fn provision<W: Write>(
    catalog: &dyn IndexCatalog,
    plan: &[IndexSpec],
    options: &ProvisionOptions,
    out: &mut W,
) -> Result<ProvisionReport, ProvisionError> {
    let mut report = ProvisionReport::default();

    for phase in Phase::ALL {
        report::write_phase_heading(out, phase)?;

        for spec in plan.iter().filter(|s| s.phase == phase) {
            report::write_creating(out, spec)?;

            if options.rebuild && catalog.drop_index(&spec.name).await? {
                info!(index = %spec.name, "Dropped index for rebuild");
            }

            if catalog.ensure_index(spec).await? {
                info!(index = %spec.name, collection = %options.collection, "Index created");
                report.created.push(spec.name.clone());
            } else {
                info!(
                    index = %spec.name,
                    collection = %options.collection,
                    "Index already present"
                );
                report.unchanged.push(spec.name.clone());
            }

            report::write_created(out, spec)?;
        }

        if phase == Phase::FutureProofing && !plan.iter().any(|s| s.name == IDX_TTL_CLEANUP) {
            report::write_inactive_ttl(out, &options.collection, options.ttl_seconds)?;
        }
    }

    report.indexes = catalog.list_indexes().await?;
    report::write_listing(out, &report.indexes)?;

    report.discrepancies = verify(plan, &report.indexes);
    for discrepancy in &report.discrepancies {
        warn!(?discrepancy, "Index listing does not match the plan");
    }

    Ok(report)
}
