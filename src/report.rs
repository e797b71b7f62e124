//! Human-readable output: phase headings, the verification listing and the
//! reference text printed after a run.

use std::io::{self, Write};

use crate::indexes::{IndexInfo, IndexSpec, Phase, IDX_FILENAME_EXACT, IDX_TTL_CLEANUP};

pub fn write_phase_heading<W: Write>(out: &mut W, phase: Phase) -> io::Result<()> {
    writeln!(
        out,
        "=== Creating Phase {}: {} ===\n",
        phase.number(),
        phase.title()
    )
}

pub fn write_creating<W: Write>(out: &mut W, spec: &IndexSpec) -> io::Result<()> {
    match spec.label() {
        Some(label) => writeln!(out, "Creating: {} ({label})", spec.name),
        None => writeln!(out, "Creating: {}", spec.name),
    }
}

pub fn write_created<W: Write>(out: &mut W, spec: &IndexSpec) -> io::Result<()> {
    writeln!(out, "✓ Index {} created successfully\n", spec.name)
}

/// Description of the retention index when it is not enabled.
pub fn write_inactive_ttl<W: Write>(
    out: &mut W,
    collection: &str,
    ttl_secs: u64,
) -> io::Result<()> {
    writeln!(out, "// INDEX 5 (OPTIONAL): TTL Index")?;
    writeln!(out, "// Set ENABLE_TTL_INDEX=true ONLY if a retention policy is required\n")?;
    writeln!(out, "// db.{collection}.createIndex(")?;
    writeln!(out, "//   {{ uploadedAt: 1 }},")?;
    writeln!(
        out,
        "//   {{ expireAfterSeconds: {ttl_secs}, name: \"{IDX_TTL_CLEANUP}\", background: true }}"
    )?;
    writeln!(out, "// );\n")
}

/// Numbered listing of the indexes the engine reports.
pub fn write_listing<W: Write>(out: &mut W, indexes: &[IndexInfo]) -> io::Result<()> {
    writeln!(out, "=== Verifying Index Creation ===\n")?;
    writeln!(out, "Total indexes created: {}", indexes.len())?;
    writeln!(out, "\nIndex List:")?;

    for (i, idx) in indexes.iter().enumerate() {
        writeln!(out, "\n{}. {}", i + 1, idx.name)?;
        writeln!(out, "   Key: {}", idx.key_document())?;
        if idx.unique {
            writeln!(out, "   Unique: true")?;
        }
        if let Some(ttl) = idx.expire_after_secs {
            writeln!(out, "   TTL: {ttl} seconds")?;
        }
    }

    writeln!(out, "\n=== Index Creation Complete ===\n")
}

/// Sample queries, maintenance commands and the expected index summary.
pub fn write_reference<W: Write>(
    out: &mut W,
    collection: &str,
    plan: &[IndexSpec],
) -> io::Result<()> {
    writeln!(out, "=== Sample Performance Validation Queries ===\n")?;
    writeln!(out, "Run these before and after index creation and compare the plans.\n")?;

    writeln!(out, "1. Find by filename (should use {IDX_FILENAME_EXACT}):")?;
    writeln!(
        out,
        "   db.{collection}.find({{ filename: 'users.csv' }}).explain('executionStats')\n"
    )?;

    writeln!(out, "2. List recent files with pagination:")?;
    writeln!(
        out,
        "   db.{collection}.find().sort({{ uploadedAt: -1 }}).limit(50).explain('executionStats')\n"
    )?;

    writeln!(out, "3. Range query on upload time:")?;
    writeln!(
        out,
        "   db.{collection}.find({{ uploadedAt: {{ $gte: ISODate('2026-01-01') }} }}).explain('executionStats')\n"
    )?;

    writeln!(out, "\n=== Maintenance Commands (Run Periodically) ===\n")?;

    writeln!(out, "Check index statistics:")?;
    writeln!(out, "   db.{collection}.aggregate([ {{ $indexStats: {{}} }} ])\n")?;

    writeln!(out, "Check collection statistics:")?;
    writeln!(out, "   db.{collection}.stats()\n")?;

    writeln!(out, "Rebuild indexes (quarterly):")?;
    writeln!(out, "   db.{collection}.reIndex()\n")?;

    writeln!(out, "Drop specific index if needed:")?;
    writeln!(out, "   db.{collection}.dropIndex('{IDX_FILENAME_EXACT}')\n")?;

    writeln!(out, "\n=== Expected Index Summary ===\n")?;
    writeln!(out, "After this run the collection should have:")?;
    writeln!(out, "  ✓ _id (auto-created by the engine)")?;
    for spec in plan {
        match spec.label() {
            Some(label) => writeln!(out, "  ✓ {} ({})", spec.name, label.to_lowercase())?,
            None => writeln!(out, "  ✓ {}", spec.name)?,
        }
    }
    writeln!(
        out,
        "\nTotal: {} indexes + 1 auto-created = {} indexes\n",
        plan.len(),
        plan.len() + 1
    )
}
