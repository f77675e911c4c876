//! Crawl report display
//!
//! This module loads the report of a stored crawl from its checkpoint and
//! prints reports to stdout.

use crate::output::traits::CrawlReport;
use crate::storage::{open_checkpoint, CheckpointStore};
use crate::SweepError;
use std::path::Path;

/// Loads the report of the crawl stored in a checkpoint database
///
/// # Arguments
///
/// * `checkpoint_path` - Path to the checkpoint database
///
/// # Returns
///
/// * `Ok(Some(CrawlReport))` - Report of the stored crawl
/// * `Ok(None)` - No checkpoint exists at the path
/// * `Err(SweepError)` - The database could not be read
pub fn load_report(checkpoint_path: &Path) -> Result<Option<CrawlReport>, SweepError> {
    if !checkpoint_path.exists() {
        return Ok(None);
    }

    let store = open_checkpoint(checkpoint_path)?;
    let report = store
        .load_state()?
        .map(|state| CrawlReport::from_checkpoint(&state));
    Ok(report)
}

/// Loads the stored report, failing when there is nothing to resume
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Report of the checkpointed crawl
/// * `Err(SweepError::NoCheckpoint)` - The database is missing or holds no crawl
pub fn require_checkpoint(checkpoint_path: &Path) -> Result<CrawlReport, SweepError> {
    load_report(checkpoint_path)?
        .ok_or_else(|| SweepError::NoCheckpoint(checkpoint_path.display().to_string()))
}

/// Prints a crawl report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Overview:");
    println!("  Phase: {}", report.phase);
    println!("  Status: {}", report.status.to_db_string());
    println!("  Records emitted: {}", report.total_emitted);
    if let Some(elapsed) = report.elapsed {
        println!("  Elapsed: {:.1}s", elapsed.as_secs_f64());
    }
    println!();

    let total_windows = report.windows_completed + report.windows_failed + report.windows_pending;
    println!("Windows ({}):", total_windows);
    println!("  Completed: {}", report.windows_completed);
    println!("  Failed: {}", report.windows_failed);
    println!("  Pending: {}", report.windows_pending);
    println!();

    if report.windows_truncated > 0 {
        println!(
            "Warning: {} window(s) reached the platform cap at minimum granularity; \
             some records in them may be missing",
            report.windows_truncated
        );
        println!();
    }

    if report.interrupted() {
        println!("Crawl was interrupted; run again without --fresh to resume");
    }
}
