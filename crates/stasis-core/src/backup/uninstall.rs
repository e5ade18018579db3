//! Uninstall engine

use super::OperationReport;
use crate::host::{Host, ProgressSink};
use crate::manifest::Manifest;
use tracing::warn;

/// Run the shutdown hooks, then remove every item of `manifest`
///
/// The live configuration file is left in place.
pub fn uninstall(
    manifest: &Manifest,
    host: &Host,
    progress: &mut dyn ProgressSink,
) -> OperationReport {
    manifest.shutdown(host);

    let mut report = OperationReport::new(None);
    for item in &manifest.items {
        let description = item.describe();
        progress.report(&description);
        let success = item.uninstall(host);
        report.record(description, success);
    }

    if !report.is_success() {
        warn!("{manifest} was not removed completely");
    }
    progress.report("Done.");
    report
}
