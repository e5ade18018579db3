//! CLI command handlers
//!
//! One module per subcommand. Each handler returns `Ok(true)` on success,
//! `Ok(false)` when the command ran but did not fully succeed.

pub mod backup;
pub mod list;
pub mod restore;
pub mod uninstall;

use anyhow::{Context as _, Result};
use stasis_core::catalog;
use stasis_core::{Host, Manifest, OperationReport, Settings};
use std::path::Path;

/// Everything a command needs: resolved settings and the host backends
pub struct Context {
    pub settings: Settings,
    pub host: Host,
}

impl Context {
    /// Resolve settings from `--config`, `$STASIS_CONFIG` or the per-user file
    ///
    /// # Errors
    /// Returns an error if the settings file exists but is unreadable or invalid
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let settings = Settings::discover(config).context("Failed to load settings")?;
        let host = Host::system(settings.exclusions.clone());
        Ok(Self { settings, host })
    }

    /// The live configuration, if one exists
    pub fn current(&self) -> Result<Option<Manifest>> {
        catalog::current_installation(&self.settings).with_context(|| {
            format!(
                "Failed to read {}",
                self.settings.installation_file.display()
            )
        })
    }
}

/// Progress lines go straight to stdout
pub fn console(message: &str) {
    println!("{message}");
}

/// Print the failed items of `report`, returning its overall result
pub fn summarize(report: &OperationReport, warning: &str) -> bool {
    if report.is_success() {
        return true;
    }
    println!("Warning: {warning}");
    for item in &report.failed {
        println!("  failed: {item}");
    }
    false
}
