//! Backup, restore, and uninstall engines
//!
//! Every engine runs the items of a manifest in order against one archive
//! and aggregates their results. A failing item never stops the items after
//! it, and nothing is rolled back.

mod create;
mod restore;
mod types;
mod uninstall;

pub use create::backup;
pub use restore::{restore, restore_from};
pub use types::{BackupMode, EngineError, OperationReport};
pub use uninstall::uninstall;
