//! Platform collaborators handed to every engine call
//!
//! The engines never reach for process-wide state. Everything that touches
//! the registry, running processes, or directory permissions goes through a
//! [`Host`], so tests can swap any of them out.

use crate::hook::{ProcessControl, SystemProcesses};
use crate::item::ExclusionRules;
use crate::registry::{default_registry, Registry};
use std::fs;
use std::io;
use std::path::Path;

/// Creates directories that every local user may modify
pub trait DirectoryAccess: Send + Sync {
    /// Create `dir` (and missing parents) and grant modify access to all local users
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the grant fails
    fn create_shared(&self, dir: &Path) -> io::Result<()>;
}

/// Default [`DirectoryAccess`]
///
/// On Unix the grant is `0o777`; other platforms create the directory and
/// leave ACLs to the installer that owns the machine policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedAccess;

impl DirectoryAccess for SharedAccess {
    fn create_shared(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o777))?;
        }

        Ok(())
    }
}

/// Receives human-readable progress lines from the engines
pub trait ProgressSink {
    fn report(&mut self, message: &str);
}

impl<F: FnMut(&str)> ProgressSink for F {
    fn report(&mut self, message: &str) {
        self(message);
    }
}

/// A [`ProgressSink`] that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressSink for Silent {
    fn report(&mut self, _message: &str) {}
}

/// The bundle of collaborators an engine call runs against
pub struct Host {
    registry: Box<dyn Registry>,
    processes: Box<dyn ProcessControl>,
    access: Box<dyn DirectoryAccess>,
    exclusions: ExclusionRules,
}

impl Host {
    /// Host backed by the real registry, process table, and filesystem
    #[must_use]
    pub fn system(exclusions: ExclusionRules) -> Self {
        Self {
            registry: default_registry(),
            processes: Box::new(SystemProcesses),
            access: Box::new(SharedAccess),
            exclusions,
        }
    }

    /// Replace the registry backend
    #[must_use]
    pub fn with_registry(mut self, registry: impl Registry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// Replace the process backend
    #[must_use]
    pub fn with_processes(mut self, processes: impl ProcessControl + 'static) -> Self {
        self.processes = Box::new(processes);
        self
    }

    /// Replace the directory permission backend
    #[must_use]
    pub fn with_access(mut self, access: impl DirectoryAccess + 'static) -> Self {
        self.access = Box::new(access);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &dyn Registry {
        self.registry.as_ref()
    }

    #[must_use]
    pub fn processes(&self) -> &dyn ProcessControl {
        self.processes.as_ref()
    }

    #[must_use]
    pub fn access(&self) -> &dyn DirectoryAccess {
        self.access.as_ref()
    }

    #[must_use]
    pub fn exclusions(&self) -> &ExclusionRules {
        &self.exclusions
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("exclusions", &self.exclusions)
            .finish_non_exhaustive()
    }
}
