//! Lifecycle hooks: actions run before an engine mutates anything

use crate::util::expand_env_vars;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use std::io::{self, Write};
use std::process::Command;
use sysinfo::System;
use tracing::{debug, info, warn};

/// Outcome of one kill attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub pid: u32,
    pub killed: bool,
}

/// Capability contract for launching and terminating processes
pub trait ProcessControl: Send + Sync {
    /// Launch `program` and block until it exits; returns its exit code if it had one
    ///
    /// # Errors
    /// Returns an error if the program cannot be launched
    fn run_and_wait(&self, program: &str) -> io::Result<Option<i32>>;

    /// Force-terminate every running process called `name`
    fn terminate_by_name(&self, name: &str) -> Vec<Termination>;
}

/// [`ProcessControl`] over the real process table
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

fn name_matches(candidate: &str, wanted: &str) -> bool {
    let same = |a: &str, b: &str| {
        if cfg!(windows) {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };

    same(candidate, wanted)
        || candidate
            .strip_suffix(".exe")
            .or_else(|| candidate.strip_suffix(".EXE"))
            .is_some_and(|stem| same(stem, wanted))
}

impl ProcessControl for SystemProcesses {
    fn run_and_wait(&self, program: &str) -> io::Result<Option<i32>> {
        let status = Command::new(program).status()?;
        Ok(status.code())
    }

    fn terminate_by_name(&self, name: &str) -> Vec<Termination> {
        let mut system = System::new();
        system.refresh_processes();

        system
            .processes()
            .values()
            .filter(|p| name_matches(p.name(), name))
            .map(|p| Termination {
                pid: p.pid().as_u32(),
                killed: p.kill(),
            })
            .collect()
    }
}

/// One action from a `<startup>` or `<shutdown>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleHook {
    /// Launch an executable and wait for it to exit
    RunSync { file: String },
    /// Terminate every process with this name
    Kill { process_name: String },
}

impl LifecycleHook {
    /// Element name in the manifest document
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RunSync { .. } => "run-sync",
            Self::Kill { .. } => "kill",
        }
    }

    /// Run the hook; failures are logged and never propagated
    pub fn run(&self, processes: &dyn ProcessControl) {
        match self {
            Self::RunSync { file } => {
                let program = expand_env_vars(file);
                match processes.run_and_wait(&program) {
                    Ok(code) => debug!("{program} exited with {code:?}"),
                    Err(e) => debug!("could not run {program}: {e}"),
                }
            }
            Self::Kill { process_name } => {
                for termination in processes.terminate_by_name(process_name) {
                    if termination.killed {
                        info!("Killed {process_name} (pid {})", termination.pid);
                    } else {
                        warn!("Could not kill {process_name} (pid {})", termination.pid);
                    }
                }
            }
        }
    }

    /// Write this hook as its own empty element
    ///
    /// # Errors
    /// Returns an error if the writer fails
    pub fn write_element<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let element = match self {
            Self::RunSync { file } => {
                BytesStart::new(self.tag()).with_attributes([("file", file.as_str())])
            }
            Self::Kill { process_name } => BytesStart::new(self.tag())
                .with_attributes([("process-name", process_name.as_str())]),
        };
        writer.write_event(Event::Empty(element))
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunSync { file } => write!(f, "Run {file}"),
            Self::Kill { process_name } => write!(f, "Kill {process_name}"),
        }
    }
}

/// Run `hooks` in order
pub fn run_all(hooks: &[LifecycleHook], processes: &dyn ProcessControl) {
    for hook in hooks {
        debug!("hook: {hook}");
        hook.run(processes);
    }
}
