//! stasis core - installation manifests and the backup engine
//!
//! This crate provides the manifest model, the resource items and lifecycle
//! hooks it declares, zip archive handling, snapshot rotation, and the
//! backup/restore/uninstall engines that drive them.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod archive;
pub mod backup;
pub mod catalog;
pub mod hook;
pub mod host;
pub mod item;
pub mod manifest;
pub mod registry;
pub mod settings;
pub mod snapshot;
pub mod util;

pub use backup::{EngineError, OperationReport};
pub use host::{Host, ProgressSink};
pub use item::ResourceItem;
pub use hook::LifecycleHook;
pub use manifest::Manifest;
pub use settings::Settings;
