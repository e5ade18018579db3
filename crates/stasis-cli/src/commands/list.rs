//! `stasis list`, also the default when no subcommand is given

use super::Context;
use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use stasis_core::catalog::{self, ArchiveEntry};
use std::fs;

fn modified(entry: &ArchiveEntry) -> Option<DateTime<Local>> {
    fs::metadata(&entry.path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

pub fn run(context: &Context, json: bool) -> Result<bool> {
    let current = context.current()?;
    let base = &context.settings.base_directory;
    let archives = catalog::list_archives(base, current.as_ref())
        .with_context(|| format!("Failed to list {}", base.display()))?;

    if json {
        let entries: Vec<_> = archives
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "file": entry.file_name(),
                    "name": entry.manifest.name,
                    "archive": entry.manifest.archive,
                    "short_name": entry.manifest.short_name(),
                    "current": entry.is_current,
                    "modified": modified(entry).map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        let output = serde_json::json!({
            "base_directory": base,
            "current": current.as_ref().map(|m| serde_json::json!({
                "name": m.name,
                "archive": m.archive,
            })),
            "archives": entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(true);
    }

    match &current {
        Some(manifest) => println!("Existing installation: {manifest}"),
        None => println!("No configured installation"),
    }

    if archives.is_empty() {
        println!("No archives in {}", base.display());
        return Ok(true);
    }

    println!();
    println!("  {:<24} {:<32} {:<17} NAME", "SHORT NAME", "FILE", "MODIFIED");
    for entry in &archives {
        let marker = if entry.is_current { '*' } else { ' ' };
        let when = modified(entry)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{marker} {:<24} {:<32} {:<17} {}",
            entry.manifest.short_name(),
            entry.file_name(),
            when,
            entry.manifest.name
        );
    }
    Ok(true)
}
