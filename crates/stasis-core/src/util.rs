//! Path and string helpers shared by the resource items and engines

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An archive entry that cannot be extracted below its item's folder
#[derive(Error, Debug)]
#[error("Archive entry '{entry}' {reason}")]
pub struct PathError {
    pub entry: String,
    pub reason: &'static str,
}

/// Map the `/`-separated part of an archive entry name onto `root`
///
/// `.` segments are dropped and `..` is resolved, but never above `root`.
/// Symlinked directories already on disk must not lead outside `root` either.
///
/// # Errors
/// Returns an error if the entry is absolute, climbs out of `root`, names no
/// file, or carries a null byte or drive prefix
pub fn entry_target(root: &Path, entry: &str) -> Result<PathBuf, PathError> {
    let refuse = |reason| PathError {
        entry: entry.to_string(),
        reason,
    };

    if entry.starts_with(['/', '\\']) {
        return Err(refuse("is absolute"));
    }
    if entry.contains('\0') {
        return Err(refuse("contains a null byte"));
    }

    let mut target = root.to_path_buf();
    let mut depth = 0usize;
    for segment in entry.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return Err(refuse("leaves the target folder"));
                }
                target.pop();
                depth -= 1;
            }
            _ if cfg!(windows) && segment.contains(':') => {
                return Err(refuse("carries a drive or stream prefix"));
            }
            _ => {
                target.push(segment);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(refuse("names no file"));
    }

    if let (Ok(real_root), Ok(real_target)) = (root.canonicalize(), target.canonicalize()) {
        if !real_target.starts_with(&real_root) {
            return Err(refuse("resolves outside the target folder"));
        }
    }

    Ok(target)
}

/// Expand `%NAME%` references from the process environment
///
/// Unknown variables are left untouched, the same way the Windows shell
/// treats them.
#[must_use]
pub fn expand_env_vars(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('%') else {
            out.push('%');
            rest = after;
            break;
        };

        let name = &after[..end];
        match std::env::var(name) {
            Ok(value) if !name.is_empty() => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('%');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Normalize an archive sub-path: forward slashes, no leading or trailing separator
#[must_use]
pub fn entry_name(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

/// Join an archive prefix and a relative path into a zip entry name
#[must_use]
pub fn join_entry(prefix: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if prefix.is_empty() {
        relative
    } else {
        format!("{prefix}/{relative}")
    }
}

/// Case-insensitive check for a trailing `.zip`
#[must_use]
pub fn has_zip_suffix(name: &str) -> bool {
    name.len() >= 4
        && name.is_char_boundary(name.len() - 4)
        && name[name.len() - 4..].eq_ignore_ascii_case(".zip")
}

/// Make a file or directory writable by its owner again
///
/// # Errors
/// Returns an error if the metadata cannot be read or updated
pub fn clear_readonly(path: &Path) -> io::Result<()> {
    let mut permissions = fs::symlink_metadata(path)?.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions)
}
