// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: rewrite the token keys of a `KEY=value` env file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::credential::TokenGrant;
use crate::error::AuthError;

pub const ACCESS_TOKEN_KEY: &str = "STRAVA_ACCESS_TOKEN";
pub const REFRESH_TOKEN_KEY: &str = "STRAVA_REFRESH_TOKEN";
pub const EXPIRES_AT_KEY: &str = "STRAVA_EXPIRES_AT";

/// Owns the env file the token triple is written back to.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the three token lines, leaving every other line untouched.
    ///
    /// Keys the file does not contain yet are appended; a missing file is
    /// created. The write lands in a temp file that is renamed over the
    /// original.
    pub fn save(&self, grant: &TokenGrant) -> Result<(), AuthError> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(AuthError::io(format!("failed to read {}", self.path.display()), e))
            }
        };

        let updated = rewrite(&existing, grant);
        if updated == existing {
            tracing::debug!(path = %self.path.display(), "env file already up to date");
            return Ok(());
        }

        write_atomic(&self.path, &updated)
            .map_err(|e| AuthError::io(format!("failed to write {}", self.path.display()), e))?;
        tracing::debug!(path = %self.path.display(), "token values written");
        Ok(())
    }
}

/// Apply the grant to env file content.
pub fn rewrite(content: &str, grant: &TokenGrant) -> String {
    let expires_at = grant.expires_at.to_string();
    let mut pending = [
        (ACCESS_TOKEN_KEY, grant.access_token.as_str(), false),
        (REFRESH_TOKEN_KEY, grant.refresh_token.as_str(), false),
        (EXPIRES_AT_KEY, expires_at.as_str(), false),
    ];

    let mut out = String::with_capacity(content.len() + 128);
    for line in content.split_inclusive('\n') {
        let replacement = pending
            .iter_mut()
            .find_map(|entry| key_offset(line, entry.0).map(|offset| (offset, entry)));
        match replacement {
            Some((offset, (key, value, seen))) => {
                *seen = true;
                // Keeps an `export ` prefix as written.
                out.push_str(&line[..offset]);
                out.push_str(*key);
                out.push('=');
                out.push_str(*value);
                out.push_str(line_ending(line));
            }
            None => out.push_str(line),
        }
    }

    for (key, value, seen) in pending {
        if seen {
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }

    out
}

/// Byte offset of `key` when `line` assigns it, with or without `export `.
fn key_offset(line: &str, key: &str) -> Option<usize> {
    let body = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    body.strip_prefix(key)
        .is_some_and(|rest| rest.starts_with('='))
        .then(|| line.len() - body.len())
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Write to a unique sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(&tmp_path, meta.permissions())?;
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
