//! Helpers for keeping credentials and local paths out of logs and
//! for vetting file names that arrive over HTTP.

use std::path::{Path, PathBuf};

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the password in a `user/password@host:port/service` string.
///
/// - `scott/tiger@db:1521/ORCL` → `scott/****@db:1521/ORCL`
/// - `db:1521/ORCL` → `db:1521/ORCL` (no change)
pub fn redact_connection_string(value: &str) -> String {
    let Some(at_pos) = value.rfind('@') else {
        return value.to_string();
    };
    let (credentials, rest) = value.split_at(at_pos);
    match credentials.find('/') {
        Some(slash) => format!("{}/****{}", &credentials[..slash], rest),
        None => value.to_string(),
    }
}

/// Whether a requested download name is a plain file name.
///
/// Rejects empty names, separators, parent references and hidden files.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Resolves `candidate` against `root` and returns the canonical path if it
/// names an existing file inside `root`.
///
/// Relative candidates are taken relative to `root`. Symlinks and `..`
/// components are resolved before the containment check.
pub fn resolve_within(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = joined.canonicalize().ok()?;
    (resolved != root && resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
}
