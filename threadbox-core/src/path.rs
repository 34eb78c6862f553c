//! Path algebra: pure functions over virtual path strings, no I/O.
//!
//! A canonical path always starts with `/`, never ends with `/` unless it
//! *is* `/`, has no repeated `/`, no empty segments, and no `..` segment.

use crate::error::{StorageError, StorageResult};

/// Normalise a user-supplied path into canonical form.
///
/// `normalize(normalize(p)) == normalize(p)` for any `p` that normalizes
/// successfully — normalization is idempotent.
pub fn normalize(input: &str) -> StorageResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(StorageError::invalid_path(input, "path is empty"));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == ".." {
            return Err(StorageError::invalid_path(input, "path contains '..'"));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Validate and trim a bare node name (used for `rename_node`'s `new_name`).
pub fn normalize_name(input: &str) -> StorageResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(StorageError::invalid_name(input, "name is empty"));
    }
    if trimmed.contains('/') {
        return Err(StorageError::invalid_name(input, "name contains '/'"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(StorageError::invalid_name(input, "name is '.' or '..'"));
    }
    Ok(trimmed.to_string())
}

/// Basename of a canonical path. The root's name is `/`.
pub fn basename(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

/// Parent of a canonical path, or `None` iff `path == "/"`.
pub fn parent(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => Some("/".to_string()),
    }
}

/// Join a parent path and a bare name into a canonical child path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Segments of a canonical path after the leading `/`. Empty for `/`.
pub fn split(path: &str) -> Vec<String> {
    if path == "/" {
        return Vec::new();
    }
    path.trim_start_matches('/')
        .split('/')
        .map(|s| s.to_string())
        .collect()
}

/// Every ancestor directory path of `path`, shallowest first, excluding
/// `path` itself and including the root. Used to materialise the directory
/// chain before a write.
pub fn ancestors(path: &str) -> Vec<String> {
    let segments = split(path);
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}
