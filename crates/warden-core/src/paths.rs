//! Path normalization and scope containment checks.
//!
//! Normalization is purely lexical: the user home is expanded, relative
//! paths are absolutized against the working directory, and `.`/`..`
//! components are folded without touching the filesystem. Escape prevention
//! is the upward reparse-point walk, so a symlink planted inside a scope is
//! caught even though it normalizes to an in-scope path.

use crate::decision::Decision;
use directories::BaseDirs;
use std::path::{Component, Path, PathBuf};

/// Reason returned when a grant carries no path scopes.
pub const SCOPE_NOT_REQUIRED: &str = "Scope not required";
/// Reason returned when containment passes.
pub const PATH_ALLOWED: &str = "Path allowed";
/// Reason returned when a reparse point or symlink sits on the walk.
pub const REPARSE_POINT: &str = "Path contains a reparse point";
/// Reason returned when no scope contains the target.
pub const OUTSIDE_SCOPES: &str = "Path outside allowed scopes";

/// Expand the user home and resolve `raw` to a normalized absolute path
/// without requiring it to exist.
pub fn normalize_path(raw: &str) -> PathBuf {
    let expanded = expand_user(raw);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(expanded)
    };
    normalize_components(&absolute)
}

/// Decide whether `target` is contained in any of `scopes`.
///
/// An empty scope list means no scope is required. On a scope match, every
/// existing node between the target and the scope root is checked for
/// filesystem redirection.
pub fn path_within_scopes(target: &str, scopes: &[String]) -> Decision {
    if scopes.is_empty() {
        return Decision::allow(SCOPE_NOT_REQUIRED);
    }

    let target = normalize_path(target);
    for scope_raw in scopes {
        let scope = normalize_path(scope_raw);
        if target != scope && !target.starts_with(&scope) {
            continue;
        }
        let mut current = nearest_existing(&target);
        while current != scope && current.starts_with(&scope) {
            if is_reparse_point(&current) {
                return Decision::deny(REPARSE_POINT);
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        return Decision::allow(PATH_ALLOWED);
    }
    Decision::deny(OUTSIDE_SCOPES)
}

fn expand_user(raw: &str) -> PathBuf {
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    match (raw, home) {
        ("~", Some(home)) => home,
        (raw, Some(home)) => match raw.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(raw),
        },
        (raw, None) => PathBuf::from(raw),
    }
}

fn normalize_components(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Path::new("/")),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

fn nearest_existing(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    while !current.exists() {
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    current
}

fn is_reparse_point(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}
