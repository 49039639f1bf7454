//! String normalization helpers for tags, identifiers and paths.
//!
//! These functions back both the matrix expansion (target ids, tag
//! sanitization) and the template filters exposed to image templates.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

/// Maximum length of an image tag accepted by OCI registries.
pub const MAX_TAG_LEN: usize = 128;

/// Sanitize a string into the allowed tag character set.
///
/// The result only contains lowercase alphanumerics, `-`, `_` and `.`, never
/// starts with `.` or `-`, never ends with `-`, has no runs of `-`, and is at
/// most [`MAX_TAG_LEN`] characters long. Applying it twice yields the same
/// value as applying it once.
pub fn tag_safe(input: &str) -> String {
    let mapped: String = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '-',
        })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let trimmed = collapsed.trim_start_matches(['.', '-']);
    let truncated: String = trimmed.chars().take(MAX_TAG_LEN).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Condense a string into a compact identifier: lowercased with spaces,
/// hyphens and periods removed (`"Ubuntu 24.04"` becomes `"ubuntu2404"`).
pub fn condense(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.') && !c.is_whitespace())
        .collect()
}

/// Remove semver-style build metadata (`+...`) from a version string.
pub fn strip_metadata(input: &str) -> String {
    match input.split_once('+') {
        Some((head, _)) => head.to_string(),
        None => input.to_string(),
    }
}

/// Replace every match of `pattern` in `input` with `replacement`.
///
/// The replacement may reference capture groups as `$1`, `$name`, etc.
pub fn regex_replace(input: &str, pattern: &str, replacement: &str) -> Result<String> {
    let regex = Regex::new(pattern).map_err(Error::Regex)?;
    Ok(regex.replace_all(input, replacement).into_owned())
}

/// Derive a lowercase hyphenated slug from a display name.
///
/// Used for default variant extensions (`"Standard Edition"` becomes
/// `"standard-edition"`).
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Make an identifier safe for use as a filesystem name or bake target.
///
/// `.`, `+` and `/` are replaced with `-`.
pub fn sanitize_id(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '.' | '+' | '/' => '-',
            c => c,
        })
        .collect()
}

/// Join a child subpath onto a resolved parent path.
///
/// Fails when the parent has no resolved path, which indicates the child was
/// resolved before its owner.
pub fn join_subpath(parent: Option<&Path>, subpath: &str, owner: &str) -> Result<PathBuf> {
    let parent = parent.ok_or_else(|| Error::Config {
        message: format!("cannot resolve path for {owner}: parent path is not resolved"),
    })?;
    Ok(parent.join(subpath))
}

/// Express `path` relative to `root`, falling back to `path` itself when it
/// is not under `root`.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
