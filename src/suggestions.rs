//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bakery::suggestions;
//!
//! // Instead of:
//! let config = Configuration::load(&root)?;
//!
//! // Use:
//! let config = Configuration::load(&root).map_err(|e| suggestions::explain(e, None))?;
//! ```

use std::path::Path;

use crate::config::Configuration;
use crate::error::Error;

/// Generate an error for when no configuration file is found.
pub fn config_not_found(root: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found in {root}\n\n\
         hint: Run 'bakery create project' to start a new project\n\
         hint: Use --context to point at another project root\n\
         hint: Set the BAKERY_CONTEXT environment variable",
        root = root.display()
    )
}

/// Generate an error for an image name that does not exist.
pub fn unknown_image(name: &str, known: &[&str]) -> anyhow::Error {
    let did_you_mean = find_similar(name, known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();
    anyhow::anyhow!(
        "Image '{name}' not found in configuration{did_you_mean}\n\n\
         Known images: {images}\n\
         hint: Run 'bakery create image {name}' to add it",
        images = list_or_none(known)
    )
}

/// Generate an error for a version name that does not exist.
pub fn unknown_version(image: &str, version: &str, known: &[&str]) -> anyhow::Error {
    let did_you_mean = find_similar(version, known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();
    anyhow::anyhow!(
        "Version '{version}' not found for image '{image}'{did_you_mean}\n\n\
         Known versions: {versions}\n\
         hint: Run 'bakery create version {image} {version}' to add it",
        versions = list_or_none(known)
    )
}

/// Generate an error for a missing external tool.
pub fn tool_not_found(tool: &str, env_var: &str, tools_dir: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Required tool '{tool}' not found\n\n\
         hint: Install {tool} and make sure it is on your PATH\n\
         hint: Set {env_var} to the full path of the binary\n\
         hint: Place the binary in {dir}",
        dir = tools_dir.display()
    )
}

/// Generate an error for `clean` without any age threshold.
pub fn clean_no_threshold() -> anyhow::Error {
    anyhow::anyhow!(
        "At least one age threshold must be specified for clean\n\n\
         hint: Use --remove-tagged-older-than <DURATION> for tagged versions (e.g., '80w')\n\
         hint: Use --remove-untagged-older-than <DURATION> for untagged versions (e.g., '26w')\n\
         hint: Add --dry-run to preview what would be deleted"
    )
}

/// Generate an error for a registry request rejected for lack of credentials.
pub fn registry_credentials(url: &str, message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Registry operation failed for {url}: {message}\n\n\
         hint: For ghcr.io set GITHUB_TOKEN (or GH_TOKEN) with the delete:packages scope\n\
         hint: For docker.io set DOCKERHUB_USERNAME and DOCKERHUB_TOKEN"
    )
}

/// Attach hints to a library error where one applies.
///
/// `config` is used to suggest similarly named images and versions.
pub fn explain(error: Error, config: Option<&Configuration>) -> anyhow::Error {
    match error {
        Error::ConfigNotFound { root } => config_not_found(&root),
        Error::ImageNotFound { name } => {
            let known: Vec<&str> = config
                .map(|c| c.images.iter().map(|i| i.name.as_str()).collect())
                .unwrap_or_default();
            unknown_image(&name, &known)
        }
        Error::VersionNotFound { image, version } => {
            let known: Vec<&str> = config
                .and_then(|c| c.get_image(&image))
                .map(|i| i.versions.iter().map(|v| v.name.as_str()).collect())
                .unwrap_or_default();
            unknown_version(&image, &version, &known)
        }
        Error::ToolNotFound {
            tool,
            env_var,
            tools_dir,
        } => tool_not_found(&tool, &env_var, &tools_dir),
        Error::Registry { url, message }
            if message.contains("401") || message.contains("must be set") || message.contains("is not set") =>
        {
            registry_credentials(&url, &message)
        }
        other => anyhow::Error::new(other),
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];
    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_len]
}
