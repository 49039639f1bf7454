//! Dependency constraint resolution.
//!
//! A constraint selects versions from a list of candidate version strings:
//!
//! - `latest: true` takes the newest version, then the newest patch of each
//!   next-older minor line, until `count` (default 1) versions are collected.
//! - Without `latest`, the `count` highest versions are taken at full
//!   granularity. Without `count` either, every version within the bounds is
//!   returned.
//! - `min` and `max` are inclusive bounds that may be partial: `max: "3.10"`
//!   admits every `3.10.x`.
//!
//! Results are ordered newest first. Build metadata does not take part in
//! ordering.

use std::cmp::Ordering;
use std::collections::HashSet;

use semver::Version;
use serde::{Deserialize, Serialize};

use super::DependencyKind;
use crate::error::{Error, Result};

/// Selection rules for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VersionConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    /// Consider prerelease versions as candidates.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prereleases: bool,
}

impl VersionConstraint {
    fn is_latest(&self) -> bool {
        self.latest.unwrap_or(false)
    }

    /// Reject malformed constraints before any candidate is examined.
    pub fn validate(&self, dependency: DependencyKind) -> Result<()> {
        let fail = |message: String| Error::Constraint {
            dependency: dependency.to_string(),
            message,
        };

        if let Some(count) = self.count {
            if count <= 0 {
                return Err(fail(format!("count must be a positive integer, got {count}")));
            }
        }
        if self.is_latest() && self.min.is_some() && self.max.is_some() {
            return Err(fail(
                "latest cannot be combined with both min and max".to_string(),
            ));
        }
        if self.latest.is_none() && self.count.is_none() && self.min.is_none() && self.max.is_none()
        {
            return Err(fail(
                "constraint must set at least one of latest, count, min or max".to_string(),
            ));
        }

        let min = self.min.as_deref().map(Bound::parse).transpose();
        let max = self.max.as_deref().map(Bound::parse).transpose();
        match (min, max) {
            (Err(bad), _) | (_, Err(bad)) => Err(fail(format!("invalid version bound '{bad}'"))),
            (Ok(Some(min)), Ok(Some(max))) if min.exceeds(&max) => {
                Err(fail(format!("min {} is greater than max {}", min, max)))
            }
            _ => Ok(()),
        }
    }
}

/// A possibly partial version used as an inclusive bound.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    parts: Vec<u64>,
}

impl Bound {
    fn parse(input: &str) -> std::result::Result<Self, String> {
        let trimmed = input.trim().trim_start_matches(['v', 'V']);
        let parts = trimmed
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| input.to_string())?;
        if parts.is_empty() || parts.len() > 3 {
            return Err(input.to_string());
        }
        Ok(Self { parts })
    }

    /// Whether this bound lies above `other` at their shared precision.
    fn exceeds(&self, other: &Bound) -> bool {
        let shared = self.parts.len().min(other.parts.len());
        self.parts[..shared] > other.parts[..shared]
    }

    /// Compare a version against this bound at the bound's precision.
    fn compare(&self, version: &Version) -> Ordering {
        let components = [version.major, version.minor, version.patch];
        for (component, bound) in components.iter().zip(&self.parts) {
            match component.cmp(bound) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Parse a candidate version string leniently.
///
/// A leading `v` is ignored and missing minor/patch components are filled
/// with zero, so `"v3.13"` parses as `3.13.0`.
pub fn parse_candidate(input: &str) -> Option<Version> {
    let trimmed = input.trim().trim_start_matches(['v', 'V']);
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let components = core.split('.').count();
    if core.is_empty() || components > 3 {
        return None;
    }
    let padded = format!("{}{}{}", core, ".0".repeat(3 - components), rest);
    Version::parse(&padded).ok()
}

fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Select the candidate versions matching `constraint`, newest first.
pub fn resolve(
    dependency: DependencyKind,
    constraint: &VersionConstraint,
    candidates: &[String],
) -> Result<Vec<String>> {
    constraint.validate(dependency)?;

    let min = constraint.min.as_deref().map(Bound::parse).transpose();
    let max = constraint.max.as_deref().map(Bound::parse).transpose();
    let (min, max) = match (min, max) {
        (Ok(min), Ok(max)) => (min, max),
        (Err(bad), _) | (_, Err(bad)) => {
            return Err(Error::Constraint {
                dependency: dependency.to_string(),
                message: format!("invalid version bound '{bad}'"),
            })
        }
    };

    let mut parsed: Vec<(Version, &String)> = Vec::new();
    let mut seen = HashSet::new();
    for candidate in candidates {
        let Some(version) = parse_candidate(candidate) else {
            log::debug!("Skipping unparseable {} version '{}'", dependency, candidate);
            continue;
        };
        if !version.pre.is_empty() && !constraint.prereleases {
            continue;
        }
        if !seen.insert((version.major, version.minor, version.patch, version.pre.clone())) {
            continue;
        }
        parsed.push((version, candidate));
    }

    parsed.sort_by(|(a, _), (b, _)| precedence(b, a));

    let in_bounds = parsed.into_iter().filter(|(version, _)| {
        min.as_ref()
            .is_none_or(|bound| bound.compare(version) != Ordering::Less)
            && max
                .as_ref()
                .is_none_or(|bound| bound.compare(version) != Ordering::Greater)
    });

    let selected: Vec<String> = if constraint.is_latest() {
        let count = constraint.count.unwrap_or(1) as usize;
        let mut lines = HashSet::new();
        in_bounds
            .filter(|(version, _)| lines.insert((version.major, version.minor)))
            .take(count)
            .map(|(_, original)| original.clone())
            .collect()
    } else {
        let matching = in_bounds.map(|(_, original)| original.clone());
        match constraint.count {
            Some(count) => matching.take(count as usize).collect(),
            None => matching.collect(),
        }
    };

    if selected.is_empty() {
        return Err(Error::Constraint {
            dependency: dependency.to_string(),
            message: format!(
                "no versions satisfy the constraint among {} candidates",
                candidates.len()
            ),
        });
    }
    Ok(selected)
}
