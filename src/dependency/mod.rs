//! # Dependency Versions
//!
//! Images commonly bundle language runtimes (Python, R, Quarto). Which
//! versions they bundle is declared either as explicit pins on an image
//! version, or as a *constraint* on the image that is resolved against the
//! vendor's published release list when a new version is created.
//!
//! - [`constraint`] holds the constraint type and the resolver that selects a
//!   subset of candidate versions.
//! - [`sources`] fetches candidate versions from vendor release metadata.

pub mod constraint;
pub mod sources;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use constraint::{resolve, VersionConstraint};
pub use sources::{HttpVersionSource, VersionSource};

use crate::error::Result;

/// A dependency the tool knows how to discover versions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependencyKind {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "R", alias = "r")]
    R,
    #[serde(rename = "quarto")]
    Quarto,
}

impl DependencyKind {
    /// Name used as the key in template contexts.
    pub fn key(&self) -> &'static str {
        match self {
            DependencyKind::Python => "python",
            DependencyKind::R => "R",
            DependencyKind::Quarto => "quarto",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A constraint on one dependency, declared at image level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyConstraint {
    pub dependency: DependencyKind,
    pub constraint: VersionConstraint,
}

/// Pinned versions of one dependency, declared at version level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyVersions {
    pub dependency: DependencyKind,
    pub versions: Vec<String>,
}

/// Resolve every constraint against versions fetched from `source`.
pub fn resolve_all(
    constraints: &[DependencyConstraint],
    source: &dyn VersionSource,
) -> Result<Vec<DependencyVersions>> {
    let mut resolved = Vec::with_capacity(constraints.len());
    for item in constraints {
        item.constraint.validate(item.dependency)?;
        let candidates = source.available_versions(item.dependency)?;
        let versions = resolve(item.dependency, &item.constraint, &candidates)?;
        log::info!("Resolved {} versions: {}", item.dependency, versions.join(", "));
        resolved.push(DependencyVersions {
            dependency: item.dependency,
            versions,
        });
    }
    Ok(resolved)
}
