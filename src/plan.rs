//! # Build Plan
//!
//! Groups build targets and serializes them into the bake file format read
//! by `docker buildx bake`:
//!
//! ```json
//! {
//!   "group": {"default": {"targets": ["workbench-2025-04-0-ubuntu2404-std"]}},
//!   "target": {
//!     "workbench-2025-04-0-ubuntu2404-std": {
//!       "context": ".",
//!       "dockerfile": "workbench/2025.04.0/Containerfile.ubuntu2404.std",
//!       "labels": {"org.opencontainers.image.title": "workbench"},
//!       "tags": ["ghcr.io/acme/workbench:2025.04.0"]
//!     }
//!   }
//! }
//! ```
//!
//! The plan is written to [`PLAN_FILENAME`] in the project root only for the
//! duration of a build; [`PlanFile`] removes it when dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matrix::BuildTarget;

/// File the external builder reads the plan from.
pub const PLAN_FILENAME: &str = ".docker-bake.json";

/// Name of the group holding every target.
pub const DEFAULT_GROUP: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeGroup {
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeTarget {
    pub context: String,
    pub dockerfile: String,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// A serializable bake plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakePlan {
    pub group: BTreeMap<String, BakeGroup>,
    pub target: BTreeMap<String, BakeTarget>,
}

impl BakePlan {
    /// Assemble a plan: a `default` group with every target, plus one group
    /// per image name and one per variant extension. Group members keep the
    /// order of `targets`.
    pub fn from_targets(targets: &[BuildTarget]) -> Self {
        let mut plan = BakePlan::default();
        plan.group.insert(DEFAULT_GROUP.to_string(), BakeGroup::default());

        for target in targets {
            plan.add_to_group(DEFAULT_GROUP, &target.id);
            plan.add_to_group(&target.image, &target.id);
            if let Some(extension) = &target.variant_extension {
                plan.add_to_group(extension, &target.id);
            }
            plan.target.insert(
                target.id.clone(),
                BakeTarget {
                    context: path_string(&target.context),
                    dockerfile: path_string(&target.containerfile),
                    labels: target.labels.clone(),
                    tags: target.tags.clone(),
                },
            );
        }
        plan
    }

    // Members are not repeated.
    fn add_to_group(&mut self, group: &str, id: &str) {
        let members = &mut self.group.entry(group.to_string()).or_default().targets;
        if !members.iter().any(|m| m == id) {
            members.push(id.to_string());
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// A plan written to disk, removed again when dropped.
#[derive(Debug)]
pub struct PlanFile {
    path: PathBuf,
}

impl PlanFile {
    /// Write `plan` to [`PLAN_FILENAME`] in `root`.
    pub fn write(root: &Path, plan: &BakePlan) -> Result<Self> {
        let path = root.join(PLAN_FILENAME);
        std::fs::write(&path, plan.to_json()?)?;
        log::debug!("Wrote build plan to {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PlanFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed build plan {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove build plan {}: {}", self.path.display(), e),
        }
    }
}
