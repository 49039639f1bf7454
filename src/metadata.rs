//! Build metadata written by `docker buildx bake --metadata-file`.
//!
//! The file maps each bake target id to what was built for it:
//!
//! ```json
//! {
//!   "workbench-2025-04-0-ubuntu2404-std": {
//!     "image.name": "ghcr.io/acme/workbench:2025.04.0,ghcr.io/acme/workbench:latest",
//!     "containerimage.digest": "sha256:...",
//!     "containerimage.descriptor": {"mediaType": "...", "digest": "sha256:...", "size": 1234}
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMetadata {
    /// Comma-separated image references.
    #[serde(rename = "image.name", default)]
    pub image_name: Option<String>,
    #[serde(rename = "containerimage.digest", default)]
    pub digest: Option<String>,
    #[serde(rename = "containerimage.descriptor", default)]
    pub descriptor: Option<Descriptor>,
}

impl TargetMetadata {
    pub fn image_names(&self) -> Vec<String> {
        self.image_name
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Parsed build metadata, keyed by target id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildMetadata {
    pub targets: BTreeMap<String, TargetMetadata>,
}

impl BuildMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
            hint: Some("Pass the file written by `bakery build --metadata-file`".to_string()),
        })
    }

    pub fn parse(json: &str) -> std::result::Result<Self, serde_json::Error> {
        // Bake also writes bookkeeping entries such as "buildx.build.warnings"
        // whose values are not target records.
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut targets = BTreeMap::new();
        for (id, value) in raw {
            if id.starts_with("buildx.") {
                continue;
            }
            targets.insert(id, serde_json::from_value(value)?);
        }
        Ok(Self { targets })
    }

    pub fn get(&self, id: &str) -> Option<&TargetMetadata> {
        self.targets.get(id)
    }

    /// Reference to run for a target: its first image name pinned to the
    /// built digest when both are known.
    pub fn image_ref(&self, id: &str) -> Option<String> {
        let entry = self.get(id)?;
        let name = entry.image_names().into_iter().next();
        match (name, &entry.digest) {
            (Some(name), Some(digest)) => {
                let repository = strip_tag(&name);
                Some(format!("{}@{}", repository, digest))
            }
            (Some(name), None) => Some(name),
            (None, _) => None,
        }
    }
}

/// Remove the `:tag` suffix of a reference, leaving registry ports intact.
fn strip_tag(reference: &str) -> &str {
    match reference.rfind(':') {
        Some(idx) if !reference[idx..].contains('/') => &reference[..idx],
        _ => reference,
    }
}
