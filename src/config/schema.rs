//! On-disk configuration documents.
//!
//! These types mirror `bakery.yaml` and `bakery.override.yaml` field for
//! field. They are deserialized without any interpretation; defaults,
//! inheritance and validation happen when they are turned into the model in
//! [`crate::config`]. Scaffolding commands edit a [`ConfigFile`] and write it
//! back, so every optional field is skipped when unset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::options::ToolOptions;
use super::registry::Registry;
use super::repository::RepositorySpec;
use super::tags::TagPattern;
use crate::dependency::{DependencyConstraint, DependencyVersions};
use crate::error::{Error, Result};

/// The project configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub repository: RepositorySpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<Registry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_patterns: Option<Vec<TagPattern>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ToolOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageSpec>,
}

/// The optional override file next to the project configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideFile {
    #[serde(default)]
    pub repository: Option<RepositorySpec>,
    #[serde(default)]
    pub registries: Option<Vec<Registry>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageSpec {
    pub name: String,
    /// Directory under the project root, defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_registries: Option<Vec<Registry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_registries: Option<Vec<Registry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_patterns: Option<Vec<TagPattern>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ToolOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_constraints: Vec<DependencyConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VariantSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ToolOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_registries: Option<Vec<Registry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_registries: Option<Vec<Registry>>,
    /// Additional tag patterns applied to every target of this variant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VersionSpec {
    pub name: String,
    /// Directory under the image, defaults to the tag-safe name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub latest: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<OsSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyVersions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ToolOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_registries: Option<Vec<Registry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_registries: Option<Vec<Registry>>,
}

/// An OS entry, either a bare name or a detailed mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OsSpec {
    Name(String),
    Detailed(OsDetail),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OsDetail {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_display_name: Option<String>,
}

impl OsSpec {
    pub fn detail(&self) -> OsDetail {
        match self {
            OsSpec::Name(name) => OsDetail {
                name: name.clone(),
                ..Default::default()
            },
            OsSpec::Detailed(detail) => detail.clone(),
        }
    }
}

impl ConfigFile {
    /// Read and parse a configuration file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_document(path, &content)
    }

    /// Serialize and write this configuration to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn image_mut(&mut self, name: &str) -> Option<&mut ImageSpec> {
        self.images.iter_mut().find(|i| i.name == name)
    }
}

/// Parse a YAML document, mapping failures to [`Error::ConfigParse`] with a
/// hint when the cause is recognizable.
pub fn parse_document<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    if content.trim().is_empty() {
        return serde_yaml::from_str("{}").map_err(|e| parse_error(path, e));
    }
    serde_yaml::from_str(content).map_err(|e| parse_error(path, e))
}

fn parse_error(path: &Path, err: serde_yaml::Error) -> Error {
    let message = err.to_string();
    let hint = if message.contains("unknown field") {
        Some("Check the field name spelling; keys are camelCase (e.g. tagPatterns, extraRegistries)")
    } else if message.contains("missing field") {
        Some("Add the required field to the entry named in the message")
    } else if message.contains("did not find expected") || message.contains("mapping values") {
        Some("Check the indentation and quoting of the YAML document")
    } else {
        None
    };
    Error::ConfigParse {
        path: path.to_path_buf(),
        message,
        hint: hint.map(String::from),
    }
}
