//! Per-image manifest files.
//!
//! An image may be declared in its own directory as `manifest.yaml` instead
//! of inline in `bakery.yaml`. The manifest is map-shaped: versions are keyed
//! by version string and targets (variants) by extension.
//!
//! ```yaml
//! image: connect
//! versions:
//!   "2025.01.0":
//!     os: ["Ubuntu 24.04", "Ubuntu 22.04"]
//!     primaryOS: Ubuntu 24.04
//!     latest: true
//! targets:
//!   std:
//!     primary: true
//!     goss: {command: "/opt/connect/start", wait: 5}
//!     tags: ["{{ Version }}-custom"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::options::{GossOptions, ToolOptions};
use super::schema::{parse_document, ImageSpec, OsDetail, OsSpec, VariantSpec, VersionSpec};
use crate::error::{Error, ErrorGroup, Result};

/// File name of per-image manifests.
pub const MANIFEST_FILENAME: &str = "manifest.yaml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    image: String,
    #[serde(default)]
    versions: serde_yaml::Mapping,
    #[serde(default)]
    targets: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestVersion {
    #[serde(default)]
    os: Vec<String>,
    #[serde(default, rename = "primaryOS", alias = "primaryOs")]
    primary_os: Option<String>,
    #[serde(default)]
    latest: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestTarget {
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    goss: Option<GossOptions>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Find every `<root>/<dir>/manifest.yaml`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = root.join("*").join(MANIFEST_FILENAME);
    let mut paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable manifest candidate: {}", e);
                None
            }
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load every discovered manifest, collecting failures across files.
pub fn load_all(root: &Path) -> Result<Vec<(PathBuf, ImageSpec)>> {
    let mut images = Vec::new();
    let mut failures = ErrorGroup::new("Failed to load image manifests");
    for path in discover(root)? {
        match load(&path) {
            Ok(image) => images.push((path, image)),
            Err(e) => failures.push_with_path(e, path),
        }
    }
    failures.into_result()?;
    Ok(images)
}

/// Load one manifest and convert it into an image entry.
pub fn load(path: &Path) -> Result<ImageSpec> {
    let content = std::fs::read_to_string(path)?;
    let manifest: ManifestFile = parse_document(path, &content)?;
    let subpath = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string());
    into_image(path, manifest, subpath)
}

fn key_string(path: &Path, key: &serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::ConfigParse {
            path: path.to_path_buf(),
            message: format!("expected a string key, found {:?}", other),
            hint: Some("Quote version keys, e.g. \"2025.01.0\"".to_string()),
        }),
    }
}

fn entry<T: serde::de::DeserializeOwned>(path: &Path, key: &str, value: serde_yaml::Value) -> Result<T> {
    let value = if value.is_null() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        value
    };
    serde_yaml::from_value(value).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        message: format!("{}: {}", key, e),
        hint: None,
    })
}

fn into_image(path: &Path, manifest: ManifestFile, subpath: Option<String>) -> Result<ImageSpec> {
    let mut versions = Vec::with_capacity(manifest.versions.len());
    for (key, value) in manifest.versions {
        let name = key_string(path, &key)?;
        let spec: ManifestVersion = entry(path, &name, value)?;
        if let Some(primary) = &spec.primary_os {
            if !spec.os.contains(primary) {
                return Err(Error::ConfigValidation {
                    path: path.to_path_buf(),
                    errors: vec![format!(
                        "version '{}': primaryOS '{}' is not in its os list",
                        name, primary
                    )],
                });
            }
        }
        let os = spec
            .os
            .into_iter()
            .map(|os| {
                let primary = spec.primary_os.as_deref() == Some(os.as_str());
                if primary {
                    OsSpec::Detailed(OsDetail {
                        name: os,
                        primary,
                        ..Default::default()
                    })
                } else {
                    OsSpec::Name(os)
                }
            })
            .collect();
        versions.push(VersionSpec {
            name,
            latest: spec.latest,
            os,
            ..Default::default()
        });
    }

    let mut variants = Vec::with_capacity(manifest.targets.len());
    for (key, value) in manifest.targets {
        let name = key_string(path, &key)?;
        let target: ManifestTarget = entry(path, &name, value)?;
        variants.push(VariantSpec {
            extension: Some(name.clone()),
            name,
            primary: target.primary,
            options: target.goss.map(ToolOptions::Goss).into_iter().collect(),
            tags: target.tags,
            ..Default::default()
        });
    }

    Ok(ImageSpec {
        name: manifest.image,
        subpath,
        variants,
        versions,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
image: connect
versions:
  "2025.01.0":
    os: ["Ubuntu 24.04", "Ubuntu 22.04"]
    primaryOS: Ubuntu 24.04
    latest: true
  "2024.12.0":
    os: ["Ubuntu 22.04"]
targets:
  std:
    primary: true
    goss: {wait: 5}
  min:
    tags: ["{{ Version }}-slim"]
"#;

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        let image_dir = dir.path().join("connect-dir");
        std::fs::create_dir(&image_dir).unwrap();
        let path = image_dir.join(MANIFEST_FILENAME);
        std::fs::write(&path, MANIFEST).unwrap();

        let image = load(&path).unwrap();
        assert_eq!(image.name, "connect");
        assert_eq!(image.subpath.as_deref(), Some("connect-dir"));
        assert_eq!(image.versions.len(), 2);
        assert_eq!(image.versions[0].name, "2025.01.0");
        assert!(image.versions[0].latest);
        assert!(image.versions[0].os[0].detail().primary);
        assert!(!image.versions[0].os[1].detail().primary);
        assert_eq!(image.variants[0].extension.as_deref(), Some("std"));
        assert!(image.variants[0].primary);
        assert_eq!(image.variants[1].tags, vec!["{{ Version }}-slim"]);
    }

    #[test]
    fn test_unknown_primary_os_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILENAME);
        std::fs::write(
            &path,
            "image: connect\nversions:\n  \"1.0\":\n    os: [Ubuntu 22.04]\n    primaryOS: Ubuntu 24.04\n",
        )
        .unwrap();
        match load(&path).unwrap_err() {
            Error::ConfigValidation { path: reported, errors } => {
                assert_eq!(reported, path);
                assert_eq!(
                    errors,
                    ["version '1.0': primaryOS 'Ubuntu 24.04' is not in its os list"]
                );
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_all_aggregates_failures() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("a").join(MANIFEST_FILENAME), MANIFEST).unwrap();
        std::fs::write(dir.path().join("b").join(MANIFEST_FILENAME), "image: [").unwrap();
        std::fs::write(dir.path().join("c").join(MANIFEST_FILENAME), "name: c").unwrap();

        match load_all(dir.path()).unwrap_err() {
            Error::Group(group) => {
                assert_eq!(group.len(), 2);
                assert!(group.paths[0].ends_with("b/manifest.yaml"));
                assert!(group.paths[1].ends_with("c/manifest.yaml"));
            }
            other => panic!("Expected grouped error, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_ignores_nested_manifests() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(MANIFEST_FILENAME), MANIFEST).unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }
}
