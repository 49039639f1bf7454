//! # Project Scaffolding
//!
//! Creates and removes projects, images and versions. These operations edit
//! `bakery.yaml` directly; images declared in per-image manifests are
//! read-only here.

use std::path::{Path, PathBuf};

use crate::config::{
    find_config_file, ConfigFile, Configuration, ImageSpec, OsDetail, OsSpec, RepositorySpec,
    VersionSpec, CONFIG_FILENAMES,
};
use crate::dependency::{resolve_all, VersionSource};
use crate::error::{Error, Result};
use crate::path::tag_safe;
use crate::render::render_version;
use crate::templating::Renderer;

const CONTAINERFILE_TEMPLATE: &str = r#"{% if OS -%}
FROM {{ OS.distribution }}:{{ OS.version }}
{% else -%}
FROM scratch
{% endif %}
LABEL org.opencontainers.image.title="{{ Image.name }}"
LABEL org.opencontainers.image.version="{{ Version.name }}"

COPY {{ Image.name }}/{{ Version.name | tag_safe }}/deps/packages.txt /tmp/packages.txt
{%- if OS %}
{%- if OS.family == "debian" %}
RUN apt-get update -y \
    && xargs -a /tmp/packages.txt apt-get install -y --no-install-recommends \
    && rm -rf /var/lib/apt/lists/*
{%- else %}
RUN xargs -a /tmp/packages.txt dnf install -y \
    && dnf clean all
{%- endif %}
{%- endif %}
"#;

const GOSS_TEMPLATE: &str = r#"# Tests for {{ Image.name }} {{ Version.name }}
command:
  uname:
    exit-status: 0
"#;

const PACKAGES_TEMPLATE: &str = r#"# Packages installed into {{ Image.name }} {{ Version.name }}
ca-certificates
curl
"#;

/// Template files written for a new image, relative to its template directory.
pub const IMAGE_TEMPLATES: &[(&str, &str)] = &[
    ("Containerfile.tera", CONTAINERFILE_TEMPLATE),
    ("test/goss.yaml.tera", GOSS_TEMPLATE),
    ("deps/packages.txt.tera", PACKAGES_TEMPLATE),
];

/// Write `content` to `path`, refusing to replace an existing file.
fn create_file(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Err(Error::TemplateExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    log::info!("Created {}", path.display());
    Ok(())
}

/// Create a new project configuration in `root`.
pub fn create_project(root: &Path, repository: RepositorySpec) -> Result<PathBuf> {
    if let Ok(existing) = find_config_file(root) {
        return Err(Error::TemplateExists { path: existing });
    }
    std::fs::create_dir_all(root)?;
    let path = root.join(CONFIG_FILENAMES[0]);
    let file = ConfigFile {
        repository,
        ..Default::default()
    };
    create_file(&path, &serde_yaml::to_string(&file)?)?;
    Ok(path)
}

/// Add an image to the project and write its starter templates.
pub fn create_image(root: &Path, name: &str, subpath: Option<&str>) -> Result<PathBuf> {
    let config_path = find_config_file(root)?;
    let mut file = ConfigFile::read(&config_path)?;
    if file.images.iter().any(|i| i.name == name) {
        return Err(Error::Config {
            message: format!("image '{}' already exists", name),
        });
    }
    file.images.push(ImageSpec {
        name: name.to_string(),
        subpath: subpath.map(String::from),
        ..Default::default()
    });
    // Validate before touching the filesystem
    Configuration::from_file(root, &config_path, file.clone())?;

    let template_dir = root.join(subpath.unwrap_or(name)).join("template");
    for (relative, _) in IMAGE_TEMPLATES {
        let path = template_dir.join(relative);
        if path.exists() {
            return Err(Error::TemplateExists { path });
        }
    }
    for (relative, content) in IMAGE_TEMPLATES {
        create_file(&template_dir.join(relative), content)?;
    }
    file.write(&config_path)?;
    Ok(template_dir)
}

/// Options for a new version.
#[derive(Debug, Clone, Default)]
pub struct VersionOptions {
    pub subpath: Option<String>,
    /// Mark the new version latest, clearing the flag on the others.
    pub latest: bool,
    /// OS list; copied from the image's latest version when empty.
    pub os: Vec<String>,
    pub primary_os: Option<String>,
}

/// Add a version to an image, pin its dependencies and render its files.
pub fn create_version(
    root: &Path,
    image: &str,
    version: &str,
    options: &VersionOptions,
    source: &dyn VersionSource,
) -> Result<Vec<PathBuf>> {
    let config_path = find_config_file(root)?;
    let mut file = ConfigFile::read(&config_path)?;
    let spec = file.image_mut(image).ok_or_else(|| Error::ImageNotFound {
        name: image.to_string(),
    })?;
    if spec.versions.iter().any(|v| v.name == version) {
        return Err(Error::Config {
            message: format!("version '{}' of image '{}' already exists", version, image),
        });
    }

    let os = if options.os.is_empty() {
        spec.versions
            .iter()
            .find(|v| v.latest)
            .or_else(|| spec.versions.last())
            .map(|v| v.os.clone())
            .unwrap_or_default()
    } else {
        options
            .os
            .iter()
            .map(|name| {
                let primary = options.primary_os.as_deref() == Some(name.as_str());
                if primary {
                    OsSpec::Detailed(OsDetail {
                        name: name.clone(),
                        primary,
                        ..Default::default()
                    })
                } else {
                    OsSpec::Name(name.clone())
                }
            })
            .collect()
    };

    let dependencies = resolve_all(&spec.dependency_constraints, source)?;

    if options.latest {
        for existing in &mut spec.versions {
            existing.latest = false;
        }
    }
    spec.versions.push(VersionSpec {
        name: version.to_string(),
        subpath: options.subpath.clone(),
        latest: options.latest,
        os,
        dependencies,
        ..Default::default()
    });

    let config = Configuration::from_file(root, &config_path, file.clone())?;
    let image = config.get_image(image).ok_or_else(|| Error::ImageNotFound {
        name: image.to_string(),
    })?;
    let version = image
        .get_version(version)
        .ok_or_else(|| Error::VersionNotFound {
            image: image.name.clone(),
            version: version.to_string(),
        })?;

    // The configuration is only saved once the version renders
    let existed = version.path.exists();
    match render_version(&config, image, version, &mut Renderer::new()) {
        Ok(written) => {
            file.write(&config_path)?;
            Ok(written)
        }
        Err(e) => {
            if !existed && version.path.is_dir() {
                std::fs::remove_dir_all(&version.path)?;
            }
            Err(e)
        }
    }
}

fn remove_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
        log::info!("Removed {}", path.display());
    } else {
        log::warn!("{} does not exist, nothing to delete", path.display());
    }
    Ok(())
}

/// Remove an image from the configuration and delete its directory.
pub fn remove_image(root: &Path, name: &str) -> Result<PathBuf> {
    let config_path = find_config_file(root)?;
    let mut file = ConfigFile::read(&config_path)?;
    let index = file
        .images
        .iter()
        .position(|i| i.name == name)
        .ok_or_else(|| Error::ImageNotFound {
            name: name.to_string(),
        })?;
    let removed = file.images.remove(index);
    let directory = root.join(removed.subpath.as_deref().unwrap_or(&removed.name));
    file.write(&config_path)?;
    remove_dir(&directory)?;
    Ok(directory)
}

/// Remove a version from an image and delete its directory.
pub fn remove_version(root: &Path, image: &str, version: &str) -> Result<PathBuf> {
    let config_path = find_config_file(root)?;
    let mut file = ConfigFile::read(&config_path)?;
    let spec = file.image_mut(image).ok_or_else(|| Error::ImageNotFound {
        name: image.to_string(),
    })?;
    let index = spec
        .versions
        .iter()
        .position(|v| v.name == version)
        .ok_or_else(|| Error::VersionNotFound {
            image: image.to_string(),
            version: version.to_string(),
        })?;
    let removed = spec.versions.remove(index);
    let directory = root
        .join(spec.subpath.as_deref().unwrap_or(&spec.name))
        .join(removed.subpath.unwrap_or_else(|| tag_safe(&removed.name)));
    file.write(&config_path)?;
    remove_dir(&directory)?;
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{DependencyKind, DependencyConstraint, VersionConstraint};
    use tempfile::TempDir;

    struct FixedSource;

    impl VersionSource for FixedSource {
        fn available_versions(&self, _kind: DependencyKind) -> Result<Vec<String>> {
            Ok(vec!["3.13.7".to_string(), "3.13.6".to_string(), "3.12.11".to_string()])
        }
    }

    fn new_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        create_project(
            dir.path(),
            RepositorySpec {
                vendor: Some("Acme".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_create_project_refuses_overwrite() {
        let dir = new_project();
        assert!(matches!(
            create_project(dir.path(), RepositorySpec::default()),
            Err(Error::TemplateExists { .. })
        ));
    }

    #[test]
    fn test_create_image_writes_templates() {
        let dir = new_project();
        let template_dir = create_image(dir.path(), "base", None).unwrap();
        assert!(template_dir.join("Containerfile.tera").is_file());
        assert!(template_dir.join("test/goss.yaml.tera").is_file());
        let config = Configuration::load(dir.path()).unwrap();
        assert!(config.get_image("base").is_some());

        assert!(create_image(dir.path(), "base", None).is_err());
    }

    #[test]
    fn test_create_image_refuses_existing_templates() {
        let dir = new_project();
        let existing = dir.path().join("base/template/Containerfile.tera");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, "FROM scratch\n").unwrap();
        assert!(matches!(
            create_image(dir.path(), "base", None),
            Err(Error::TemplateExists { .. })
        ));
        // Configuration untouched
        let config = Configuration::load(dir.path()).unwrap();
        assert!(config.get_image("base").is_none());
    }

    #[test]
    fn test_create_version_renders_and_pins() {
        let dir = new_project();
        create_image(dir.path(), "base", None).unwrap();
        let config_path = dir.path().join("bakery.yaml");
        let mut file = ConfigFile::read(&config_path).unwrap();
        file.images[0].dependency_constraints = vec![DependencyConstraint {
            dependency: DependencyKind::Python,
            constraint: VersionConstraint {
                latest: Some(true),
                count: Some(2),
                ..Default::default()
            },
        }];
        file.write(&config_path).unwrap();

        let options = VersionOptions {
            latest: true,
            os: vec!["Ubuntu 24.04".to_string()],
            ..Default::default()
        };
        let written = create_version(dir.path(), "base", "1.0", &options, &FixedSource).unwrap();
        assert!(written
            .iter()
            .any(|p| p.ends_with("base/1.0/Containerfile.ubuntu2404")));

        let config = Configuration::load(dir.path()).unwrap();
        let version = config.get_image("base").unwrap().get_version("1.0").unwrap();
        assert!(version.latest);
        assert_eq!(version.dependencies[0].versions, vec!["3.13.7", "3.12.11"]);

        let containerfile =
            std::fs::read_to_string(dir.path().join("base/1.0/Containerfile.ubuntu2404")).unwrap();
        assert!(containerfile.starts_with("FROM ubuntu:24.04"));
        assert!(containerfile.contains("apt-get"));
    }

    #[test]
    fn test_create_version_moves_latest_and_copies_os() {
        let dir = new_project();
        create_image(dir.path(), "base", None).unwrap();
        let first = VersionOptions {
            latest: true,
            os: vec!["Ubuntu 24.04".to_string(), "RHEL 9".to_string()],
            primary_os: Some("Ubuntu 24.04".to_string()),
            ..Default::default()
        };
        create_version(dir.path(), "base", "1.0", &first, &FixedSource).unwrap();
        let second = VersionOptions {
            latest: true,
            ..Default::default()
        };
        create_version(dir.path(), "base", "2.0", &second, &FixedSource).unwrap();

        let config = Configuration::load(dir.path()).unwrap();
        let image = config.get_image("base").unwrap();
        assert!(!image.get_version("1.0").unwrap().latest);
        let latest = image.get_version("2.0").unwrap();
        assert!(latest.latest);
        assert_eq!(latest.os.len(), 2);
        assert_eq!(latest.primary_os_entry().unwrap().name, "Ubuntu 24.04");
    }

    #[test]
    fn test_create_version_without_os() {
        let dir = new_project();
        create_image(dir.path(), "base", None).unwrap();
        create_version(dir.path(), "base", "1.0", &VersionOptions::default(), &FixedSource)
            .unwrap();

        let containerfile =
            std::fs::read_to_string(dir.path().join("base/1.0/Containerfile")).unwrap();
        assert!(containerfile.starts_with("FROM scratch"));
        assert!(!containerfile.contains("RUN"));
    }

    #[test]
    fn test_failed_render_leaves_project_unchanged() {
        let dir = new_project();
        create_image(dir.path(), "base", None).unwrap();
        let broken = dir.path().join("base/template/broken.txt.tera");
        std::fs::write(&broken, "{{ Missing.value }}\n").unwrap();
        let config_path = dir.path().join("bakery.yaml");
        let before = std::fs::read_to_string(&config_path).unwrap();

        let options = VersionOptions {
            os: vec!["Ubuntu 24.04".to_string()],
            ..Default::default()
        };
        let err = create_version(dir.path(), "base", "1.0", &options, &FixedSource).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), before);
        assert!(!dir.path().join("base/1.0").exists());

        // Retrying after fixing the template succeeds
        std::fs::remove_file(&broken).unwrap();
        create_version(dir.path(), "base", "1.0", &options, &FixedSource).unwrap();
        let config = Configuration::load(dir.path()).unwrap();
        assert!(config.get_image("base").unwrap().get_version("1.0").is_some());
    }

    #[test]
    fn test_create_version_unknown_image() {
        let dir = new_project();
        assert!(matches!(
            create_version(dir.path(), "nope", "1.0", &VersionOptions::default(), &FixedSource),
            Err(Error::ImageNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_version_and_image() {
        let dir = new_project();
        create_image(dir.path(), "base", None).unwrap();
        let options = VersionOptions {
            os: vec!["Ubuntu 24.04".to_string()],
            ..Default::default()
        };
        create_version(dir.path(), "base", "1.0", &options, &FixedSource).unwrap();

        let removed = remove_version(dir.path(), "base", "1.0").unwrap();
        assert!(!removed.exists());
        assert!(matches!(
            remove_version(dir.path(), "base", "1.0"),
            Err(Error::VersionNotFound { .. })
        ));

        let removed = remove_image(dir.path(), "base").unwrap();
        assert!(!removed.exists());
        let config = Configuration::load(dir.path()).unwrap();
        assert!(config.images.is_empty());
    }
}
