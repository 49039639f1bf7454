//! # Configuration Model
//!
//! This module loads a project's declarative configuration into a validated,
//! queryable object graph.
//!
//! ## Files
//!
//! - **`bakery.yaml`** (or `bakery.yml`) at the project root declares the
//!   repository metadata, registries, tag patterns, tool options and images.
//! - **`bakery.override.yaml`** next to it may replace the registries (when
//!   present and non-empty) and individual repository fields.
//! - **`<dir>/manifest.yaml`** files declare additional images, one per
//!   directory. See [`manifest`].
//!
//! ## Loading
//!
//! [`Configuration::load`] parses every file, then validates the whole tree
//! at once. Validation failures are collected and reported together as
//! [`Error::ConfigValidation`]; conditions that do not break a build, such as
//! an OS without a built-in profile, are logged as warnings and kept in
//! [`Configuration::warnings`].
//!
//! After validation, every image and version path is resolved below the
//! project root. Versions and variants refer to their image by index, and
//! inherited values (registries, tag patterns, tool options) are looked up
//! through the configuration rather than through back-pointers.

pub mod image;
pub mod manifest;
pub mod options;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod tags;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use image::{is_primary_variant, Image, OsEntry, Variant, Version};
pub use options::{resolve_goss, GossOptions, ResolvedGoss, ToolOptions};
pub use registry::{inherit_registries, Registry, RegistryScope};
pub use repository::{Repository, RepositorySpec, DEFAULT_LABEL_PREFIX};
pub use schema::{ConfigFile, ImageSpec, OsDetail, OsSpec, OverrideFile, VariantSpec, VersionSpec};
pub use tags::{default_tag_patterns, TagFacts, TagFilter, TagPattern};

use crate::error::{Error, ErrorGroup, Result};
use crate::plan::DEFAULT_GROUP;

/// Primary configuration file names, in lookup order.
pub const CONFIG_FILENAMES: &[&str] = &["bakery.yaml", "bakery.yml"];

/// Override file name, looked up next to the primary configuration.
pub const OVERRIDE_FILENAME: &str = "bakery.override.yaml";

/// Locate the configuration file in `root`.
pub fn find_config_file(root: &Path) -> Result<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::ConfigNotFound {
            root: root.to_path_buf(),
        })
}

/// The validated configuration of one project.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Project root; every relative path is resolved against it.
    pub root: PathBuf,
    /// The configuration file the model was loaded from.
    pub source: PathBuf,
    pub repository: Repository,
    pub registries: Vec<Registry>,
    pub tag_patterns: Option<Vec<TagPattern>>,
    pub options: Vec<ToolOptions>,
    pub images: Vec<Image>,
    warnings: Vec<String>,
}

impl Configuration {
    /// Load the configuration of the project at `project_root`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let source = find_config_file(project_root)?;
        log::debug!("Loading configuration from {}", source.display());
        let mut file = ConfigFile::read(&source)?;

        let override_path = project_root.join(OVERRIDE_FILENAME);
        if override_path.is_file() {
            log::debug!("Applying overrides from {}", override_path.display());
            let content = std::fs::read_to_string(&override_path)?;
            let overrides: OverrideFile = schema::parse_document(&override_path, &content)?;
            file = apply_override(file, overrides);
        }

        let manifests = manifest::load_all(project_root)?;
        for (path, image) in &manifests {
            log::debug!("Adding image '{}' from {}", image.name, path.display());
        }

        Self::from_sources(project_root, &source, file, manifests)
    }

    /// Validate a parsed configuration document and build the model.
    pub fn from_file(root: &Path, source: &Path, file: ConfigFile) -> Result<Self> {
        Self::from_sources(root, source, file, Vec::new())
    }

    /// Validate a configuration document together with images declared in
    /// manifests. Each validation error is reported against the file that
    /// declared the offending entry.
    pub fn from_sources(
        root: &Path,
        source: &Path,
        file: ConfigFile,
        manifests: Vec<(PathBuf, ImageSpec)>,
    ) -> Result<Self> {
        let mut file_errors = FileErrors::new(source);
        let mut warnings = Vec::new();

        let errors = file_errors.of(source);
        let repository = Repository::from_spec(file.repository, errors, &mut warnings);

        for registry in &file.registries {
            registry.validate(errors, "registries");
        }
        let registries = registry::dedupe_registries(file.registries, "registries", &mut warnings);

        if let Some(patterns) = &file.tag_patterns {
            for pattern in patterns {
                pattern.validate(errors, "tagPatterns");
            }
        }
        for tool in options::duplicate_tools(&file.options) {
            errors.push(format!("options: '{}' declared more than once", tool));
        }

        let mut names = HashSet::new();
        let mut subpaths = HashSet::new();
        let mut images = Vec::with_capacity(file.images.len() + manifests.len());
        let mut origins = Vec::with_capacity(images.capacity());
        let specs = file
            .images
            .into_iter()
            .map(|spec| (source.to_path_buf(), spec))
            .chain(manifests);
        for (index, (origin, spec)) in specs.enumerate() {
            let errors = file_errors.of(&origin);
            if !names.insert(spec.name.clone()) {
                errors.push(format!("image '{}' declared more than once", spec.name));
                continue;
            }
            let image = Image::from_spec(spec, index, errors, &mut warnings);
            if !subpaths.insert(image.subpath.clone()) {
                errors.push(format!(
                    "image '{}': subpath '{}' is already used by another image",
                    image.name, image.subpath
                ));
            }
            images.push(image);
            origins.push(origin);
        }

        // Image names and variant extensions both name bake groups
        let extensions: HashSet<&str> = images
            .iter()
            .flat_map(|i| i.variants.iter().map(|v| v.extension.as_str()))
            .collect();
        for (image, origin) in images.iter().zip(&origins) {
            if image.name == DEFAULT_GROUP {
                file_errors.of(origin).push(format!(
                    "image '{}': name is reserved for the group of all targets",
                    image.name
                ));
            } else if extensions.contains(image.name.as_str()) {
                file_errors.of(origin).push(format!(
                    "image '{}': name is also used as a variant extension",
                    image.name
                ));
            }
        }

        file_errors.into_result()?;

        // Indices were assigned before duplicates were skipped; renumber so
        // each index matches the image's position.
        for (index, image) in images.iter_mut().enumerate() {
            for version in &mut image.versions {
                version.image = index;
            }
            for variant in &mut image.variants {
                variant.image = index;
            }
            image.link(root)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            source: source.to_path_buf(),
            repository,
            registries,
            tag_patterns: file.tag_patterns,
            options: file.options,
            images,
            warnings,
        })
    }

    /// Non-fatal findings from validation.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn get_image(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.name == name)
    }

    /// Owning image of a version or variant.
    pub fn image_of(&self, index: usize) -> Option<&Image> {
        self.images.get(index)
    }

    /// Base URLs of the project registries, sorted.
    pub fn get_registry_base_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.registries.iter().map(Registry::base_url).collect();
        urls.sort();
        urls.dedup();
        urls
    }

    /// Registries a target is pushed to: project, then image, version and
    /// variant adjustments, sorted by base URL.
    pub fn resolve_registries(
        &self,
        image: &Image,
        version: &Version,
        variant: Option<&Variant>,
    ) -> Vec<Registry> {
        let mut registries = inherit_registries(&self.registries, image);
        registries = inherit_registries(&registries, version);
        if let Some(variant) = variant {
            registries = inherit_registries(&registries, variant);
        }
        registries.sort_by_key(Registry::base_url);
        registries
    }

    /// Tag patterns for an image: its own, the project's, or the defaults.
    pub fn resolve_tag_patterns(&self, image: &Image, has_os: bool, has_variant: bool) -> Vec<TagPattern> {
        image
            .tag_patterns
            .clone()
            .or_else(|| self.tag_patterns.clone())
            .unwrap_or_else(|| default_tag_patterns(has_os, has_variant))
    }

    /// Goss options for a target, most specific level first.
    pub fn resolve_goss(&self, image: &Image, version: &Version, variant: Option<&Variant>) -> ResolvedGoss {
        let variant_options: &[ToolOptions] = variant.map(|v| v.options.as_slice()).unwrap_or(&[]);
        resolve_goss(&[variant_options, &version.options, &image.options, &self.options])
    }
}

/// Validation errors grouped by the file that declared the offending entry.
struct FileErrors {
    files: Vec<(PathBuf, Vec<String>)>,
}

impl FileErrors {
    fn new(source: &Path) -> Self {
        Self {
            files: vec![(source.to_path_buf(), Vec::new())],
        }
    }

    fn of(&mut self, path: &Path) -> &mut Vec<String> {
        let index = match self.files.iter().position(|(p, _)| p == path) {
            Some(index) => index,
            None => {
                self.files.push((path.to_path_buf(), Vec::new()));
                self.files.len() - 1
            }
        };
        &mut self.files[index].1
    }

    /// One [`Error::ConfigValidation`] per file with errors.
    fn into_result(self) -> Result<()> {
        let mut failures = ErrorGroup::new("Configuration validation failed");
        for (path, errors) in self.files {
            if !errors.is_empty() {
                failures.push_with_path(
                    Error::ConfigValidation {
                        path: path.clone(),
                        errors,
                    },
                    path,
                );
            }
        }
        failures.into_result()
    }
}

/// Apply an override document to the primary configuration.
///
/// Registries are replaced only by a present, non-empty list. Repository
/// fields are replaced individually.
pub fn apply_override(mut file: ConfigFile, overrides: OverrideFile) -> ConfigFile {
    if let Some(registries) = overrides.registries.filter(|r| !r.is_empty()) {
        file.registries = registries;
    }
    if let Some(repository) = overrides.repository {
        file.repository = file.repository.overlay(repository);
    }
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
repository:
  url: github.com/acme/images
  vendor: Acme
registries:
  - host: ghcr.io
    namespace: acme
  - host: docker.io
    namespace: acme
images:
  - name: workbench
    extraRegistries:
      - host: quay.io
        namespace: acme
    variants:
      - name: Standard
        extension: std
        primary: true
        options: [{tool: goss, wait: 15}]
      - name: Minimal
        extension: min
    versions:
      - name: "2025.04.0"
        latest: true
        os:
          - name: Ubuntu 24.04
            primary: true
          - Ubuntu 22.04
"#;

    fn project(config: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bakery.yaml"), config).unwrap();
        dir
    }

    #[test]
    fn test_load() {
        let dir = project(CONFIG);
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(config.images.len(), 1);
        let image = config.get_image("workbench").unwrap();
        assert_eq!(image.path, dir.path().join("workbench"));
        assert_eq!(image.versions[0].path, dir.path().join("workbench").join("2025.04.0"));
        assert!(config.get_image("missing").is_none());
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Configuration::load(dir.path()),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_validation_errors_are_aggregated() {
        let dir = project(
            r#"
images:
  - name: Bad
  - name: good
    versions:
      - name: "1.0"
        os: [Ubuntu 24.04, Ubuntu 22.04]
"#,
        );
        match Configuration::load(dir.path()).unwrap_err() {
            Error::ConfigValidation { path, errors } => {
                assert!(path.ends_with("bakery.yaml"));
                assert_eq!(errors.len(), 2, "{:?}", errors);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_base_urls_sorted() {
        let dir = project(CONFIG);
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(
            config.get_registry_base_urls(),
            vec!["docker.io/acme", "ghcr.io/acme"]
        );
    }

    #[test]
    fn test_resolve_registries_chain() {
        let dir = project(CONFIG);
        let config = Configuration::load(dir.path()).unwrap();
        let image = &config.images[0];
        let urls: Vec<String> = config
            .resolve_registries(image, &image.versions[0], Some(&image.variants[0]))
            .iter()
            .map(Registry::base_url)
            .collect();
        assert_eq!(urls, vec!["docker.io/acme", "ghcr.io/acme", "quay.io/acme"]);
    }

    #[test]
    fn test_resolve_goss_chain() {
        let dir = project(CONFIG);
        let config = Configuration::load(dir.path()).unwrap();
        let image = &config.images[0];
        let version = &image.versions[0];
        assert_eq!(config.resolve_goss(image, version, Some(&image.variants[0])).wait, 15);
        assert_eq!(config.resolve_goss(image, version, Some(&image.variants[1])).wait, 0);
    }

    #[test]
    fn test_empty_override_registries_keep_primary() {
        let dir = project(CONFIG);
        std::fs::write(
            dir.path().join(OVERRIDE_FILENAME),
            "registries: []\nrepository:\n  vendor: Acme Override\n",
        )
        .unwrap();
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(config.registries.len(), 2);
        assert_eq!(config.repository.vendor.as_deref(), Some("Acme Override"));
        assert_eq!(
            config.repository.url.as_deref(),
            Some("https://github.com/acme/images")
        );
    }

    #[test]
    fn test_override_registries_replace() {
        let dir = project(CONFIG);
        std::fs::write(
            dir.path().join(OVERRIDE_FILENAME),
            "registries:\n  - host: localhost:5000\n",
        )
        .unwrap();
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(config.get_registry_base_urls(), vec!["localhost:5000"]);
    }

    #[test]
    fn test_manifest_images_are_merged() {
        let dir = project(CONFIG);
        let connect = dir.path().join("connect");
        std::fs::create_dir(&connect).unwrap();
        std::fs::write(
            connect.join("manifest.yaml"),
            "image: connect\nversions:\n  \"2025.01.0\":\n    os: [Ubuntu 24.04]\n",
        )
        .unwrap();
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(config.images.len(), 2);
        let image = config.get_image("connect").unwrap();
        assert_eq!(image.path, connect);
        assert_eq!(image.versions[0].image, 1);
    }

    #[test]
    fn test_manifest_errors_name_the_manifest() {
        let dir = project(CONFIG);
        let connect = dir.path().join("connect");
        std::fs::create_dir(&connect).unwrap();
        std::fs::write(
            connect.join("manifest.yaml"),
            "image: connect\nversions:\n  \"1.0\":\n    latest: true\n  \"2.0\":\n    latest: true\n",
        )
        .unwrap();
        match Configuration::load(dir.path()).unwrap_err() {
            Error::ConfigValidation { path, errors } => {
                assert!(path.ends_with("connect/manifest.yaml"), "{}", path.display());
                assert_eq!(errors.len(), 1, "{:?}", errors);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_errors_grouped_per_file() {
        let dir = project("images:\n  - name: Bad\n");
        let connect = dir.path().join("connect");
        std::fs::create_dir(&connect).unwrap();
        std::fs::write(connect.join("manifest.yaml"), "image: Connect\n").unwrap();
        match Configuration::load(dir.path()).unwrap_err() {
            Error::Group(group) => {
                assert_eq!(group.len(), 2);
                assert!(group.paths[0].ends_with("bakery.yaml"));
                assert!(group.paths[1].ends_with("connect/manifest.yaml"));
            }
            other => panic!("Expected grouped error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_registry_recorded_as_warning() {
        let dir = project(
            "registries:\n  - host: ghcr.io\n    namespace: acme\n  - host: ghcr.io\n    namespace: acme\n",
        );
        let config = Configuration::load(dir.path()).unwrap();
        assert_eq!(config.registries.len(), 1);
        assert_eq!(
            config.warnings(),
            ["registries: duplicate registry 'ghcr.io/acme' ignored"]
        );
    }

    #[test]
    fn test_image_named_like_variant_extension_rejected() {
        let dir = project(CONFIG);
        let std_dir = dir.path().join("std");
        std::fs::create_dir(&std_dir).unwrap();
        std::fs::write(std_dir.join("manifest.yaml"), "image: std\n").unwrap();
        match Configuration::load(dir.path()).unwrap_err() {
            Error::ConfigValidation { path, errors } => {
                assert!(path.ends_with("std/manifest.yaml"));
                assert_eq!(errors, ["image 'std': name is also used as a variant extension"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_image_named_default_rejected() {
        let dir = project("images:\n  - name: default\n");
        match Configuration::load(dir.path()).unwrap_err() {
            Error::ConfigValidation { path, errors } => {
                assert!(path.ends_with("bakery.yaml"));
                assert_eq!(
                    errors,
                    ["image 'default': name is reserved for the group of all targets"]
                );
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_image_from_manifest_rejected() {
        let dir = project(CONFIG);
        let other = dir.path().join("other");
        std::fs::create_dir(&other).unwrap();
        std::fs::write(other.join("manifest.yaml"), "image: workbench\n").unwrap();
        assert!(matches!(
            Configuration::load(dir.path()),
            Err(Error::ConfigValidation { .. })
        ));
    }
}
