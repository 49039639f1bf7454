//! Images, versions, variants and their OS entries.
//!
//! These are the validated counterparts of the schema types. Construction
//! never fails outright: problems are appended to a shared error list so a
//! whole file can be reported at once, and the partially built value is
//! discarded by the caller when the list is non-empty.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::options::{duplicate_tools, ToolOptions};
use super::registry::{dedupe_registries, Registry, RegistryScope};
use super::schema::{ImageSpec, OsSpec, VariantSpec, VersionSpec};
use super::tags::TagPattern;
use crate::dependency::{DependencyConstraint, DependencyVersions};
use crate::os::{self, OsDescriptor};
use crate::path::{condense, join_subpath, slugify, tag_safe};

/// Image names are lowercase alphanumerics separated by `-`, `_` or `.`.
fn is_valid_image_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

fn is_valid_subpath(subpath: &str) -> bool {
    let path = Path::new(subpath);
    !subpath.trim().is_empty()
        && path.is_relative()
        && path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub name: String,
    pub subpath: String,
    /// Absolute path, resolved when the configuration is linked.
    pub path: PathBuf,
    pub extra_registries: Option<Vec<Registry>>,
    pub override_registries: Option<Vec<Registry>>,
    pub tag_patterns: Option<Vec<TagPattern>>,
    pub options: Vec<ToolOptions>,
    pub dependency_constraints: Vec<DependencyConstraint>,
    pub variants: Vec<Variant>,
    pub versions: Vec<Version>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Version {
    pub name: String,
    pub subpath: String,
    /// Absolute path, resolved when the configuration is linked.
    pub path: PathBuf,
    pub latest: bool,
    pub os: Vec<OsEntry>,
    /// Index into `os` of the primary OS, if the version has any OS.
    pub primary_os: Option<usize>,
    pub dependencies: Vec<DependencyVersions>,
    pub options: Vec<ToolOptions>,
    pub extra_registries: Option<Vec<Registry>>,
    pub override_registries: Option<Vec<Registry>>,
    /// Index of the owning image in the configuration.
    pub image: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub name: String,
    pub extension: String,
    pub tag_display_name: String,
    pub primary: bool,
    pub options: Vec<ToolOptions>,
    pub extra_registries: Option<Vec<Registry>>,
    pub override_registries: Option<Vec<Registry>>,
    pub tags: Vec<String>,
    /// Index of the owning image in the configuration.
    pub image: usize,
}

/// One operating system a version is built for.
#[derive(Debug, Clone, Serialize)]
pub struct OsEntry {
    pub name: String,
    pub extension: String,
    pub tag_display_name: String,
    pub descriptor: OsDescriptor,
}

macro_rules! impl_registry_scope {
    ($($ty:ty),*) => {$(
        impl RegistryScope for $ty {
            fn extra_registries(&self) -> Option<&[Registry]> {
                self.extra_registries.as_deref()
            }
            fn override_registries(&self) -> Option<&[Registry]> {
                self.override_registries.as_deref()
            }
        }
    )*};
}

impl_registry_scope!(Image, Version, Variant);

impl Image {
    pub(crate) fn from_spec(
        spec: ImageSpec,
        index: usize,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Self {
        let owner = format!("image '{}'", spec.name);
        if !is_valid_image_name(&spec.name) {
            errors.push(format!(
                "{}: name must be lowercase alphanumerics separated by '-', '_' or '.'",
                owner
            ));
        }
        let subpath = spec.subpath.unwrap_or_else(|| spec.name.clone());
        if !is_valid_subpath(&subpath) {
            errors.push(format!("{}: invalid subpath '{}'", owner, subpath));
        }
        validate_registries(&owner, &spec.extra_registries, &spec.override_registries, errors);
        if let Some(patterns) = &spec.tag_patterns {
            for pattern in patterns {
                pattern.validate(errors, &owner);
            }
        }
        validate_options(&owner, &spec.options, errors);

        let mut constrained = HashSet::new();
        for item in &spec.dependency_constraints {
            if !constrained.insert(item.dependency) {
                errors.push(format!(
                    "{}: more than one constraint for dependency '{}'",
                    owner, item.dependency
                ));
            }
            if let Err(e) = item.constraint.validate(item.dependency) {
                errors.push(format!("{}: {}", owner, e));
            }
        }

        let variants: Vec<Variant> = spec
            .variants
            .into_iter()
            .map(|v| Variant::from_spec(v, index, &owner, errors, warnings))
            .collect();
        check_variants(&owner, &variants, errors, warnings);

        let versions: Vec<Version> = spec
            .versions
            .into_iter()
            .map(|v| Version::from_spec(v, index, &owner, errors, warnings))
            .collect();
        check_versions(&owner, &versions, errors);

        Self {
            name: spec.name,
            subpath,
            path: PathBuf::new(),
            extra_registries: spec
                .extra_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            override_registries: spec
                .override_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            tag_patterns: spec.tag_patterns,
            options: spec.options,
            dependency_constraints: spec.dependency_constraints,
            variants,
            versions,
        }
    }

    /// Resolve the image and version paths below `root`.
    pub(crate) fn link(&mut self, root: &Path) -> crate::error::Result<()> {
        self.path = join_subpath(Some(root), &self.subpath, &format!("image '{}'", self.name))?;
        for version in &mut self.versions {
            version.path = join_subpath(
                Some(&self.path),
                &version.subpath,
                &format!("version '{}' of image '{}'", version.name, self.name),
            )?;
        }
        Ok(())
    }

    pub fn get_version(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name == name)
    }

    pub fn get_variant(&self, name: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.name == name || v.extension == name)
    }

    /// Directory holding the image's templates.
    pub fn template_path(&self) -> PathBuf {
        self.path.join("template")
    }
}

impl Version {
    fn from_spec(
        spec: VersionSpec,
        image: usize,
        image_owner: &str,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Self {
        let owner = format!("{} version '{}'", image_owner, spec.name);
        if spec.name.trim().is_empty() {
            errors.push(format!("{}: version name must not be empty", image_owner));
        }
        let subpath = spec.subpath.unwrap_or_else(|| tag_safe(&spec.name));
        if !is_valid_subpath(&subpath) {
            errors.push(format!("{}: invalid subpath '{}'", owner, subpath));
        }
        validate_registries(&owner, &spec.extra_registries, &spec.override_registries, errors);
        validate_options(&owner, &spec.options, errors);

        let mut seen_deps = HashSet::new();
        for deps in &spec.dependencies {
            if !seen_deps.insert(deps.dependency) {
                errors.push(format!(
                    "{}: dependency '{}' listed more than once",
                    owner, deps.dependency
                ));
            }
            if deps.versions.is_empty() {
                errors.push(format!(
                    "{}: dependency '{}' has no versions",
                    owner, deps.dependency
                ));
            }
        }

        let details: Vec<_> = spec.os.iter().map(OsSpec::detail).collect();
        let mut os = Vec::with_capacity(details.len());
        let mut primaries = Vec::new();
        for (idx, detail) in details.iter().enumerate() {
            if detail.primary {
                primaries.push(idx);
            }
            let descriptor = os::resolve(&detail.name);
            if !descriptor.is_known() {
                let message = format!(
                    "{}: OS '{}' is not a supported OS, continuing without a built-in profile",
                    owner, detail.name
                );
                log::warn!("{}", message);
                warnings.push(message);
            }
            os.push(OsEntry {
                extension: detail
                    .extension
                    .clone()
                    .unwrap_or_else(|| condense(&detail.name)),
                tag_display_name: detail
                    .tag_display_name
                    .clone()
                    .unwrap_or_else(|| tag_safe(&detail.name)),
                name: detail.name.clone(),
                descriptor,
            });
        }

        let mut names = HashSet::new();
        for entry in &os {
            if !names.insert(entry.extension.clone()) {
                errors.push(format!("{}: OS '{}' listed more than once", owner, entry.name));
            }
            if entry.extension.is_empty() {
                errors.push(format!("{}: OS '{}' has an empty extension", owner, entry.name));
            }
        }

        let primary_os = match (os.len(), primaries.as_slice()) {
            (0, _) => None,
            (1, _) => Some(0),
            (_, [single]) => Some(*single),
            (_, []) => {
                errors.push(format!(
                    "{}: a primary OS must be designated when more than one OS is listed",
                    owner
                ));
                None
            }
            (_, _) => {
                errors.push(format!("{}: more than one primary OS designated", owner));
                None
            }
        };

        Self {
            name: spec.name,
            subpath,
            path: PathBuf::new(),
            latest: spec.latest,
            os,
            primary_os,
            dependencies: spec.dependencies,
            options: spec.options,
            extra_registries: spec
                .extra_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            override_registries: spec
                .override_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            image,
        }
    }

    pub fn primary_os_entry(&self) -> Option<&OsEntry> {
        self.primary_os.and_then(|idx| self.os.get(idx))
    }

    /// Pinned versions of each dependency, keyed by dependency name.
    pub fn dependency_map(&self) -> HashMap<String, Vec<String>> {
        self.dependencies
            .iter()
            .map(|d| (d.dependency.key().to_string(), d.versions.clone()))
            .collect()
    }
}

impl Variant {
    fn from_spec(
        spec: VariantSpec,
        image: usize,
        image_owner: &str,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Self {
        let owner = format!("{} variant '{}'", image_owner, spec.name);
        if spec.name.trim().is_empty() {
            errors.push(format!("{}: variant name must not be empty", image_owner));
        }
        let extension = spec
            .extension
            .map(|e| tag_safe(&e))
            .unwrap_or_else(|| slugify(&spec.name));
        if extension.is_empty() {
            errors.push(format!("{}: extension must not be empty", owner));
        }
        let tag_display_name = spec
            .tag_display_name
            .map(|t| tag_safe(&t))
            .unwrap_or_else(|| extension.clone());
        validate_registries(&owner, &spec.extra_registries, &spec.override_registries, errors);
        validate_options(&owner, &spec.options, errors);
        for tag in &spec.tags {
            if tag.trim().is_empty() {
                errors.push(format!("{}: tag pattern must not be empty", owner));
            }
        }

        Self {
            name: spec.name,
            extension,
            tag_display_name,
            primary: spec.primary,
            options: spec.options,
            extra_registries: spec
                .extra_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            override_registries: spec
                .override_registries
                .map(|r| dedupe_registries(r, &owner, warnings)),
            tags: spec.tags,
            image,
        }
    }
}

fn validate_registries(
    owner: &str,
    extra: &Option<Vec<Registry>>,
    overrides: &Option<Vec<Registry>>,
    errors: &mut Vec<String>,
) {
    if extra.is_some() && overrides.is_some() {
        log::warn!("{}: overrideRegistries set, extraRegistries ignored", owner);
    }
    for registry in extra.iter().chain(overrides.iter()).flatten() {
        registry.validate(errors, owner);
    }
}

fn validate_options(owner: &str, options: &[ToolOptions], errors: &mut Vec<String>) {
    for tool in duplicate_tools(options) {
        errors.push(format!("{}: options for '{}' declared more than once", owner, tool));
    }
}

fn check_variants(owner: &str, variants: &[Variant], errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let mut extensions = HashSet::new();
    for variant in variants {
        if !extensions.insert(variant.extension.as_str()) {
            errors.push(format!(
                "{}: variant extension '{}' used more than once",
                owner, variant.extension
            ));
        }
    }
    let primaries = variants.iter().filter(|v| v.primary).count();
    if primaries > 1 {
        errors.push(format!("{}: more than one primary variant designated", owner));
    } else if primaries == 0 && variants.len() > 1 {
        let message = format!(
            "{}: no primary variant designated, primaryVariant tags will not be produced",
            owner
        );
        log::warn!("{}", message);
        warnings.push(message);
    }
}

fn check_versions(owner: &str, versions: &[Version], errors: &mut Vec<String>) {
    let mut names = HashSet::new();
    let mut subpaths = HashSet::new();
    for version in versions {
        if !names.insert(version.name.as_str()) {
            errors.push(format!("{}: version '{}' declared more than once", owner, version.name));
        } else if !subpaths.insert(version.subpath.as_str()) {
            errors.push(format!(
                "{}: version '{}' resolves to subpath '{}' which is already used",
                owner, version.name, version.subpath
            ));
        }
    }
    if versions.iter().filter(|v| v.latest).count() > 1 {
        errors.push(format!("{}: more than one version marked latest", owner));
    }
}

/// Whether a variant counts as primary: explicitly, or by being the only one.
pub fn is_primary_variant(image: &Image, variant: &Variant) -> bool {
    variant.primary || image.variants.len() == 1
}
