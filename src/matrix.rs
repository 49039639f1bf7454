//! # Matrix Expansion
//!
//! Expands a [`Configuration`] into the flat list of [`BuildTarget`]s: one
//! per image, version, OS and variant. A version without OS entries and an
//! image without variants each count as a single slot, so such targets
//! simply omit that dimension from their id, file names and tags.
//!
//! For every target the engine computes:
//!
//! - a unique id, `sanitize_id("{image}-{version}-{condensed os}-{variant}")`;
//!   two targets with the same id are rejected,
//! - the Containerfile path relative to the project root, with the project
//!   root as build context,
//! - the tag list, rendered from the tag patterns that apply to the target
//!   and expanded over every registry,
//! - the label map: OCI build fields, then repository metadata, then
//!   image-specific fields, later entries overriding earlier ones.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tera::Context;

use crate::config::{
    is_primary_variant, Configuration, Image, OsEntry, ResolvedGoss, TagFacts, TagPattern, Variant,
    Version,
};
use crate::error::{Error, Result};
use crate::path::{condense, relative_to, sanitize_id, tag_safe};
use crate::templating::Renderer;

pub const LABEL_CREATED: &str = "org.opencontainers.image.created";
pub const LABEL_REVISION: &str = "org.opencontainers.image.revision";
pub const LABEL_SOURCE: &str = "org.opencontainers.image.source";
pub const LABEL_VENDOR: &str = "org.opencontainers.image.vendor";
pub const LABEL_AUTHORS: &str = "org.opencontainers.image.authors";
pub const LABEL_TITLE: &str = "org.opencontainers.image.title";
pub const LABEL_VERSION: &str = "org.opencontainers.image.version";

/// Values shared by every target of one plan.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub created: DateTime<Utc>,
    /// Source control revision, resolved once per plan.
    pub revision: Option<String>,
}

impl BuildContext {
    pub fn new(created: DateTime<Utc>, revision: Option<String>) -> Self {
        Self { created, revision }
    }

    /// Current time and the project's current revision, if it is a repository.
    pub fn current(root: &Path) -> Self {
        Self::new(Utc::now(), crate::git::current_revision(root))
    }
}

/// Restricts expansion to matching images, versions, OSes and variants.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    pub image: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub variant: Option<String>,
}

impl TargetFilter {
    /// Fail when the filter names an image or version that does not exist.
    pub fn validate(&self, config: &Configuration) -> Result<()> {
        let images: Vec<&Image> = match &self.image {
            Some(name) => vec![config.get_image(name).ok_or_else(|| Error::ImageNotFound {
                name: name.clone(),
            })?],
            None => config.images.iter().collect(),
        };
        if let Some(version) = &self.version {
            if !images.iter().any(|i| i.get_version(version).is_some()) {
                return Err(Error::VersionNotFound {
                    image: self.image.clone().unwrap_or_else(|| "*".to_string()),
                    version: version.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn matches_image(&self, image: &Image) -> bool {
        self.image.as_ref().is_none_or(|name| *name == image.name)
    }

    pub fn matches_version(&self, version: &Version) -> bool {
        self.version.as_ref().is_none_or(|name| *name == version.name)
    }

    pub fn matches_os(&self, os: Option<&OsEntry>) -> bool {
        match (&self.os, os) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(os)) => {
                os.name.eq_ignore_ascii_case(wanted)
                    || os.extension == *wanted
                    || condense(&os.name) == condense(wanted)
            }
        }
    }

    pub fn matches_variant(&self, variant: Option<&Variant>) -> bool {
        match (&self.variant, variant) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(variant)) => {
                variant.name.eq_ignore_ascii_case(wanted) || variant.extension == *wanted
            }
        }
    }
}

/// One concrete build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildTarget {
    pub id: String,
    pub image: String,
    pub version: String,
    pub os: Option<String>,
    pub variant: Option<String>,
    pub variant_extension: Option<String>,
    pub latest: bool,
    pub primary_os: bool,
    pub primary_variant: bool,
    /// Directory of the rendered version, relative to the project root.
    pub version_path: PathBuf,
    /// Containerfile path relative to the project root.
    pub containerfile: PathBuf,
    /// Build context, always the project root.
    pub context: PathBuf,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub goss: ResolvedGoss,
}

impl BuildTarget {
    /// Human-readable coordinates for messages.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.image.clone(), self.version.clone()];
        parts.extend(self.os.clone());
        parts.extend(self.variant.clone());
        parts.join("/")
    }
}

/// Name of the Containerfile for one OS and variant.
pub fn containerfile_name(os: Option<&OsEntry>, variant: Option<&Variant>) -> String {
    let mut name = String::from("Containerfile");
    if let Some(os) = os {
        name.push('.');
        name.push_str(&os.extension);
    }
    if let Some(variant) = variant {
        name.push('.');
        name.push_str(&variant.extension);
    }
    name
}

/// Expand the configuration into build targets.
pub fn expand(
    config: &Configuration,
    filter: &TargetFilter,
    context: &BuildContext,
) -> Result<Vec<BuildTarget>> {
    filter.validate(config)?;
    check_collisions(config)?;
    let mut renderer = Renderer::new();
    let mut targets = Vec::new();

    for image in config.images.iter().filter(|i| filter.matches_image(i)) {
        let variants: Vec<Option<&Variant>> = if image.variants.is_empty() {
            vec![None]
        } else {
            image.variants.iter().map(Some).collect()
        };
        for version in image.versions.iter().filter(|v| filter.matches_version(v)) {
            let os_list: Vec<Option<&OsEntry>> = if version.os.is_empty() {
                vec![None]
            } else {
                version.os.iter().map(Some).collect()
            };
            for os in os_list.iter().copied().filter(|o| filter.matches_os(*o)) {
                for variant in variants.iter().copied().filter(|v| filter.matches_variant(*v)) {
                    targets.push(build_target(
                        config,
                        image,
                        version,
                        os,
                        variant,
                        context,
                        &mut renderer,
                    )?);
                }
            }
        }
    }
    log::debug!("Expanded {} build targets", targets.len());
    Ok(targets)
}

/// Reject two targets of the full matrix sharing an id, whatever the
/// filter selects.
fn check_collisions(config: &Configuration) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for image in &config.images {
        for version in &image.versions {
            let os_list: Vec<Option<&OsEntry>> = if version.os.is_empty() {
                vec![None]
            } else {
                version.os.iter().map(Some).collect()
            };
            let variants: Vec<Option<&Variant>> = if image.variants.is_empty() {
                vec![None]
            } else {
                image.variants.iter().map(Some).collect()
            };
            for os in &os_list {
                for variant in &variants {
                    let id = target_id(image, version, *os, *variant);
                    let mut parts = vec![image.name.clone(), version.name.clone()];
                    parts.extend(os.map(|o| o.name.clone()));
                    parts.extend(variant.map(|v| v.name.clone()));
                    let second = parts.join("/");
                    if let Some(first) = seen.insert(id.clone(), second.clone()) {
                        return Err(Error::TargetCollision { id, first, second });
                    }
                }
            }
        }
    }
    Ok(())
}

fn target_id(image: &Image, version: &Version, os: Option<&OsEntry>, variant: Option<&Variant>) -> String {
    let mut parts = vec![image.name.clone(), version.name.clone()];
    parts.extend(os.map(|o| condense(&o.name)));
    parts.extend(variant.map(|v| v.extension.clone()));
    sanitize_id(&parts.join("-"))
}

fn build_target(
    config: &Configuration,
    image: &Image,
    version: &Version,
    os: Option<&OsEntry>,
    variant: Option<&Variant>,
    context: &BuildContext,
    renderer: &mut Renderer,
) -> Result<BuildTarget> {
    let primary_os = match os {
        None => true,
        Some(entry) => version
            .primary_os_entry()
            .is_some_and(|p| p.extension == entry.extension),
    };
    let primary_variant = variant.is_none_or(|v| is_primary_variant(image, v));
    let facts = TagFacts {
        latest: version.latest,
        primary_os,
        primary_variant,
    };

    let patterns = config.resolve_tag_patterns(image, os.is_some(), variant.is_some());
    let extra: &[String] = variant.map(|v| v.tags.as_slice()).unwrap_or(&[]);
    let tags = render_tags(renderer, &patterns, extra, &facts, version, os, variant)?;

    let registries = config.resolve_registries(image, version, variant);
    let full_tags: Vec<String> = if registries.is_empty() {
        tags.iter().map(|t| format!("{}:{}", image.name, t)).collect()
    } else {
        registries
            .iter()
            .flat_map(|r| {
                let reference = r.image_ref(&image.name);
                tags.iter().map(move |t| format!("{}:{}", reference, t))
            })
            .collect()
    };

    let version_path = relative_to(&version.path, &config.root);
    Ok(BuildTarget {
        id: target_id(image, version, os, variant),
        image: image.name.clone(),
        version: version.name.clone(),
        os: os.map(|o| o.name.clone()),
        variant: variant.map(|v| v.name.clone()),
        variant_extension: variant.map(|v| v.extension.clone()),
        latest: version.latest,
        primary_os,
        primary_variant,
        containerfile: version_path.join(containerfile_name(os, variant)),
        version_path,
        context: PathBuf::from("."),
        tags: dedupe(full_tags),
        labels: build_labels(config, image, version, os, variant, context),
        goss: config.resolve_goss(image, version, variant),
    })
}

fn render_tags(
    renderer: &mut Renderer,
    patterns: &[TagPattern],
    extra: &[String],
    facts: &TagFacts,
    version: &Version,
    os: Option<&OsEntry>,
    variant: Option<&Variant>,
) -> Result<Vec<String>> {
    let mut ctx = Context::new();
    ctx.insert("Version", &version.name);
    if let Some(os) = os {
        ctx.insert("OS", &os.tag_display_name);
    }
    if let Some(variant) = variant {
        ctx.insert("Variant", &variant.tag_display_name);
    }

    let templates = patterns
        .iter()
        .filter(|p| p.applies_to(facts))
        .flat_map(|p| p.patterns.iter())
        .chain(extra.iter());

    let mut tags = Vec::new();
    for template in templates {
        let rendered = tag_safe(renderer.render_str(template, &ctx)?.trim());
        if rendered.is_empty() {
            log::warn!("Tag pattern '{}' rendered to an empty tag, skipped", template);
            continue;
        }
        tags.push(rendered);
    }
    Ok(dedupe(tags))
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn build_labels(
    config: &Configuration,
    image: &Image,
    version: &Version,
    os: Option<&OsEntry>,
    variant: Option<&Variant>,
    context: &BuildContext,
) -> BTreeMap<String, String> {
    let repository = &config.repository;
    let prefix = &repository.label_prefix;
    let mut labels = BTreeMap::new();

    labels.insert(
        LABEL_CREATED.to_string(),
        context.created.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    if let Some(revision) = &context.revision {
        labels.insert(LABEL_REVISION.to_string(), revision.clone());
    }

    if let Some(url) = &repository.url {
        labels.insert(LABEL_SOURCE.to_string(), url.clone());
    }
    if let Some(vendor) = &repository.vendor {
        labels.insert(LABEL_VENDOR.to_string(), vendor.clone());
        labels.insert(format!("{}.vendor", prefix), vendor.clone());
    }
    if let Some(maintainer) = &repository.maintainer {
        labels.insert(format!("{}.maintainer", prefix), maintainer.clone());
    }
    if !repository.authors.is_empty() {
        let authors = repository.authors.join(", ");
        labels.insert(LABEL_AUTHORS.to_string(), authors.clone());
        labels.insert(format!("{}.authors", prefix), authors);
    }

    labels.insert(LABEL_TITLE.to_string(), image.name.clone());
    labels.insert(LABEL_VERSION.to_string(), version.name.clone());
    labels.insert(format!("{}.name", prefix), image.name.clone());
    labels.insert(format!("{}.version", prefix), version.name.clone());
    if let Some(os) = os {
        labels.insert(format!("{}.os", prefix), os.name.clone());
    }
    if let Some(variant) = variant {
        labels.insert(format!("{}.variant", prefix), variant.name.clone());
    }
    labels
}
