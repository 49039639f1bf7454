//! # Image Template Rendering
//!
//! Every image keeps its templates in `<image>/template/`. Rendering a
//! version walks that directory and writes into the version directory:
//!
//! - files ending in `.tera` are rendered and written without the suffix,
//! - `Containerfile*.tera` is rendered once per OS and variant, producing
//!   `Containerfile.<os extension>.<variant extension>`,
//! - every other file is copied as is.
//!
//! Templates see `Image`, `Version`, `OS`, `Variant`, `Dependencies` and
//! `Repository`. `OS` and `Variant` are only defined for Containerfiles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{Configuration, Image, OsEntry, Repository, Variant, Version};
use crate::error::{Error, ErrorGroup, Result};
use crate::matrix::containerfile_name;
use crate::templating::Renderer;

/// Suffix marking a file as a template.
pub const TEMPLATE_SUFFIX: &str = ".tera";

const CONTAINERFILE: &str = "Containerfile";

#[derive(Serialize)]
struct ImageContext<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionContext<'a> {
    name: &'a str,
    latest: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OsContext<'a> {
    name: &'a str,
    extension: &'a str,
    tag_display_name: &'a str,
    family: String,
    distribution: &'a str,
    version: &'a str,
    codename: Option<&'a str>,
    package_suffix: &'a str,
    package_separator: &'a str,
    architecture: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VariantContext<'a> {
    name: &'a str,
    extension: &'a str,
    tag_display_name: &'a str,
    primary: bool,
}

#[derive(Serialize)]
struct TemplateContext<'a> {
    #[serde(rename = "Image")]
    image: ImageContext<'a>,
    #[serde(rename = "Version")]
    version: VersionContext<'a>,
    #[serde(rename = "OS", skip_serializing_if = "Option::is_none")]
    os: Option<OsContext<'a>>,
    #[serde(rename = "Variant", skip_serializing_if = "Option::is_none")]
    variant: Option<VariantContext<'a>>,
    #[serde(rename = "Dependencies")]
    dependencies: BTreeMap<String, Vec<String>>,
    #[serde(rename = "Repository")]
    repository: &'a Repository,
}

impl<'a> TemplateContext<'a> {
    fn new(
        repository: &'a Repository,
        image: &'a Image,
        version: &'a Version,
        os: Option<&'a OsEntry>,
        variant: Option<&'a Variant>,
    ) -> Self {
        Self {
            image: ImageContext { name: &image.name },
            version: VersionContext {
                name: &version.name,
                latest: version.latest,
            },
            os: os.map(|o| OsContext {
                name: &o.name,
                extension: &o.extension,
                tag_display_name: &o.tag_display_name,
                family: o.descriptor.family.to_string(),
                distribution: &o.descriptor.distribution,
                version: &o.descriptor.version,
                codename: o.descriptor.codename.as_deref(),
                package_suffix: o.descriptor.package_suffix(),
                package_separator: o.descriptor.package_separator(),
                architecture: o.descriptor.family.architecture(),
            }),
            variant: variant.map(|v| VariantContext {
                name: &v.name,
                extension: &v.extension,
                tag_display_name: &v.tag_display_name,
                primary: v.primary,
            }),
            dependencies: version.dependency_map().into_iter().collect(),
            repository,
        }
    }
}

/// Render the templates of `image` into the directory of `version`.
///
/// Returns the written files. Failures of individual files are collected
/// and reported together after every file was attempted.
pub fn render_version(
    config: &Configuration,
    image: &Image,
    version: &Version,
    renderer: &mut Renderer,
) -> Result<Vec<PathBuf>> {
    let template_dir = image.template_path();
    if !template_dir.is_dir() {
        return Err(Error::Config {
            message: format!(
                "image '{}' has no template directory at {}",
                image.name,
                template_dir.display()
            ),
        });
    }

    let mut written = Vec::new();
    let mut failures = ErrorGroup::new(format!(
        "Failed to render image '{}' version '{}'",
        image.name, version.name
    ));

    for entry in WalkDir::new(&template_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(Error::Io(e.into()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.path();
        let relative = source.strip_prefix(&template_dir).unwrap_or(source);
        match render_file(config, image, version, source, relative, renderer) {
            Ok(mut files) => written.append(&mut files),
            Err(e) => failures.push_with_path(e, source),
        }
    }

    failures.into_result()?;
    log::info!(
        "Rendered {} files for {} {}",
        written.len(),
        image.name,
        version.name
    );
    Ok(written)
}

fn render_file(
    config: &Configuration,
    image: &Image,
    version: &Version,
    source: &Path,
    relative: &Path,
    renderer: &mut Renderer,
) -> Result<Vec<PathBuf>> {
    let relative_str = relative.to_string_lossy();
    let Some(stripped) = relative_str.strip_suffix(TEMPLATE_SUFFIX) else {
        let destination = version.path.join(relative);
        write_file(&destination, &std::fs::read(source)?)?;
        return Ok(vec![destination]);
    };

    let template = std::fs::read_to_string(source)?;
    let output = PathBuf::from(stripped);
    let is_containerfile = output
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(CONTAINERFILE));

    if !is_containerfile {
        let context = TemplateContext::new(&config.repository, image, version, None, None);
        let destination = version.path.join(&output);
        write_file(&destination, renderer.render_value(&template, &context)?.as_bytes())?;
        return Ok(vec![destination]);
    }

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

    let mut written = Vec::new();
    for os in &os_list {
        for variant in &variants {
            let suffix = containerfile_name(*os, *variant);
            let suffix = suffix.trim_start_matches(CONTAINERFILE);
            let destination = version
                .path
                .join(format!("{}{}", output.to_string_lossy(), suffix));
            let context = TemplateContext::new(&config.repository, image, version, *os, *variant);
            write_file(&destination, renderer.render_value(&template, &context)?.as_bytes())?;
            written.push(destination);
        }
    }
    Ok(written)
}

fn write_file(destination: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(destination, content)?;
    log::debug!("Wrote {}", destination.display());
    Ok(())
}

/// Render every version of every image selected by `image` and `version`.
pub fn render_all(
    config: &Configuration,
    image: Option<&str>,
    version: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let images: Vec<&Image> = match image {
        Some(name) => vec![config.get_image(name).ok_or_else(|| Error::ImageNotFound {
            name: name.to_string(),
        })?],
        None => config.images.iter().collect(),
    };

    let mut renderer = Renderer::new();
    let mut written = Vec::new();
    let mut failures = ErrorGroup::new("Failed to render templates");
    for image in images {
        let versions: Vec<&Version> = match version {
            Some(name) => match image.get_version(name) {
                Some(v) => vec![v],
                None => {
                    return Err(Error::VersionNotFound {
                        image: image.name.clone(),
                        version: name.to_string(),
                    })
                }
            },
            None => image.versions.iter().collect(),
        };
        for version in versions {
            match render_version(config, image, version, &mut renderer) {
                Ok(mut files) => written.append(&mut files),
                Err(e) => failures.push_with_path(e, &version.path),
            }
        }
    }
    failures.into_result()?;
    Ok(written)
}
