//! # Dependencies Command Implementation
//!
//! This module implements the `dependencies` subcommand. It lists the
//! dependency constraints of each image and the versions pinned by each
//! image version. With `--resolve`, constraints are evaluated against the
//! vendors' current release lists, showing what a new version would pin.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use bakery::config::Image;
use bakery::dependency::{resolve_all, HttpVersionSource};
use bakery::output::{OutputConfig, Status};
use bakery::suggestions;

use super::load_config;

/// Show dependency constraints and the versions they resolve to
#[derive(Args, Debug)]
pub struct DependenciesArgs {
    /// Only show this image
    pub image: Option<String>,

    /// Resolve constraints against published versions (requires network access)
    #[arg(long)]
    pub resolve: bool,
}

pub fn execute(args: DependenciesArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = load_config(root)?;

    let images: Vec<&Image> = match &args.image {
        Some(name) => vec![config.get_image(name).ok_or_else(|| {
            suggestions::explain(
                bakery::error::Error::ImageNotFound { name: name.clone() },
                Some(&config),
            )
        })?],
        None => config.images.iter().collect(),
    };
    let source = if args.resolve {
        Some(HttpVersionSource::new()?)
    } else {
        None
    };

    for image in images {
        println!("{} {}", out.marker(Status::Info), out.strong(&image.name));
        if image.dependency_constraints.is_empty() {
            println!("   no constraints");
        }
        for item in &image.dependency_constraints {
            println!(
                "   {} constraint: {}",
                item.dependency,
                serde_json::to_string(&item.constraint)?
            );
        }
        if let Some(source) = &source {
            for resolved in resolve_all(&image.dependency_constraints, source)? {
                println!(
                    "   {} resolves to: {}",
                    resolved.dependency,
                    resolved.versions.join(", ")
                );
            }
        }
        for version in &image.versions {
            for pinned in &version.dependencies {
                println!(
                    "   {} {}: {}",
                    out.dim(&version.name),
                    pinned.dependency,
                    pinned.versions.join(", ")
                );
            }
        }
    }
    Ok(())
}
