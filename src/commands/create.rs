//! # Create Command Implementation
//!
//! This module implements the `create` subcommand, which scaffolds new
//! projects, images and versions.
//!
//! ## Subcommands
//!
//! - **`project`**: Write a fresh `bakery.yaml` with repository metadata
//! - **`image`**: Add an image and write its starter templates
//! - **`version`**: Add a version, pin its dependencies and render its files

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use bakery::config::RepositorySpec;
use bakery::dependency::HttpVersionSource;
use bakery::output::{OutputConfig, Status};
use bakery::path::relative_to;
use bakery::scaffold::{self, VersionOptions};
use bakery::suggestions;

#[derive(Subcommand, Debug)]
pub enum CreateCommand {
    /// Create a new project configuration
    Project(ProjectArgs),
    /// Add an image to the project
    Image(ImageArgs),
    /// Add a version to an image
    Version(VersionArgs),
}

/// Arguments for `create project`
#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Source repository URL, used for OCI source labels
    #[arg(long)]
    pub url: Option<String>,

    /// Vendor name for labels
    #[arg(long)]
    pub vendor: Option<String>,

    /// Maintainer contact for labels
    #[arg(long)]
    pub maintainer: Option<String>,

    /// Author, as "Name <email>" (repeatable)
    #[arg(long = "author", value_name = "AUTHOR")]
    pub authors: Vec<String>,

    /// Prefix for bakery-specific labels
    #[arg(long, value_name = "PREFIX")]
    pub label_prefix: Option<String>,
}

/// Arguments for `create image`
#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Image name
    pub name: String,

    /// Directory of the image relative to the project root (defaults to the name)
    #[arg(long)]
    pub subpath: Option<String>,
}

/// Arguments for `create version`
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Image to add the version to
    pub image: String,

    /// Version name
    pub version: String,

    /// Directory of the version relative to the image (defaults to the tag-safe name)
    #[arg(long)]
    pub subpath: Option<String>,

    /// Mark the new version as latest
    #[arg(long)]
    pub latest: bool,

    /// OS to build for (repeatable); copied from the latest version when omitted
    #[arg(long = "os", value_name = "OS")]
    pub os: Vec<String>,

    /// Primary OS, one of the --os values
    #[arg(long, value_name = "OS")]
    pub primary_os: Option<String>,
}

pub fn execute(command: CreateCommand, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    match command {
        CreateCommand::Project(args) => {
            let repository = RepositorySpec {
                url: args.url,
                vendor: args.vendor,
                maintainer: args.maintainer,
                authors: (!args.authors.is_empty()).then_some(args.authors),
                label_prefix: args.label_prefix,
            };
            let path = scaffold::create_project(root, repository)?;
            println!("{} Created {}", out.marker(Status::Ok), path.display());
            println!(
                "{} Next: bakery create image <name>",
                out.marker(Status::Tip)
            );
        }
        CreateCommand::Image(args) => {
            let template_dir = scaffold::create_image(root, &args.name, args.subpath.as_deref())
                .map_err(|e| suggestions::explain(e, None))?;
            println!(
                "{} Created image {} with templates in {}",
                out.marker(Status::Ok),
                out.strong(&args.name),
                relative_to(&template_dir, root).display()
            );
            println!(
                "{} Next: bakery create version {} <version>",
                out.marker(Status::Tip),
                args.name
            );
        }
        CreateCommand::Version(args) => {
            if let Some(primary) = &args.primary_os {
                if !args.os.contains(primary) {
                    anyhow::bail!("--primary-os '{}' must be one of the --os values", primary);
                }
            }
            let options = VersionOptions {
                subpath: args.subpath,
                latest: args.latest,
                os: args.os,
                primary_os: args.primary_os,
            };
            let source = HttpVersionSource::new()?;
            let written =
                scaffold::create_version(root, &args.image, &args.version, &options, &source)
                    .map_err(|e| suggestions::explain(e, None))?;
            println!(
                "{} Created {} {} ({} files rendered)",
                out.marker(Status::Ok),
                out.strong(&args.image),
                args.version,
                written.len()
            );
            for path in &written {
                println!("   {}", out.dim(&relative_to(path, root).display().to_string()));
            }
        }
    }
    Ok(())
}
