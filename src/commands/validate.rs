//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks the
//! project configuration without building anything.
//!
//! ## Functionality
//!
//! - **Configuration Validation**: Loads `bakery.yaml`, the override file and
//!   every image manifest, and reports all validation errors together.
//! - **Matrix Expansion**: Expands every build target, catching id
//!   collisions and invalid tag patterns.
//! - **File Checks**: Warns about images without templates and targets
//!   whose Containerfile has not been rendered yet.
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use bakery::config::Configuration;
use bakery::matrix::{expand, BuildContext, TargetFilter};
use bakery::output::{OutputConfig, Status};
use bakery::suggestions;

/// Validate the configuration and the full build matrix
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `root` - The project root
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: ValidateArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating project: {}",
        out.marker(Status::Scan),
        root.display()
    );

    let config = match Configuration::load(root) {
        Ok(config) => {
            println!(
                "{} Configuration loaded from {}",
                out.marker(Status::Ok),
                config.source.display()
            );
            config
        }
        Err(e) => {
            println!("{} Configuration is invalid", out.marker(Status::Err));
            return Err(suggestions::explain(e, None));
        }
    };

    let mut warnings: Vec<String> = config.warnings().to_vec();

    let context = BuildContext::new(Utc::now(), None);
    let targets = match expand(&config, &TargetFilter::default(), &context) {
        Ok(targets) => targets,
        Err(e) => {
            println!("{} Build matrix is invalid", out.marker(Status::Err));
            return Err(e.into());
        }
    };

    for image in &config.images {
        if !image.template_path().is_dir() {
            warnings.push(format!(
                "image '{}' has no template directory at {}",
                image.name,
                image.template_path().display()
            ));
        }
    }
    let unrendered = targets
        .iter()
        .filter(|t| !root.join(&t.containerfile).is_file())
        .count();
    if unrendered > 0 {
        warnings.push(format!(
            "{} targets have no rendered Containerfile; run 'bakery render'",
            unrendered
        ));
    }

    let version_count: usize = config.images.iter().map(|i| i.versions.len()).sum();
    let tag_count: usize = targets.iter().map(|t| t.tags.len()).sum();
    println!("\n{} Configuration Summary:", out.marker(Status::Info));
    println!("   Images: {}", config.images.len());
    println!("   Versions: {}", version_count);
    println!("   Build targets: {}", targets.len());
    println!("   Tags: {}", tag_count);
    println!("   Registries: {}", config.get_registry_base_urls().join(", "));

    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            println!("{} {}", out.marker(Status::Warn), warning);
        }
    }

    if !warnings.is_empty() && args.strict {
        println!(
            "\n{} Configuration has warnings (strict mode enabled)",
            out.marker(Status::Err)
        );
        return Err(anyhow::anyhow!(
            "Configuration validation failed in strict mode"
        ));
    }

    if warnings.is_empty() {
        println!("\n{} Configuration is valid", out.marker(Status::Ok));
    } else {
        println!(
            "\n{} Configuration is valid but has warnings",
            out.marker(Status::Warn)
        );
    }
    Ok(())
}
