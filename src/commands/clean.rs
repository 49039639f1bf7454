//! # Clean Command Implementation
//!
//! This module implements the `clean` subcommand, which deletes stale image
//! versions from remote registries.
//!
//! Package URLs are taken from the command line, or derived from the
//! registries every image is pushed to. Each URL is dispatched by host to
//! the GitHub Container Registry or Docker Hub cleaner; other hosts are
//! skipped with a warning. Failures are collected across all URLs and
//! reported at the end.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use bakery::cleanup::{self, clean_all, package_urls, parse_duration, Cleaners, CleanupPolicy};
use bakery::output::{OutputConfig, Status};
use bakery::suggestions;

use super::load_config;

/// Delete stale image versions from remote registries
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Package URLs such as ghcr.io/org/image (defaults to every configured image)
    pub urls: Vec<String>,

    /// Only clean the registries of this image
    #[arg(long, value_name = "NAME", conflicts_with = "urls")]
    pub image: Option<String>,

    /// Delete tagged versions older than this age
    ///
    /// Duration format: number followed by unit (s, m, h, d, w)
    /// Examples: "80w", "365d"
    #[arg(long, value_name = "DURATION")]
    pub remove_tagged_older_than: Option<String>,

    /// Delete untagged versions older than this age
    #[arg(long, value_name = "DURATION")]
    pub remove_untagged_older_than: Option<String>,

    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt and delete immediately
    #[arg(long, short)]
    pub yes: bool,
}

pub fn execute(args: CleanArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    if args.remove_tagged_older_than.is_none() && args.remove_untagged_older_than.is_none() {
        return Err(suggestions::clean_no_threshold());
    }
    let threshold = |value: &Option<String>| -> Result<_> {
        value
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Expected format: number followed by unit (s, m, h, d, w)")
    };
    let policy = CleanupPolicy {
        tagged_older_than: threshold(&args.remove_tagged_older_than)?,
        untagged_older_than: threshold(&args.remove_untagged_older_than)?,
        dry_run: args.dry_run,
    };

    let urls = if args.urls.is_empty() {
        let config = load_config(root)?;
        package_urls(&config, args.image.as_deref())
            .map_err(|e| suggestions::explain(e, Some(&config)))?
    } else {
        args.urls
    };
    if urls.is_empty() {
        println!("No registries configured, nothing to clean.");
        return Ok(());
    }

    println!("{} Registries to clean:", out.marker(Status::Scan));
    for url in &urls {
        println!("   {}", url);
    }

    if !policy.dry_run && !args.yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete matching versions from {} packages?", urls.len()))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Clean cancelled.");
            return Ok(());
        }
    }

    let cleaners = Cleaners::from_env()?;
    let reports = clean_all(&urls, &policy, Utc::now(), &cleaners);

    for report in &reports {
        let status = if report.is_success() {
            Status::Ok
        } else {
            Status::Err
        };
        if policy.dry_run {
            println!(
                "{} {}: {} versions would be deleted",
                out.marker(status),
                report.url,
                report.selected.len()
            );
            for version in &report.selected {
                let tags = if version.is_tagged() {
                    version.tags.join(", ")
                } else {
                    "untagged".to_string()
                };
                println!(
                    "   {} {} {}",
                    version.id,
                    out.dim(&version.created.format("%Y-%m-%d").to_string()),
                    tags
                );
            }
        } else {
            println!(
                "{} {}: deleted {} of {} versions",
                out.marker(status),
                report.url,
                report.deleted.len(),
                report.selected.len()
            );
        }
        if !report.is_success() {
            println!("   stopped at stage {}", report.stage);
        }
    }

    if policy.dry_run {
        println!(
            "\n{} Dry run mode - no changes were made.",
            out.marker(Status::Tip)
        );
    }

    cleanup::into_result(reports).map_err(|e| suggestions::explain(e, None))
}
