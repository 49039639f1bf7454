//! # Build Command Implementation
//!
//! This module implements the `build` subcommand. It expands the selected
//! targets, writes `.docker-bake.json` to the project root and runs
//! `docker buildx bake` against it. The plan file is removed afterwards,
//! whether the build succeeded or not.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use bakery::builder::{bake, BakeOptions};
use bakery::matrix::BuildContext;
use bakery::output::{OutputConfig, Status};
use bakery::plan::BakePlan;
use bakery::suggestions;
use bakery::tools::{find_tool, SystemRunner, DOCKER};

use super::{load_config, select_targets, FilterArgs};

/// Build the selected targets with docker buildx bake
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Push images to their registries after building
    #[arg(long, conflicts_with = "load")]
    pub push: bool,

    /// Load images into the local image store
    #[arg(long)]
    pub load: bool,

    /// Write build metadata (image names and digests) to this file
    #[arg(long, value_name = "FILE")]
    pub metadata_file: Option<PathBuf>,
}

pub fn execute(args: BuildArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = load_config(root)?;
    let targets = select_targets(&config, &args.filter.into(), &BuildContext::current(root))?;
    let plan = BakePlan::from_targets(&targets);

    let docker = find_tool(DOCKER, root).map_err(|e| suggestions::explain(e, None))?;
    println!(
        "{} Building {} targets",
        out.marker(Status::Scan),
        out.strong(&plan.len().to_string())
    );
    for target in &targets {
        println!("   {}", out.dim(&target.describe()));
    }

    let options = BakeOptions {
        push: args.push,
        load: args.load,
        metadata_file: args.metadata_file,
    };
    bake(root, &plan, &options, &docker, &SystemRunner::streaming())?;

    println!("{} Build finished", out.marker(Status::Ok));
    if let Some(path) = &options.metadata_file {
        println!("   Metadata written to {}", path.display());
    }
    Ok(())
}
