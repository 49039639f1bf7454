//! # Plan Command Implementation
//!
//! This module implements the `plan` subcommand, which expands the build
//! matrix and prints the resulting bake plan as JSON. With `--output` the
//! plan is written to a file instead, for use with `docker buildx bake -f`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use bakery::matrix::BuildContext;
use bakery::output::{OutputConfig, Status};
use bakery::plan::BakePlan;

use super::{load_config, select_targets, FilterArgs};

/// Print or write the bake plan for the selected targets
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Write the plan to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: PlanArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = load_config(root)?;
    let targets = select_targets(&config, &args.filter.into(), &BuildContext::current(root))?;
    let plan = BakePlan::from_targets(&targets);
    let json = plan.to_json()?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, format!("{}\n", json))
                .with_context(|| format!("Failed to write plan to {}", path.display()))?;
            eprintln!(
                "{} Wrote {} targets to {}",
                out.marker(Status::Ok),
                plan.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
