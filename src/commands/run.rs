//! # Run Command Implementation
//!
//! This module implements the `run` subcommand, which runs post-build test
//! suites against built images.
//!
//! ## Subcommands
//!
//! - **`dgoss`**: Run each target's goss tests in a container started from
//!   its image

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use bakery::defaults::DEFAULT_RESULTS_DIR;
use bakery::matrix::BuildContext;
use bakery::metadata::BuildMetadata;
use bakery::output::{OutputConfig, Status};
use bakery::suggestions;
use bakery::testing::{run_dgoss, TestOptions};
use bakery::tools::{find_tool, SystemRunner, DGOSS, GOSS};

use super::{load_config, select_targets, FilterArgs};

#[derive(Subcommand, Debug)]
pub enum RunCommand {
    /// Run goss tests with dgoss
    Dgoss(DgossArgs),
}

/// Arguments for `run dgoss`
#[derive(Args, Debug)]
pub struct DgossArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Build metadata from `bakery build --metadata-file`, used to test the exact images built
    #[arg(long, value_name = "FILE")]
    pub metadata_file: Option<PathBuf>,

    /// Write a JSON report per target into the results directory
    #[arg(long)]
    pub results: bool,

    /// Directory for JSON reports, relative to the project root
    #[arg(long, value_name = "DIR", default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,
}

pub fn execute(command: RunCommand, root: &Path, color_flag: &str) -> Result<()> {
    match command {
        RunCommand::Dgoss(args) => dgoss(args, root, color_flag),
    }
}

fn dgoss(args: DgossArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = load_config(root)?;
    let targets = select_targets(&config, &args.filter.into(), &BuildContext::current(root))?;
    if targets.is_empty() {
        anyhow::bail!("No build targets match the selection");
    }

    let dgoss = find_tool(DGOSS, root).map_err(|e| suggestions::explain(e, None))?;
    // dgoss can fetch goss itself, so a missing binary is not fatal
    let goss = find_tool(GOSS, root).ok();
    let metadata = args
        .metadata_file
        .as_deref()
        .map(BuildMetadata::load)
        .transpose()?;
    let options = TestOptions {
        dgoss,
        goss,
        metadata,
        results_dir: args.results.then(|| root.join(&args.results_dir)),
    };

    let runner = if args.results {
        SystemRunner::capturing()
    } else {
        SystemRunner::streaming()
    };
    println!(
        "{} Testing {} targets",
        out.marker(Status::Scan),
        out.strong(&targets.len().to_string())
    );
    let passed = run_dgoss(root, &targets, &options, &runner)?;
    println!("{} {} targets passed", out.marker(Status::Ok), passed.len());
    Ok(())
}
