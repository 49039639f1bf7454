//! # CI Command Implementation
//!
//! This module implements the `ci` subcommand, which prints machine-readable
//! output for CI pipelines.
//!
//! ## Subcommands
//!
//! - **`matrix`**: A JSON array with one `{image, version, latest, os}`
//!   object per image version, ready for a CI matrix strategy

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use bakery::ci::{to_json, version_matrix};
use bakery::suggestions;

use super::{load_config, FilterArgs};

#[derive(Subcommand, Debug)]
pub enum CiCommand {
    /// Print the image version matrix as JSON
    Matrix(MatrixArgs),
}

/// Arguments for `ci matrix`
#[derive(Args, Debug)]
pub struct MatrixArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn execute(command: CiCommand, root: &Path, _color_flag: &str) -> Result<()> {
    match command {
        CiCommand::Matrix(args) => {
            let config = load_config(root)?;
            let entries = version_matrix(&config, &args.filter.into())
                .map_err(|e| suggestions::explain(e, Some(&config)))?;
            println!("{}", to_json(&entries)?);
            Ok(())
        }
    }
}
