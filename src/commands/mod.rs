//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `bakery`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct (or a `Subcommand` enum) that defines the
//!   command-specific arguments and options, derived using `clap`.
//! - An `execute` function that takes the parsed arguments, the project root
//!   and the global color flag, and performs the command's logic.
//!
//! Commands stay thin: they load the configuration, call into the `bakery`
//! library and print results. Library errors are passed through
//! `suggestions::explain` so the user gets hints on how to fix them.

pub mod build;
pub mod ci;
pub mod clean;
pub mod create;
pub mod dependencies;
pub mod plan;
pub mod remove;
pub mod render;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use clap::Args;

use bakery::config::Configuration;
use bakery::matrix::{expand, BuildContext, BuildTarget, TargetFilter};
use bakery::suggestions;

/// Selection of build targets shared by plan, build, run and ci.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only targets of this image
    #[arg(long, value_name = "NAME")]
    pub image: Option<String>,

    /// Only targets of this image version
    #[arg(long = "image-version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Only targets for this OS (name or extension)
    #[arg(long, value_name = "OS")]
    pub os: Option<String>,

    /// Only targets of this variant (name or extension)
    #[arg(long, value_name = "VARIANT")]
    pub variant: Option<String>,
}

impl From<FilterArgs> for TargetFilter {
    fn from(args: FilterArgs) -> Self {
        TargetFilter {
            image: args.image,
            version: args.version,
            os: args.os,
            variant: args.variant,
        }
    }
}

/// Load the project configuration. Validation warnings are logged while
/// loading.
pub fn load_config(root: &Path) -> Result<Configuration> {
    Configuration::load(root).map_err(|e| suggestions::explain(e, None))
}

/// Expand the targets selected by `filter`, with hints for unknown names.
pub fn select_targets(
    config: &Configuration,
    filter: &TargetFilter,
    context: &BuildContext,
) -> Result<Vec<BuildTarget>> {
    expand(config, filter, context).map_err(|e| suggestions::explain(e, Some(config)))
}
