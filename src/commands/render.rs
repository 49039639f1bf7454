//! # Render Command Implementation
//!
//! This module implements the `render` subcommand, which re-renders image
//! templates into the version directories. Use it after editing templates
//! of an existing image.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use bakery::output::{OutputConfig, Status};
use bakery::path::relative_to;
use bakery::render::render_all;
use bakery::suggestions;

use super::load_config;

/// Render image templates into version directories
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Only render this image
    pub image: Option<String>,

    /// Only render this version of the image
    #[arg(requires = "image")]
    pub version: Option<String>,

    /// List every written file
    #[arg(long)]
    pub verbose: bool,
}

pub fn execute(args: RenderArgs, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = load_config(root)?;

    let written = render_all(&config, args.image.as_deref(), args.version.as_deref())
        .map_err(|e| suggestions::explain(e, Some(&config)))?;

    if args.verbose {
        for path in &written {
            println!("   {}", relative_to(path, root).display());
        }
    }
    println!("{} Rendered {} files", out.marker(Status::Ok), written.len());
    Ok(())
}
