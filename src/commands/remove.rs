//! # Remove Command Implementation
//!
//! This module implements the `remove` subcommand, which deletes an image or
//! a version from `bakery.yaml` together with its directory on disk.
//!
//! ## Subcommands
//!
//! - **`image`**: Remove an image and every version of it
//! - **`version`**: Remove one version of an image

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};

use bakery::output::{OutputConfig, Status};
use bakery::path::relative_to;
use bakery::scaffold;
use bakery::suggestions;

#[derive(Subcommand, Debug)]
pub enum RemoveCommand {
    /// Remove an image and its directory
    Image(RemoveImageArgs),
    /// Remove a version and its directory
    Version(RemoveVersionArgs),
}

/// Arguments for `remove image`
#[derive(Args, Debug)]
pub struct RemoveImageArgs {
    /// Image to remove
    pub name: String,

    /// Skip confirmation prompt and delete immediately
    #[arg(long, short)]
    pub yes: bool,
}

/// Arguments for `remove version`
#[derive(Args, Debug)]
pub struct RemoveVersionArgs {
    /// Image the version belongs to
    pub image: String,

    /// Version to remove
    pub version: String,

    /// Skip confirmation prompt and delete immediately
    #[arg(long, short)]
    pub yes: bool,
}

pub fn execute(command: RemoveCommand, root: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let (what, yes) = match &command {
        RemoveCommand::Image(args) => (format!("image {}", args.name), args.yes),
        RemoveCommand::Version(args) => {
            (format!("version {} of image {}", args.version, args.image), args.yes)
        }
    };

    if !yes && !confirm(&format!("Remove {} and delete its files?", what))? {
        println!("Aborted.");
        return Ok(());
    }

    let directory = match command {
        RemoveCommand::Image(args) => scaffold::remove_image(root, &args.name),
        RemoveCommand::Version(args) => scaffold::remove_version(root, &args.image, &args.version),
    }
    .map_err(|e| suggestions::explain(e, None))?;

    println!(
        "{} Removed {} ({})",
        out.marker(Status::Ok),
        what,
        relative_to(&directory, root).display()
    );
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
