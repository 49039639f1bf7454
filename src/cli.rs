//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bakery::defaults::{default_context, DEFAULT_LOG_LEVEL};

use crate::commands;

/// Bakery - Manage container image build configurations
#[derive(Parser, Debug)]
#[command(name = "bakery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Project root containing bakery.yaml (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = "BAKERY_CONTEXT")]
    context: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a project, image or version
    #[command(subcommand)]
    Create(commands::create::CreateCommand),
    /// Render image templates into version directories
    Render(commands::render::RenderArgs),
    /// Print or write the bake plan for the selected targets
    Plan(commands::plan::PlanArgs),
    /// Build the selected targets with docker buildx bake
    Build(commands::build::BuildArgs),
    /// Run post-build tests against built images
    #[command(subcommand)]
    Run(commands::run::RunCommand),
    /// Remove an image or version
    #[command(subcommand)]
    Remove(commands::remove::RemoveCommand),
    /// Output for CI systems
    #[command(subcommand)]
    Ci(commands::ci::CiCommand),
    /// Delete stale image versions from remote registries
    Clean(commands::clean::CleanArgs),
    /// Validate the configuration and the full build matrix
    Validate(commands::validate::ValidateArgs),
    /// Show dependency constraints and the versions they resolve to
    Dependencies(commands::dependencies::DependenciesArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let context = self.context.unwrap_or_else(default_context);
        let color = self.color.as_str();
        log::debug!("Using project root {}", context.display());

        match self.command {
            Commands::Create(command) => commands::create::execute(command, &context, color),
            Commands::Render(args) => commands::render::execute(args, &context, color),
            Commands::Plan(args) => commands::plan::execute(args, &context, color),
            Commands::Build(args) => commands::build::execute(args, &context, color),
            Commands::Run(command) => commands::run::execute(command, &context, color),
            Commands::Remove(command) => commands::remove::execute(command, &context, color),
            Commands::Ci(command) => commands::ci::execute(command, &context, color),
            Commands::Clean(args) => commands::clean::execute(args, &context, color),
            Commands::Validate(args) => commands::validate::execute(args, &context, color),
            Commands::Dependencies(args) => commands::dependencies::execute(args, &context, color),
        }
    }
}

/// Log to stderr at `level`, unless `RUST_LOG` is set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when embedded in tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
