//! Hands a build plan to `docker buildx bake`.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::plan::{BakePlan, PlanFile, PLAN_FILENAME};
use crate::tools::{CommandRunner, CommandSpec};

/// Flags passed through to bake.
#[derive(Debug, Clone, Default)]
pub struct BakeOptions {
    /// Push images to their registries.
    pub push: bool,
    /// Load images into the local image store.
    pub load: bool,
    /// Where bake writes build metadata.
    pub metadata_file: Option<PathBuf>,
}

/// The bake command line for a plan written to the project root.
pub fn bake_command(docker: &Path, root: &Path, options: &BakeOptions) -> CommandSpec {
    let mut spec = CommandSpec::new(docker, root).args(["buildx", "bake", "--file", PLAN_FILENAME]);
    if options.push {
        spec = spec.arg("--push");
    }
    if options.load {
        spec = spec.arg("--load");
    }
    if let Some(path) = &options.metadata_file {
        spec = spec.arg("--metadata-file").arg(path.as_os_str());
    }
    spec
}

/// Write `plan` to the project root, run bake and remove the plan again,
/// whether or not the build succeeded.
pub fn bake(
    root: &Path,
    plan: &BakePlan,
    options: &BakeOptions,
    docker: &Path,
    runner: &dyn CommandRunner,
) -> Result<()> {
    if plan.is_empty() {
        return Err(Error::Config {
            message: "no build targets match the selection".to_string(),
        });
    }
    if options.push && options.load {
        return Err(Error::Config {
            message: "--push and --load cannot be combined".to_string(),
        });
    }

    let plan_file = PlanFile::write(root, plan)?;
    log::info!(
        "Building {} targets with {}",
        plan.len(),
        plan_file.path().display()
    );
    runner.run(&bake_command(docker, root, options))?;
    Ok(())
}
