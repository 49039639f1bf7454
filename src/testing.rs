//! Runs goss test suites against built images with `dgoss`.
//!
//! Each target's tests live in `<version dir>/test/goss.yaml`. The image under
//! test is taken from build metadata when available, otherwise from the
//! target's first tag. Every target is attempted; failures are reported
//! together afterwards.

use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorGroup, Result};
use crate::matrix::BuildTarget;
use crate::metadata::BuildMetadata;
use crate::tools::{CommandRunner, CommandSpec};

/// Directory under a version holding its goss files.
pub const TEST_DIR: &str = "test";

#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub dgoss: PathBuf,
    /// goss binary mounted into the container, when found.
    pub goss: Option<PathBuf>,
    pub metadata: Option<BuildMetadata>,
    /// Where to write each target's JSON test report.
    pub results_dir: Option<PathBuf>,
}

/// The image reference a target is tested against.
pub fn image_under_test(target: &BuildTarget, metadata: Option<&BuildMetadata>) -> Option<String> {
    metadata
        .and_then(|m| m.image_ref(&target.id))
        .or_else(|| target.tags.first().cloned())
}

/// The dgoss invocation for one target.
pub fn dgoss_command(root: &Path, target: &BuildTarget, image: &str, options: &TestOptions) -> CommandSpec {
    let test_dir = root.join(&target.version_path).join(TEST_DIR);
    let mut spec = CommandSpec::new(&options.dgoss, root)
        .args(["run", "--init"])
        .arg("-e")
        .arg(format!("IMAGE_VERSION={}", target.version));
    if let Some(os) = &target.os {
        spec = spec.arg("-e").arg(format!("IMAGE_OS={}", os));
    }
    if let Some(extension) = &target.variant_extension {
        spec = spec.arg("-e").arg(format!("IMAGE_VARIANT={}", extension));
    }
    spec = spec
        .arg(image)
        .args(target.goss.command.split_whitespace())
        .env("GOSS_FILES_PATH", test_dir.to_string_lossy())
        .env("GOSS_SLEEP", target.goss.wait.to_string());
    if options.results_dir.is_some() {
        spec = spec.env("GOSS_OPTS", "--format json --no-color");
    }
    if let Some(goss) = &options.goss {
        spec = spec.env("GOSS_PATH", goss.to_string_lossy());
    }
    spec
}

/// Test every target, returning the ids that passed.
pub fn run_dgoss(
    root: &Path,
    targets: &[BuildTarget],
    options: &TestOptions,
    runner: &dyn CommandRunner,
) -> Result<Vec<String>> {
    let mut passed = Vec::new();
    let mut failures = ErrorGroup::new("dgoss tests failed");

    if let Some(dir) = &options.results_dir {
        std::fs::create_dir_all(dir)?;
    }

    for target in targets {
        let test_dir = root.join(&target.version_path).join(TEST_DIR);
        if !test_dir.is_dir() {
            failures.push_with_path(
                Error::Config {
                    message: format!("no goss tests for {}", target.describe()),
                },
                test_dir,
            );
            continue;
        }
        let Some(image) = image_under_test(target, options.metadata.as_ref()) else {
            failures.push(Error::Config {
                message: format!("no image reference for {}; build it first", target.id),
            });
            continue;
        };

        log::info!("Testing {} ({})", target.describe(), image);
        match runner.run(&dgoss_command(root, target, &image, options)) {
            Ok(output) => {
                if let Some(dir) = &options.results_dir {
                    std::fs::write(dir.join(format!("{}.json", target.id)), output.stdout)?;
                }
                passed.push(target.id.clone());
            }
            Err(e) => failures.push_with_path(e, test_dir),
        }
    }

    failures.into_result()?;
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedGoss;
    use crate::tools::CommandOutput;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct ScriptedRunner {
        fail_for: Vec<String>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(spec.clone());
            let line = spec.display();
            if self.fail_for.iter().any(|f| line.contains(f.as_str())) {
                return Err(Error::Command {
                    command: line,
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Failed: 1".to_string(),
                });
            }
            Ok(CommandOutput {
                stdout: "{\"summary\":{}}".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn target(id: &str, version: &str) -> BuildTarget {
        BuildTarget {
            id: id.to_string(),
            image: "base".to_string(),
            version: version.to_string(),
            os: Some("Ubuntu 24.04".to_string()),
            variant: Some("Standard".to_string()),
            variant_extension: Some("std".to_string()),
            latest: false,
            primary_os: true,
            primary_variant: true,
            version_path: PathBuf::from("base").join(version),
            containerfile: PathBuf::from("base").join(version).join("Containerfile.ubuntu2404.std"),
            context: PathBuf::from("."),
            tags: vec![format!("base:{}", version)],
            labels: BTreeMap::new(),
            goss: ResolvedGoss {
                command: "sleep infinity".to_string(),
                wait: 5,
            },
        }
    }

    fn with_tests(root: &Path, version: &str) {
        let dir = root.join("base").join(version).join(TEST_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("goss.yaml"), "file: {}\n").unwrap();
    }

    #[test]
    fn test_dgoss_command() {
        let options = TestOptions {
            dgoss: PathBuf::from("dgoss"),
            ..Default::default()
        };
        let spec = dgoss_command(Path::new("/p"), &target("base-1-0", "1.0"), "base:1.0", &options);
        assert_eq!(
            spec.display(),
            "dgoss run --init -e IMAGE_VERSION=1.0 -e IMAGE_OS=Ubuntu 24.04 -e IMAGE_VARIANT=std base:1.0 sleep infinity"
        );
        assert!(spec
            .env
            .contains(&("GOSS_FILES_PATH".to_string(), "/p/base/1.0/test".to_string())));
        assert!(spec.env.contains(&("GOSS_SLEEP".to_string(), "5".to_string())));
    }

    #[test]
    fn test_failures_are_aggregated() {
        let dir = TempDir::new().unwrap();
        with_tests(dir.path(), "1.0");
        with_tests(dir.path(), "2.0");
        let runner = ScriptedRunner {
            fail_for: vec!["base:1.0".to_string()],
            calls: RefCell::new(Vec::new()),
        };
        let options = TestOptions {
            dgoss: PathBuf::from("dgoss"),
            ..Default::default()
        };
        let targets = vec![
            target("base-1-0", "1.0"),
            target("base-2-0", "2.0"),
            target("base-3-0", "3.0"),
        ];
        let err = run_dgoss(dir.path(), &targets, &options, &runner).unwrap_err();
        match err {
            Error::Group(group) => assert_eq!(group.len(), 2),
            other => panic!("Expected grouped error, got {:?}", other),
        }
        // The missing test dir is not run, the others both are
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn test_results_are_written() {
        let dir = TempDir::new().unwrap();
        with_tests(dir.path(), "1.0");
        let runner = ScriptedRunner {
            fail_for: Vec::new(),
            calls: RefCell::new(Vec::new()),
        };
        let results = dir.path().join("results");
        let options = TestOptions {
            dgoss: PathBuf::from("dgoss"),
            results_dir: Some(results.clone()),
            ..Default::default()
        };
        let passed = run_dgoss(dir.path(), &[target("base-1-0", "1.0")], &options, &runner).unwrap();
        assert_eq!(passed, vec!["base-1-0"]);
        assert!(results.join("base-1-0.json").is_file());
    }

    #[test]
    fn test_image_from_metadata() {
        let metadata = BuildMetadata::parse(
            r#"{"base-1-0": {"image.name": "ghcr.io/acme/base:1.0", "containerimage.digest": "sha256:f00"}}"#,
        )
        .unwrap();
        assert_eq!(
            image_under_test(&target("base-1-0", "1.0"), Some(&metadata)).as_deref(),
            Some("ghcr.io/acme/base@sha256:f00")
        );
        assert_eq!(
            image_under_test(&target("base-1-0", "1.0"), None).as_deref(),
            Some("base:1.0")
        );
    }
}
