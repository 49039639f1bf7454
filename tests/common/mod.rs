//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and macros
//! to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::MULTI_OS);
//!     fixture.command().arg("plan").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Common configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// One image, one version, one OS, no registries.
    pub const MINIMAL: &str = r#"
images:
  - name: base
    versions:
      - name: "1.0"
        latest: true
        os: [Ubuntu 24.04]
"#;

    /// Two OSes, two variants and two versions pushed to two registries.
    pub const MULTI_OS: &str = r#"
repository:
  url: github.com/acme/images
  vendor: Acme
  authors:
    - Jane Doe <jane@example.com>
registries:
  - host: ghcr.io
    namespace: acme
  - host: docker.io
    namespace: acme
images:
  - name: base
    variants:
      - name: Standard
        extension: std
        primary: true
      - name: Minimal
        extension: min
    versions:
      - name: "2.0"
        latest: true
        os:
          - name: Ubuntu 24.04
            primary: true
          - Ubuntu 22.04
      - name: "1.0"
        os: [Ubuntu 22.04]
"#;

    /// Two versions both marked latest.
    pub const TWO_LATEST: &str = r#"
images:
  - name: base
    versions:
      - name: "2.0"
        latest: true
      - name: "1.0"
        latest: true
"#;

    /// An OS the tool has no profile for.
    pub const UNKNOWN_OS: &str = r#"
images:
  - name: base
    versions:
      - name: "1.0"
        os: [Plan9 4]
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "images: [unclosed";
}

/// A test fixture that provides a temporary project directory.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_config(configs::MINIMAL)
///     .with_file("base/template/Containerfile.tera", "FROM scratch\n");
///
/// fixture.command().arg("render").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `bakery.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("bakery.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add a Containerfile template for `image`.
    #[allow(dead_code)]
    pub fn with_containerfile_template(self, image: &str) -> Self {
        self.with_file(
            &format!("{}/template/Containerfile.tera", image),
            "FROM {{ OS.distribution }}:{{ OS.version }}\n",
        )
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("bakery.yaml")
    }

    /// Read a file below the project root.
    #[allow(dead_code)]
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).expect("Failed to read file")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    ///
    /// Variables that would change the project root, logging or
    /// credentials are cleared.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bakery");
        cmd.current_dir(self.path())
            .env_remove("BAKERY_CONTEXT")
            .env_remove("RUST_LOG")
            .env_remove("GITHUB_TOKEN")
            .env_remove("GH_TOKEN")
            .env_remove("DOCKERHUB_USERNAME")
            .env_remove("DOCKERHUB_TOKEN")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_config(configs::MINIMAL);
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        let configs = [
            configs::MINIMAL,
            configs::MULTI_OS,
            configs::TWO_LATEST,
            configs::UNKNOWN_OS,
        ];

        for config in configs {
            serde_yaml::from_str::<serde_yaml::Value>(config).expect("Config should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        let result = serde_yaml::from_str::<serde_yaml::Value>(configs::INVALID_YAML);
        assert!(result.is_err(), "INVALID_YAML should not parse");
    }
}
