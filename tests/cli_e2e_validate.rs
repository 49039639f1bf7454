//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `validate` subcommand from a user's perspective.

mod common;
use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_valid_config() {
    let fixture = TestFixture::new()
        .with_config(configs::MINIMAL)
        .with_containerfile_template("base")
        .with_file("base/1.0/Containerfile.ubuntu2404", "FROM ubuntu:24.04\n");

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build targets: 1"))
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration parsing error"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_reports_every_error() {
    let fixture = TestFixture::new().with_config(
        r#"
registries:
  - host: https://ghcr.io
images:
  - name: base
    versions:
      - name: "2.0"
        latest: true
      - name: "1.0"
        latest: true
"#,
    );

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not include a scheme"))
        .stderr(predicate::str::contains("latest"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_warnings_pass_unless_strict() {
    let fixture = TestFixture::new().with_config(configs::UNKNOWN_OS);

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("[WARN]"));

    fixture
        .command()
        .args(["validate", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_manifest_images() {
    let fixture = TestFixture::new()
        .with_config("registries: []\n")
        .with_file(
            "tools/manifest.yaml",
            r#"
image: tools
versions:
  "1.0":
    os: [Ubuntu 24.04]
    latest: true
"#,
        );

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Images: 1"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_strict_fails_on_duplicate_author() {
    let fixture = TestFixture::new()
        .with_config(
            r#"
repository:
  authors:
    - Jane Doe <jane@example.com>
    - J. Doe <jane@example.com>
images:
  - name: base
    versions:
      - name: "1.0"
        latest: true
        os: [Ubuntu 24.04]
"#,
        )
        .with_containerfile_template("base")
        .with_file("base/1.0/Containerfile.ubuntu2404", "FROM ubuntu:24.04\n");

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Duplicate author"));

    fixture
        .command()
        .args(["validate", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}
