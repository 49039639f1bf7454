//! End-to-end tests for the `create`, `render` and `remove` commands.
//!
//! These tests scaffold a project from scratch the way a user would. Images
//! without dependency constraints need no network access.

mod common;
use common::prelude::*;

fn scaffold() -> TestFixture {
    let fixture = TestFixture::new();
    fixture
        .command()
        .args(["create", "project", "--vendor", "Acme", "--author", "Jane <jane@example.com>"])
        .assert()
        .success();
    fixture
        .command()
        .args(["create", "image", "base"])
        .assert()
        .success();
    fixture
        .command()
        .args(["create", "version", "base", "1.0", "--os", "Ubuntu 24.04", "--latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created base 1.0"));
    fixture
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_create_project_image_version() {
    let fixture = scaffold();

    fixture.child("base/template/Containerfile.tera").assert(predicate::path::exists());
    fixture.child("base/template/test/goss.yaml.tera").assert(predicate::path::exists());
    fixture
        .child("base/1.0/Containerfile.ubuntu2404")
        .assert(predicate::str::starts_with("FROM ubuntu:24.04"));
    fixture
        .child("base/1.0/deps/packages.txt")
        .assert(predicate::str::contains("ca-certificates"));

    let config = fixture.read("bakery.yaml");
    assert!(config.contains("vendor: Acme"));
    assert!(config.contains("name: base"));
    assert!(config.contains("latest: true"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_new_latest_version_takes_over_flag_and_os() {
    let fixture = scaffold();
    fixture
        .command()
        .args(["create", "version", "base", "2.0", "--latest"])
        .assert()
        .success();

    // OS list copied from the previous latest version
    fixture
        .child("base/2.0/Containerfile.ubuntu2404")
        .assert(predicate::path::exists());
    fixture
        .command()
        .args(["ci", "matrix"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""version":"2.0","latest":true"#))
        .stdout(predicate::str::contains(r#""version":"1.0","latest":false"#));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_create_refuses_existing() {
    let fixture = scaffold();
    fixture
        .command()
        .args(["create", "project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to overwrite"));
    fixture
        .command()
        .args(["create", "version", "base", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_render_after_template_change() {
    let fixture = scaffold();
    fixture
        .child("base/template/Containerfile.tera")
        .write_str("FROM {{ OS.distribution }}:{{ OS.codename }}\n")
        .unwrap();
    fixture
        .command()
        .args(["render", "base"])
        .assert()
        .success();
    fixture
        .child("base/1.0/Containerfile.ubuntu2404")
        .assert(predicate::str::starts_with("FROM ubuntu:noble"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_remove_version_and_image() {
    let fixture = scaffold();
    fixture
        .command()
        .args(["remove", "version", "base", "1.0", "--yes"])
        .assert()
        .success();
    fixture.child("base/1.0").assert(predicate::path::missing());
    assert!(!fixture.read("bakery.yaml").contains("1.0"));

    fixture
        .command()
        .args(["remove", "image", "base", "--yes"])
        .assert()
        .success();
    fixture.child("base").assert(predicate::path::missing());
}
