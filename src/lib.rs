//! # Bakery Library
//!
//! This library implements the core of the `bakery` command-line tool: a
//! build-configuration manager for families of container images. A project
//! describes its images once (registries, repository metadata, versions,
//! operating systems and variants) and bakery turns that description into a
//! concrete, reproducible build plan for `docker buildx bake`.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::Path;
//! use bakery::config::{ConfigFile, Configuration};
//! use bakery::matrix::{expand, BuildContext, TargetFilter};
//! use bakery::plan::BakePlan;
//!
//! let file: ConfigFile = serde_yaml::from_str(r#"
//! registries:
//!   - host: ghcr.io
//!     namespace: acme
//! images:
//!   - name: base
//!     versions:
//!       - name: "1.0"
//!         latest: true
//!         os: [Ubuntu 24.04]
//! "#).unwrap();
//!
//! let config = Configuration::from_file(Path::new("/project"), Path::new("/project/bakery.yaml"), file).unwrap();
//! let targets = expand(&config, &TargetFilter::default(), &BuildContext::new(chrono::Utc::now(), None)).unwrap();
//! assert_eq!(targets.len(), 1);
//! assert!(targets[0].tags.contains(&"ghcr.io/acme/base:latest".to_string()));
//!
//! let plan = BakePlan::from_targets(&targets);
//! assert!(plan.group.contains_key("default"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The typed project model loaded from
//!   `bakery.yaml`, an optional `bakery.override.yaml` and per-image
//!   `manifest.yaml` files. Registries, tag patterns and tool options are
//!   inherited down the project → image → version → variant hierarchy.
//! - **Matrix expansion (`matrix`)**: Turns the configuration into one build
//!   target per image × version × OS × variant, with tags, labels and paths.
//! - **Build plan (`plan`)**: Groups targets and serializes them into the
//!   bake file format.
//! - **Dependencies (`dependency`)**: Version constraints for bundled
//!   runtimes and discovery of their published versions.
//! - **Templates (`templating`, `render`, `scaffold`)**: Renders per-version
//!   files from image templates and scaffolds new projects, images and
//!   versions.
//! - **Execution (`tools`, `builder`, `testing`, `metadata`)**: Locates and
//!   runs external tools: bake for builds, dgoss for tests.
//! - **Registry cleanup (`cleanup`)**: Removes stale versions from GitHub
//!   Container Registry and Docker Hub.
//!
//! ## Execution Flow
//!
//! A `build` invocation runs these steps:
//!
//! 1.  **Load**: Read and validate the configuration. Any validation error
//!     aborts before anything is planned.
//! 2.  **Expand**: Produce the build targets matching the user's filter.
//! 3.  **Plan**: Assemble groups and write `.docker-bake.json`.
//! 4.  **Build**: Run `docker buildx bake` and remove the plan file.

pub mod builder;
pub mod ci;
pub mod cleanup;
pub mod config;
pub mod defaults;
pub mod dependency;
pub mod error;
pub mod git;
pub mod matrix;
pub mod metadata;
pub mod os;
pub mod output;
pub mod path;
pub mod plan;
pub mod render;
pub mod scaffold;
pub mod suggestions;
pub mod templating;
pub mod testing;
pub mod tools;

#[cfg(test)]
mod path_proptest;
