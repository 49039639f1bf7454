//! Vendor release metadata sources.
//!
//! Each dependency publishes its releases differently, so fetching and
//! parsing are kept apart: the HTTP client only retrieves bodies, and the
//! `parse_*` functions turn those bodies into plain version strings.

use std::time::Duration;

use serde::Deserialize;

use super::DependencyKind;
use crate::error::{Error, Result};

pub const PYTHON_VERSIONS_URL: &str =
    "https://raw.githubusercontent.com/actions/python-versions/main/versions-manifest.json";
pub const R_VERSIONS_URL: &str = "https://cdn.posit.co/r/versions.json";
pub const QUARTO_RELEASES_URL: &str =
    "https://api.github.com/repos/quarto-dev/quarto-cli/releases?per_page=100";

/// Trait for version discovery - allows mocking in tests
pub trait VersionSource {
    /// Return every published version of `kind`, in any order.
    fn available_versions(&self, kind: DependencyKind) -> Result<Vec<String>>;
}

/// The default `VersionSource`, backed by the vendors' public endpoints.
pub struct HttpVersionSource {
    client: reqwest::blocking::Client,
}

impl HttpVersionSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("bakery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("Fetching release metadata from {}", url);
        let response = self.client.get(url).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("unexpected status {status}"),
            });
        }
        response.text().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl VersionSource for HttpVersionSource {
    fn available_versions(&self, kind: DependencyKind) -> Result<Vec<String>> {
        match kind {
            DependencyKind::Python => parse_python_manifest(&self.fetch(PYTHON_VERSIONS_URL)?),
            DependencyKind::R => parse_r_versions(&self.fetch(R_VERSIONS_URL)?),
            DependencyKind::Quarto => parse_quarto_releases(&self.fetch(QUARTO_RELEASES_URL)?),
        }
    }
}

#[derive(Deserialize)]
struct PythonRelease {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Parse the actions/python-versions manifest, keeping stable releases.
pub fn parse_python_manifest(body: &str) -> Result<Vec<String>> {
    let releases: Vec<PythonRelease> = serde_json::from_str(body)?;
    Ok(releases
        .into_iter()
        .filter(|r| r.stable)
        .map(|r| r.version)
        .collect())
}

#[derive(Deserialize)]
struct RVersions {
    r_versions: Vec<String>,
}

/// Parse the Posit CDN R version list.
pub fn parse_r_versions(body: &str) -> Result<Vec<String>> {
    let parsed: RVersions = serde_json::from_str(body)?;
    Ok(parsed.r_versions)
}

#[derive(Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

/// Parse GitHub releases of quarto-cli, skipping drafts and prereleases.
pub fn parse_quarto_releases(body: &str) -> Result<Vec<String>> {
    let releases: Vec<GithubRelease> = serde_json::from_str(body)?;
    Ok(releases
        .into_iter()
        .filter(|r| !r.draft && !r.prerelease)
        .map(|r| r.tag_name.trim_start_matches('v').to_string())
        .collect())
}
