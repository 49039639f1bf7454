//! GitHub Container Registry cleanup through the GitHub Packages API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{PackageRef, RegistryCleaner, RegistryVersion};
use crate::error::{Error, Result};

pub const GHCR_HOST: &str = "ghcr.io";
pub const GITHUB_API: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

/// Cleans `ghcr.io/<org>/<package>` URLs.
pub struct GhcrCleaner {
    client: reqwest::blocking::Client,
    token: Option<String>,
    api_base: String,
}

impl GhcrCleaner {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("bakery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token,
            api_base: GITHUB_API.to_string(),
        })
    }

    /// Authenticate with `GITHUB_TOKEN`, falling back to `GH_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty());
        Self::new(token)
    }

    fn versions_url(&self, package: &PackageRef) -> String {
        format!(
            "{}/orgs/{}/packages/container/{}/versions",
            self.api_base,
            package.namespace,
            encode_package(&package.package)
        )
    }

    fn send(&self, method: reqwest::Method, url: &str) -> Result<reqwest::blocking::Response> {
        let token = self.token.as_deref().ok_or_else(|| Error::Registry {
            url: url.to_string(),
            message: "GITHUB_TOKEN (or GH_TOKEN) is not set".to_string(),
        })?;
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .map_err(|e| Error::Registry {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self.send(method, url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(unexpected_status(url, status));
        }
        Ok(response)
    }
}

fn unexpected_status(url: &str, status: reqwest::StatusCode) -> Error {
    Error::Registry {
        url: url.to_string(),
        message: format!("unexpected status {status}"),
    }
}

/// Outcome of a delete request: `true` when the version was removed, `false`
/// when it was already gone.
fn delete_outcome(url: &str, status: reqwest::StatusCode) -> Result<bool> {
    if status.is_success() {
        Ok(true)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        Err(unexpected_status(url, status))
    }
}

impl RegistryCleaner for GhcrCleaner {
    fn provider(&self) -> &'static str {
        "GitHub Container Registry"
    }

    fn parse_url(&self, url: &str) -> Result<PackageRef> {
        parse_package_url(url)
    }

    fn fetch_versions(&self, package: &PackageRef) -> Result<Vec<RegistryVersion>> {
        let mut versions = Vec::new();
        for page in 1.. {
            let url = format!(
                "{}?per_page={}&page={}",
                self.versions_url(package),
                PAGE_SIZE,
                page
            );
            let body = self
                .request(reqwest::Method::GET, &url)?
                .text()
                .map_err(|e| Error::Registry {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            let batch = parse_versions(&body)?;
            let count = batch.len();
            versions.extend(batch);
            if count < PAGE_SIZE {
                break;
            }
        }
        Ok(versions)
    }

    fn delete_version(&self, package: &PackageRef, version: &RegistryVersion) -> Result<()> {
        let url = format!("{}/{}", self.versions_url(package), version.id);
        let response = self.send(reqwest::Method::DELETE, &url)?;
        if !delete_outcome(&url, response.status())? {
            log::debug!("{} was already deleted", url);
        }
        Ok(())
    }
}

/// Split `[https://]ghcr.io/<org>/<package>` into its parts. The package
/// name may contain further slashes.
pub fn parse_package_url(url: &str) -> Result<PackageRef> {
    let invalid = || Error::RegistryFormat {
        url: url.to_string(),
        provider: "GHCR".to_string(),
        expected: "ghcr.io/<org>/<package>".to_string(),
    };
    let trimmed = url
        .trim()
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let rest = trimmed.strip_prefix("ghcr.io/").ok_or_else(invalid)?;
    let (namespace, package) = rest.split_once('/').ok_or_else(invalid)?;
    if namespace.is_empty() || package.is_empty() || package.contains(':') {
        return Err(invalid());
    }
    Ok(PackageRef {
        namespace: namespace.to_string(),
        package: package.to_string(),
    })
}

fn encode_package(package: &str) -> String {
    package.replace('/', "%2F")
}

#[derive(Deserialize)]
struct PackageVersion {
    id: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: Option<VersionMetadata>,
}

#[derive(Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    container: Option<ContainerMetadata>,
}

#[derive(Deserialize)]
struct ContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

/// Parse one page of the package versions API.
pub fn parse_versions(body: &str) -> Result<Vec<RegistryVersion>> {
    let page: Vec<PackageVersion> = serde_json::from_str(body)?;
    Ok(page
        .into_iter()
        .map(|v| RegistryVersion {
            id: v.id.to_string(),
            tags: v
                .metadata
                .and_then(|m| m.container)
                .map(|c| c.tags)
                .unwrap_or_default(),
            created: v.created_at,
        })
        .collect())
}
