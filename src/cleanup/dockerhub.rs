//! Docker Hub cleanup through the Hub v2 API.
//!
//! Docker Hub only exposes tags, so every version listed here is tagged and
//! is deleted by tag name.

use std::cell::RefCell;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PackageRef, RegistryCleaner, RegistryVersion};
use crate::error::{Error, Result};

pub const DOCKER_HUB_HOST: &str = "docker.io";
pub const HUB_API: &str = "https://hub.docker.com/v2";
const PAGE_SIZE: usize = 100;

/// Cleans `docker.io/<namespace>/<repository>` URLs.
pub struct DockerHubCleaner {
    client: reqwest::blocking::Client,
    username: Option<String>,
    password: Option<String>,
    /// Session token, obtained on first use.
    token: RefCell<Option<String>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl DockerHubCleaner {
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("bakery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            username,
            password,
            token: RefCell::new(None),
        })
    }

    /// Authenticate with `DOCKERHUB_USERNAME` and `DOCKERHUB_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self::new(var("DOCKERHUB_USERNAME"), var("DOCKERHUB_TOKEN"))
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        let url = format!("{}/users/login", HUB_API);
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(Error::Registry {
                url,
                message: "DOCKERHUB_USERNAME and DOCKERHUB_TOKEN must be set".to_string(),
            });
        };
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .map_err(|e| registry_error(&url, e))?;
        if !response.status().is_success() {
            return Err(Error::Registry {
                message: format!("login failed with status {}", response.status()),
                url,
            });
        }
        let login: LoginResponse = response.json().map_err(|e| registry_error(&url, e))?;
        *self.token.borrow_mut() = Some(login.token.clone());
        Ok(login.token)
    }

    fn tags_url(package: &PackageRef) -> String {
        format!(
            "{}/namespaces/{}/repositories/{}/tags",
            HUB_API, package.namespace, package.package
        )
    }
}

fn registry_error(url: &str, error: reqwest::Error) -> Error {
    Error::Registry {
        url: url.to_string(),
        message: error.to_string(),
    }
}

impl RegistryCleaner for DockerHubCleaner {
    fn provider(&self) -> &'static str {
        "Docker Hub"
    }

    fn parse_url(&self, url: &str) -> Result<PackageRef> {
        parse_repository_url(url)
    }

    fn fetch_versions(&self, package: &PackageRef) -> Result<Vec<RegistryVersion>> {
        let token = self.token()?;
        let mut versions = Vec::new();
        let mut next = Some(format!("{}?page_size={}", Self::tags_url(package), PAGE_SIZE));
        while let Some(url) = next {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .map_err(|e| registry_error(&url, e))?;
            if !response.status().is_success() {
                return Err(Error::Registry {
                    message: format!("unexpected status {}", response.status()),
                    url,
                });
            }
            let body = response.text().map_err(|e| registry_error(&url, e))?;
            let page = parse_tags_page(&body)?;
            versions.extend(page.versions);
            next = page.next;
        }
        Ok(versions)
    }

    fn delete_version(&self, package: &PackageRef, version: &RegistryVersion) -> Result<()> {
        let token = self.token()?;
        let url = format!("{}/{}", Self::tags_url(package), version.id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .map_err(|e| registry_error(&url, e))?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Error::Registry {
            url,
            message: format!("unexpected status {status}"),
        })
    }
}

/// Split `[https://]docker.io/<namespace>/<repository>`. Official images
/// (`docker.io/<repository>`) live in the `library` namespace.
pub fn parse_repository_url(url: &str) -> Result<PackageRef> {
    let invalid = || Error::RegistryFormat {
        url: url.to_string(),
        provider: "Docker Hub".to_string(),
        expected: "docker.io/<namespace>/<repository>".to_string(),
    };
    let trimmed = url
        .trim()
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let (host, rest) = trimmed.split_once('/').ok_or_else(invalid)?;
    if !matches!(host, DOCKER_HUB_HOST | "index.docker.io" | "registry-1.docker.io") {
        return Err(invalid());
    }
    let parts: Vec<&str> = rest.split('/').collect();
    let (namespace, repository) = match parts.as_slice() {
        [repository] => ("library", *repository),
        [namespace, repository] => (*namespace, *repository),
        _ => return Err(invalid()),
    };
    if namespace.is_empty() || repository.is_empty() || repository.contains(':') {
        return Err(invalid());
    }
    Ok(PackageRef {
        namespace: namespace.to_string(),
        package: repository.to_string(),
    })
}

#[derive(Deserialize)]
struct TagRecord {
    name: String,
    #[serde(default)]
    tag_last_pushed: Option<DateTime<Utc>>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagRecord>,
}

/// One page of tags and the URL of the next page.
#[derive(Debug)]
pub struct TagsPage {
    pub versions: Vec<RegistryVersion>,
    pub next: Option<String>,
}

/// Parse one page of the repository tags API. Tags without a timestamp are
/// left out since their age is unknown.
pub fn parse_tags_page(body: &str) -> Result<TagsPage> {
    let response: TagsResponse = serde_json::from_str(body)?;
    let versions = response
        .results
        .into_iter()
        .filter_map(|tag| {
            let created = tag.tag_last_pushed.or(tag.last_updated)?;
            Some(RegistryVersion {
                id: tag.name.clone(),
                tags: vec![tag.name],
                created,
            })
        })
        .collect();
    Ok(TagsPage {
        versions,
        next: response.next.filter(|n| !n.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_url() {
        let package = parse_repository_url("docker.io/acme/base").unwrap();
        assert_eq!(package.namespace, "acme");
        assert_eq!(package.package, "base");

        let official = parse_repository_url("https://docker.io/ubuntu").unwrap();
        assert_eq!(official.namespace, "library");
        assert_eq!(official.package, "ubuntu");
    }

    #[test]
    fn test_parse_repository_url_rejects_other_shapes() {
        for url in ["ghcr.io/acme/base", "docker.io/a/b/c", "docker.io", "docker.io/acme/base:1"] {
            assert!(
                matches!(parse_repository_url(url), Err(Error::RegistryFormat { .. })),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_parse_tags_page() {
        let body = r#"{
            "count": 3,
            "next": "https://hub.docker.com/v2/namespaces/acme/repositories/base/tags?page=2&page_size=100",
            "results": [
                {"name": "1.0", "tag_last_pushed": "2024-01-02T03:04:05.123456Z", "last_updated": "2024-01-02T03:04:05Z"},
                {"name": "0.9", "last_updated": "2023-01-01T00:00:00Z"},
                {"name": "broken"}
            ]
        }"#;
        let page = parse_tags_page(body).unwrap();
        assert_eq!(page.versions.len(), 2);
        assert_eq!(page.versions[0].id, "1.0");
        assert!(page.versions.iter().all(|v| v.is_tagged()));
        assert!(page.next.is_some());

        let last = parse_tags_page(r#"{"next": null, "results": []}"#).unwrap();
        assert!(last.next.is_none());
    }

    #[test]
    fn test_missing_credentials_are_a_registry_error() {
        let cleaner = DockerHubCleaner::new(None, None).unwrap();
        let package = parse_repository_url("docker.io/acme/base").unwrap();
        assert!(matches!(
            cleaner.fetch_versions(&package),
            Err(Error::Registry { .. })
        ));
    }
}
