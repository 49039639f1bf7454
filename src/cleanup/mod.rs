//! # Registry Cleanup
//!
//! Deletes stale image versions from remote registries. Every provider runs
//! the same workflow, implemented once in [`RegistryCleaner::clean`]:
//!
//! 1. **ParseUrl**: split the package URL into namespace and package. A URL
//!    the provider does not understand is fatal and no request is made.
//! 2. **FetchVersions**: list every version of the package, following
//!    pagination. Transport and authentication failures end the run for
//!    this URL but are returned in the report, so callers cleaning several
//!    registries continue with the next one.
//! 3. **FilterVersions**: select candidates with [`select_versions`].
//! 4. **DryRunReport** or **Delete**: a dry run only reports the candidates.
//!    Otherwise each candidate is deleted and per-item failures are
//!    collected.
//!
//! Providers live in [`ghcr`] and [`dockerhub`].

pub mod dockerhub;
pub mod ghcr;
pub mod policy;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::Configuration;
use crate::error::{Error, ErrorGroup, Result};

pub use policy::parse_duration;

/// One deletable version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryVersion {
    /// Provider identifier used for deletion.
    pub id: String,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
}

impl RegistryVersion {
    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// Which versions to remove. A threshold of `None` disables that rule.
#[derive(Debug, Clone, Default)]
pub struct CleanupPolicy {
    pub tagged_older_than: Option<Duration>,
    pub untagged_older_than: Option<Duration>,
    pub dry_run: bool,
}

/// Where a cleanup run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    ParseUrl,
    FetchVersions,
    FilterVersions,
    DryRunReport,
    Delete,
    Done,
    Failed,
}

impl fmt::Display for CleanupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupStage::ParseUrl => "parse-url",
            CleanupStage::FetchVersions => "fetch-versions",
            CleanupStage::FilterVersions => "filter-versions",
            CleanupStage::DryRunReport => "dry-run",
            CleanupStage::Delete => "delete",
            CleanupStage::Done => "done",
            CleanupStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of cleaning one package URL.
#[derive(Debug)]
pub struct CleanupReport {
    pub url: String,
    pub stage: CleanupStage,
    /// Versions matching the policy.
    pub selected: Vec<RegistryVersion>,
    /// Ids of versions actually deleted.
    pub deleted: Vec<String>,
    pub errors: Vec<Error>,
}

impl CleanupReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            stage: CleanupStage::ParseUrl,
            selected: Vec::new(),
            deleted: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn failed(url: &str, error: Error) -> Self {
        let mut report = Self::new(url);
        report.stage = CleanupStage::Failed;
        report.errors.push(error);
        report
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A package inside a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub namespace: String,
    pub package: String,
}

/// Trait for registry providers - allows mocking in tests
pub trait RegistryCleaner {
    /// Human-readable provider name.
    fn provider(&self) -> &'static str;

    /// Split a package URL into namespace and package.
    fn parse_url(&self, url: &str) -> Result<PackageRef>;

    /// Every version of the package, across all pages.
    fn fetch_versions(&self, package: &PackageRef) -> Result<Vec<RegistryVersion>>;

    fn delete_version(&self, package: &PackageRef, version: &RegistryVersion) -> Result<()>;

    /// Run the cleanup workflow for one package URL.
    ///
    /// Only a malformed URL is returned as an error; every later failure is
    /// recorded in the report.
    fn clean(&self, url: &str, policy: &CleanupPolicy, now: DateTime<Utc>) -> Result<CleanupReport> {
        let mut report = CleanupReport::new(url);
        let package = self.parse_url(url)?;

        report.stage = CleanupStage::FetchVersions;
        let versions = match self.fetch_versions(&package) {
            Ok(versions) => versions,
            Err(e) => {
                log::warn!("Could not list versions of {}: {}", url, e);
                report.stage = CleanupStage::Failed;
                report.errors.push(e);
                return Ok(report);
            }
        };
        log::debug!("{} versions found for {}", versions.len(), url);

        report.stage = CleanupStage::FilterVersions;
        report.selected = select_versions(&versions, policy, now);

        if policy.dry_run {
            report.stage = CleanupStage::DryRunReport;
            for version in &report.selected {
                log::info!("[dry-run] would delete {} {}", url, describe(version));
            }
            report.stage = CleanupStage::Done;
            return Ok(report);
        }

        report.stage = CleanupStage::Delete;
        for version in &report.selected {
            match self.delete_version(&package, version) {
                Ok(()) => {
                    log::info!("Deleted {} {}", url, describe(version));
                    report.deleted.push(version.id.clone());
                }
                Err(e) => report.errors.push(e),
            }
        }
        report.stage = CleanupStage::Done;
        Ok(report)
    }
}

fn describe(version: &RegistryVersion) -> String {
    if version.is_tagged() {
        format!("{} ({})", version.id, version.tags.join(", "))
    } else {
        format!("{} (untagged)", version.id)
    }
}

/// Versions matching `policy` at time `now`, each listed once, in input order.
///
/// A version is selected when it is tagged and older than the tagged
/// threshold, or untagged and older than the untagged threshold.
pub fn select_versions(
    versions: &[RegistryVersion],
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
) -> Vec<RegistryVersion> {
    // A cutoff before the earliest representable time selects nothing
    let older_than = |version: &RegistryVersion, threshold: Option<Duration>| {
        threshold
            .and_then(|age| now.checked_sub_signed(age))
            .is_some_and(|cutoff| version.created < cutoff)
    };

    let mut seen = HashSet::new();
    versions
        .iter()
        .filter(|v| {
            (v.is_tagged() && older_than(v, policy.tagged_older_than))
                || (!v.is_tagged() && older_than(v, policy.untagged_older_than))
        })
        .filter(|v| seen.insert(v.id.clone()))
        .cloned()
        .collect()
}

/// The registry providers available to [`clean_all`].
pub struct Cleaners {
    ghcr: Box<dyn RegistryCleaner>,
    dockerhub: Box<dyn RegistryCleaner>,
}

impl Cleaners {
    pub fn new(ghcr: Box<dyn RegistryCleaner>, dockerhub: Box<dyn RegistryCleaner>) -> Self {
        Self { ghcr, dockerhub }
    }

    /// HTTP clients authenticated from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            Box::new(ghcr::GhcrCleaner::from_env()?),
            Box::new(dockerhub::DockerHubCleaner::from_env()?),
        ))
    }

    /// The cleaner responsible for `url`, by registry host.
    pub fn for_url(&self, url: &str) -> Option<&dyn RegistryCleaner> {
        match registry_host(url).as_str() {
            ghcr::GHCR_HOST => Some(self.ghcr.as_ref()),
            dockerhub::DOCKER_HUB_HOST | "index.docker.io" | "registry-1.docker.io" => {
                Some(self.dockerhub.as_ref())
            }
            _ => None,
        }
    }
}

/// Host part of a package URL, lowercased and without scheme.
pub fn registry_host(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Package URLs of every image (or only the image named `only`) in every registry its
/// targets are pushed to, sorted and deduplicated.
pub fn package_urls(config: &Configuration, only: Option<&str>) -> Result<Vec<String>> {
    if let Some(name) = only {
        if config.get_image(name).is_none() {
            return Err(Error::ImageNotFound {
                name: name.to_string(),
            });
        }
    }
    let mut urls = Vec::new();
    for image in config
        .images
        .iter()
        .filter(|i| only.is_none_or(|name| i.name == name))
    {
        for version in &image.versions {
            let variants: Vec<Option<&crate::config::Variant>> = if image.variants.is_empty() {
                vec![None]
            } else {
                image.variants.iter().map(Some).collect()
            };
            for variant in variants {
                for registry in config.resolve_registries(image, version, variant) {
                    urls.push(registry.image_ref(&image.name));
                }
            }
        }
    }
    urls.sort();
    urls.dedup();
    Ok(urls)
}

/// Clean every URL in turn. URLs on unsupported hosts are skipped with a
/// warning; a URL failing at any stage does not stop the others.
pub fn clean_all(
    urls: &[String],
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
    cleaners: &Cleaners,
) -> Vec<CleanupReport> {
    let mut reports = Vec::new();
    for url in urls {
        let Some(cleaner) = cleaners.for_url(url) else {
            log::warn!("Skipping {}: no cleanup support for this registry", url);
            continue;
        };
        log::info!("Cleaning {} ({})", url, cleaner.provider());
        match cleaner.clean(url, policy, now) {
            Ok(report) => reports.push(report),
            Err(e) => reports.push(CleanupReport::failed(url, e)),
        }
    }
    reports
}

/// Turn the failures recorded in `reports` into one error.
pub fn into_result(reports: Vec<CleanupReport>) -> Result<()> {
    let mut failures = ErrorGroup::new("Registry cleanup failed");
    for report in reports {
        for error in report.errors {
            failures.push(error);
        }
    }
    failures.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn weeks_ago(now: DateTime<Utc>, weeks: i64) -> DateTime<Utc> {
        now - Duration::weeks(weeks)
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn versions() -> Vec<RegistryVersion> {
        vec![
            RegistryVersion {
                id: "1".to_string(),
                tags: vec!["v1".to_string()],
                created: weeks_ago(now(), 100),
            },
            RegistryVersion {
                id: "2".to_string(),
                tags: Vec::new(),
                created: weeks_ago(now(), 30),
            },
            RegistryVersion {
                id: "3".to_string(),
                tags: vec!["v2".to_string()],
                created: weeks_ago(now(), 2),
            },
        ]
    }

    #[test]
    fn test_select_tagged_and_untagged() {
        let policy = CleanupPolicy {
            tagged_older_than: Some(Duration::weeks(80)),
            untagged_older_than: Some(Duration::weeks(26)),
            dry_run: false,
        };
        let ids: Vec<String> = select_versions(&versions(), &policy, now())
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_disabled_threshold_skips_rule() {
        let policy = CleanupPolicy {
            tagged_older_than: Some(Duration::weeks(80)),
            untagged_older_than: None,
            dry_run: false,
        };
        let ids: Vec<String> = select_versions(&versions(), &policy, now())
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["1"]);
        assert!(select_versions(&versions(), &CleanupPolicy::default(), now()).is_empty());
    }

    #[test]
    fn test_selection_is_deduplicated() {
        let mut list = versions();
        list.push(list[0].clone());
        let policy = CleanupPolicy {
            tagged_older_than: Some(Duration::weeks(1)),
            untagged_older_than: Some(Duration::weeks(1)),
            dry_run: false,
        };
        assert_eq!(select_versions(&list, &policy, now()).len(), 3);
    }

    #[test]
    fn test_threshold_beyond_calendar_selects_nothing() {
        let age = policy::parse_duration("1000000000w").unwrap();
        let policy = CleanupPolicy {
            tagged_older_than: Some(age),
            untagged_older_than: Some(age),
            dry_run: true,
        };
        assert!(select_versions(&versions(), &policy, now()).is_empty());
    }

    struct FakeCleaner {
        fetch_error: bool,
        fail_delete: Vec<String>,
        deleted: RefCell<Vec<String>>,
    }

    impl FakeCleaner {
        fn new() -> Self {
            Self {
                fetch_error: false,
                fail_delete: Vec::new(),
                deleted: RefCell::new(Vec::new()),
            }
        }
    }

    impl RegistryCleaner for FakeCleaner {
        fn provider(&self) -> &'static str {
            "fake"
        }

        fn parse_url(&self, url: &str) -> Result<PackageRef> {
            let parts: Vec<&str> = url.split('/').collect();
            match parts.as_slice() {
                [_, namespace, package] => Ok(PackageRef {
                    namespace: namespace.to_string(),
                    package: package.to_string(),
                }),
                _ => Err(Error::RegistryFormat {
                    url: url.to_string(),
                    provider: "fake".to_string(),
                    expected: "host/namespace/package".to_string(),
                }),
            }
        }

        fn fetch_versions(&self, _package: &PackageRef) -> Result<Vec<RegistryVersion>> {
            if self.fetch_error {
                return Err(Error::Registry {
                    url: "fake".to_string(),
                    message: "401 Unauthorized".to_string(),
                });
            }
            Ok(versions())
        }

        fn delete_version(&self, _package: &PackageRef, version: &RegistryVersion) -> Result<()> {
            if self.fail_delete.contains(&version.id) {
                return Err(Error::Registry {
                    url: "fake".to_string(),
                    message: format!("cannot delete {}", version.id),
                });
            }
            self.deleted.borrow_mut().push(version.id.clone());
            Ok(())
        }
    }

    fn policy(dry_run: bool) -> CleanupPolicy {
        CleanupPolicy {
            tagged_older_than: Some(Duration::weeks(1)),
            untagged_older_than: Some(Duration::weeks(1)),
            dry_run,
        }
    }

    #[test]
    fn test_malformed_url_is_fatal() {
        let cleaner = FakeCleaner::new();
        let err = cleaner.clean("ghcr.io/only-org", &policy(false), now()).unwrap_err();
        assert!(matches!(err, Error::RegistryFormat { .. }));
    }

    #[test]
    fn test_fetch_failure_is_reported() {
        let cleaner = FakeCleaner {
            fetch_error: true,
            ..FakeCleaner::new()
        };
        let report = cleaner.clean("ghcr.io/acme/base", &policy(false), now()).unwrap();
        assert_eq!(report.stage, CleanupStage::Failed);
        assert_eq!(report.errors.len(), 1);
        assert!(cleaner.deleted.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let cleaner = FakeCleaner::new();
        let report = cleaner.clean("ghcr.io/acme/base", &policy(true), now()).unwrap();
        assert_eq!(report.stage, CleanupStage::Done);
        assert_eq!(report.selected.len(), 3);
        assert!(report.deleted.is_empty());
        assert!(cleaner.deleted.borrow().is_empty());
    }

    #[test]
    fn test_delete_failures_are_collected() {
        let cleaner = FakeCleaner {
            fail_delete: vec!["2".to_string()],
            ..FakeCleaner::new()
        };
        let report = cleaner.clean("ghcr.io/acme/base", &policy(false), now()).unwrap();
        assert_eq!(report.deleted, vec!["1", "3"]);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_clean_all_dispatches_by_host() {
        let cleaners = Cleaners::new(
            Box::new(FakeCleaner::new()),
            Box::new(FakeCleaner {
                fetch_error: true,
                ..FakeCleaner::new()
            }),
        );
        let urls = vec![
            "ghcr.io/acme/base".to_string(),
            "docker.io/acme/base".to_string(),
            "quay.io/acme/base".to_string(),
            "https://ghcr.io/broken".to_string(),
        ];
        let reports = clean_all(&urls, &policy(true), now(), &cleaners);
        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_success());
        assert_eq!(reports[1].stage, CleanupStage::Failed);
        assert_eq!(reports[2].stage, CleanupStage::Failed);

        match into_result(reports) {
            Err(Error::Group(group)) => assert_eq!(group.len(), 2),
            other => panic!("Expected grouped error, got {:?}", other),
        }
    }

    #[test]
    fn test_package_urls() {
        let file: crate::config::ConfigFile = serde_yaml::from_str(
            r#"
registries:
  - host: ghcr.io
    namespace: acme
images:
  - name: base
    extraRegistries:
      - host: docker.io
        namespace: acme
    versions:
      - name: "1.0"
  - name: tools
    versions:
      - name: "1.0"
        overrideRegistries:
          - host: docker.io
            namespace: acme
            repository: acme-tools
"#,
        )
        .unwrap();
        let config = Configuration::from_file(
            std::path::Path::new("/p"),
            std::path::Path::new("/p/bakery.yaml"),
            file,
        )
        .unwrap();
        assert_eq!(
            package_urls(&config, None).unwrap(),
            vec!["docker.io/acme/acme-tools", "docker.io/acme/base", "ghcr.io/acme/base"]
        );
        assert_eq!(
            package_urls(&config, Some("tools")).unwrap(),
            vec!["docker.io/acme/acme-tools"]
        );
        assert!(matches!(
            package_urls(&config, Some("nope")),
            Err(Error::ImageNotFound { .. })
        ));
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(registry_host("https://GHCR.io/acme/base"), "ghcr.io");
        assert_eq!(registry_host("docker.io/acme/base"), "docker.io");
    }
}
