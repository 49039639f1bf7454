//! Registries and registry inheritance.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A push/pull target for built images.
///
/// Two registries are equal when their `base_url` is equal, regardless of the
/// repository override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Registry {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Repository name to push to instead of the image name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl Registry {
    pub fn new(host: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            host: host.into(),
            namespace: namespace.map(String::from),
            repository: None,
        }
    }

    /// `host[/namespace]`
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        match self.namespace.as_deref().map(|n| n.trim_matches('/')) {
            Some(ns) if !ns.is_empty() => format!("{}/{}", host, ns),
            _ => host.to_string(),
        }
    }

    /// Full image reference without a tag.
    pub fn image_ref(&self, image_name: &str) -> String {
        let repository = self.repository.as_deref().unwrap_or(image_name);
        format!("{}/{}", self.base_url(), repository)
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>, owner: &str) {
        if self.host.trim().is_empty() {
            errors.push(format!("{}: registry host must not be empty", owner));
        } else if self.host.contains("://") {
            errors.push(format!(
                "{}: registry host '{}' must not include a scheme",
                owner, self.host
            ));
        }
    }
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.base_url() == other.base_url()
    }
}

impl Eq for Registry {}

impl Hash for Registry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_url().hash(state);
    }
}

/// Something that can adjust the registries it inherits.
pub trait RegistryScope {
    /// Registries appended to the inherited set.
    fn extra_registries(&self) -> Option<&[Registry]>;
    /// Registries replacing the inherited set entirely.
    fn override_registries(&self) -> Option<&[Registry]>;
}

/// Remove duplicate registries, keeping the first of each base URL. Each
/// dropped duplicate is logged and recorded in `warnings`.
pub fn dedupe_registries(
    registries: Vec<Registry>,
    owner: &str,
    warnings: &mut Vec<String>,
) -> Vec<Registry> {
    let mut unique: Vec<Registry> = Vec::with_capacity(registries.len());
    for registry in registries {
        if unique.contains(&registry) {
            let message = format!("{}: duplicate registry '{}' ignored", owner, registry.base_url());
            log::warn!("{}", message);
            warnings.push(message);
            continue;
        }
        unique.push(registry);
    }
    unique
}

/// Apply `scope` on top of the `inherited` registries.
///
/// An override replaces the inherited set and ignores extras. Otherwise extras
/// are appended to the inherited set, deduplicated.
pub fn inherit_registries(inherited: &[Registry], scope: &dyn RegistryScope) -> Vec<Registry> {
    if let Some(overrides) = scope.override_registries() {
        return overrides.to_vec();
    }
    let mut merged = inherited.to_vec();
    if let Some(extra) = scope.extra_registries() {
        for registry in extra {
            if !merged.contains(registry) {
                merged.push(registry.clone());
            }
        }
    }
    merged
}
