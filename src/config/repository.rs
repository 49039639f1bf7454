//! Repository labeling metadata.

use serde::{Deserialize, Serialize};
use url::Url;

/// Vendor label prefix used when the configuration does not set one.
pub const DEFAULT_LABEL_PREFIX: &str = "io.bakery.image";

/// Repository metadata as written in configuration files.
///
/// Every field is optional so an override file can replace fields one at a
/// time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepositorySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_prefix: Option<String>,
}

impl RepositorySpec {
    /// Replace each field present in `overlay`, keeping ours otherwise.
    pub fn overlay(self, overlay: RepositorySpec) -> RepositorySpec {
        RepositorySpec {
            url: overlay.url.or(self.url),
            vendor: overlay.vendor.or(self.vendor),
            maintainer: overlay.maintainer.or(self.maintainer),
            authors: overlay.authors.or(self.authors),
            label_prefix: overlay.label_prefix.or(self.label_prefix),
        }
    }
}

/// Validated repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Canonical source URL, always with a scheme.
    pub url: Option<String>,
    pub vendor: Option<String>,
    pub maintainer: Option<String>,
    /// Deduplicated authors, in declaration order.
    pub authors: Vec<String>,
    pub label_prefix: String,
}

impl Repository {
    pub(crate) fn from_spec(
        spec: RepositorySpec,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Self {
        let url = spec.url.and_then(|raw| match normalize_url(&raw) {
            Ok(url) => Some(url),
            Err(message) => {
                errors.push(format!("repository.url '{}': {}", raw, message));
                None
            }
        });

        let label_prefix = spec
            .label_prefix
            .map(|p| p.trim().trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_LABEL_PREFIX.to_string());

        Self {
            url,
            vendor: spec.vendor,
            maintainer: spec.maintainer,
            authors: dedupe_authors(spec.authors.unwrap_or_default(), warnings),
            label_prefix,
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::from_spec(RepositorySpec::default(), &mut Vec::new(), &mut Vec::new())
    }
}

fn normalize_url(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).map_err(|e| e.to_string())?;
    if url.host_str().is_none() {
        return Err("URL has no host".to_string());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Key authors by e-mail address when one is given in `Name <email>` form.
fn author_key(author: &str) -> String {
    let trimmed = author.trim();
    match (trimmed.find('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => trimmed[start + 1..end].trim().to_lowercase(),
        _ => trimmed.to_lowercase(),
    }
}

fn dedupe_authors(authors: Vec<String>, warnings: &mut Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(authors.len());
    for author in authors {
        if seen.insert(author_key(&author)) {
            unique.push(author);
        } else {
            let message = format!("Duplicate author '{}' ignored", author);
            log::warn!("{}", message);
            warnings.push(message);
        }
    }
    unique
}
