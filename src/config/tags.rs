//! Tag patterns and their applicability filters.

use serde::{Deserialize, Serialize};

/// Condition under which a tag pattern applies to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagFilter {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "latest")]
    Latest,
    #[serde(rename = "primaryOS", alias = "primaryOs")]
    PrimaryOs,
    #[serde(rename = "primaryVariant")]
    PrimaryVariant,
}

/// Facts about a target that tag filters are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagFacts {
    pub latest: bool,
    pub primary_os: bool,
    pub primary_variant: bool,
}

impl TagFilter {
    pub fn matches(&self, facts: &TagFacts) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Latest => facts.latest,
            TagFilter::PrimaryOs => facts.primary_os,
            TagFilter::PrimaryVariant => facts.primary_variant,
        }
    }
}

fn default_only() -> Vec<TagFilter> {
    vec![TagFilter::All]
}

fn is_default_only(only: &[TagFilter]) -> bool {
    only == [TagFilter::All]
}

/// A set of templates rendered into tags when every filter in `only` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagPattern {
    pub patterns: Vec<String>,
    #[serde(default = "default_only", skip_serializing_if = "is_default_only")]
    pub only: Vec<TagFilter>,
}

impl TagPattern {
    pub fn new(patterns: &[&str], only: &[TagFilter]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            only: only.to_vec(),
        }
    }

    /// Whether every filter holds for `facts`. An empty filter list matches.
    pub fn applies_to(&self, facts: &TagFacts) -> bool {
        self.only.iter().all(|f| f.matches(facts))
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>, owner: &str) {
        if self.patterns.is_empty() {
            errors.push(format!("{}: tag pattern has no patterns", owner));
        }
        for pattern in &self.patterns {
            if pattern.trim().is_empty() {
                errors.push(format!("{}: tag pattern must not be empty", owner));
            }
        }
    }
}

struct DefaultPattern {
    pattern: &'static str,
    only: &'static [TagFilter],
    needs_os: bool,
    needs_variant: bool,
}

const DEFAULT_PATTERNS: &[DefaultPattern] = &[
    DefaultPattern { pattern: "{{ Version }}-{{ OS }}-{{ Variant }}", only: &[TagFilter::All], needs_os: true, needs_variant: true },
    DefaultPattern { pattern: "{{ Version }}-{{ Variant }}", only: &[TagFilter::PrimaryOs], needs_os: false, needs_variant: true },
    DefaultPattern { pattern: "{{ Version }}-{{ OS }}", only: &[TagFilter::PrimaryVariant], needs_os: true, needs_variant: false },
    DefaultPattern { pattern: "{{ Version }}", only: &[TagFilter::PrimaryOs, TagFilter::PrimaryVariant], needs_os: false, needs_variant: false },
    DefaultPattern { pattern: "{{ OS }}-{{ Variant }}", only: &[TagFilter::Latest], needs_os: true, needs_variant: true },
    DefaultPattern { pattern: "{{ OS }}", only: &[TagFilter::Latest, TagFilter::PrimaryVariant], needs_os: true, needs_variant: false },
    DefaultPattern { pattern: "{{ Variant }}", only: &[TagFilter::Latest, TagFilter::PrimaryOs], needs_os: false, needs_variant: true },
    DefaultPattern { pattern: "latest", only: &[TagFilter::Latest, TagFilter::PrimaryOs, TagFilter::PrimaryVariant], needs_os: false, needs_variant: false },
];

/// The built-in tag patterns, restricted to those whose variables exist for
/// a target with or without an OS and a variant.
pub fn default_tag_patterns(has_os: bool, has_variant: bool) -> Vec<TagPattern> {
    DEFAULT_PATTERNS
        .iter()
        .filter(|d| (has_os || !d.needs_os) && (has_variant || !d.needs_variant))
        .map(|d| TagPattern::new(&[d.pattern], d.only))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let yaml = r#"
patterns: ["{{ Version }}"]
only: [latest, primaryOS, primaryVariant]
"#;
        let parsed: TagPattern = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed.only,
            vec![TagFilter::Latest, TagFilter::PrimaryOs, TagFilter::PrimaryVariant]
        );
    }

    #[test]
    fn test_only_defaults_to_all() {
        let parsed: TagPattern = serde_yaml::from_str("patterns: [x]").unwrap();
        assert_eq!(parsed.only, vec![TagFilter::All]);
    }

    #[test]
    fn test_applies_to_requires_every_filter() {
        let pattern = TagPattern::new(&["latest"], &[TagFilter::Latest, TagFilter::PrimaryOs]);
        let mut facts = TagFacts {
            latest: true,
            primary_os: false,
            primary_variant: true,
        };
        assert!(!pattern.applies_to(&facts));
        facts.primary_os = true;
        assert!(pattern.applies_to(&facts));
    }

    #[test]
    fn test_defaults_full_matrix() {
        assert_eq!(default_tag_patterns(true, true).len(), 8);
    }

    #[test]
    fn test_defaults_without_os_or_variant() {
        let patterns: Vec<String> = default_tag_patterns(false, false)
            .into_iter()
            .flat_map(|p| p.patterns)
            .collect();
        assert_eq!(patterns, vec!["{{ Version }}", "latest"]);

        let patterns: Vec<String> = default_tag_patterns(true, false)
            .into_iter()
            .flat_map(|p| p.patterns)
            .collect();
        assert_eq!(
            patterns,
            vec!["{{ Version }}-{{ OS }}", "{{ Version }}", "{{ OS }}", "latest"]
        );
    }
}
