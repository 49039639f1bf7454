//! Version matrix for CI job generation.

use serde::Serialize;

use crate::config::Configuration;
use crate::error::Result;
use crate::matrix::TargetFilter;

/// One image version, as consumed by a CI matrix strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiEntry {
    pub image: String,
    pub version: String,
    pub latest: bool,
    pub os: Vec<String>,
}

/// One entry per image version selected by `filter`. An OS selection
/// narrows the listed OS names, and versions left without a matching OS are
/// omitted.
pub fn version_matrix(config: &Configuration, filter: &TargetFilter) -> Result<Vec<CiEntry>> {
    filter.validate(config)?;
    let mut entries = Vec::new();
    for image in config.images.iter().filter(|i| filter.matches_image(i)) {
        for version in image.versions.iter().filter(|v| filter.matches_version(v)) {
            let os: Vec<String> = version
                .os
                .iter()
                .filter(|o| filter.matches_os(Some(o)))
                .map(|o| o.name.clone())
                .collect();
            if filter.os.is_some() && os.is_empty() {
                continue;
            }
            entries.push(CiEntry {
                image: image.name.clone(),
                version: version.name.clone(),
                latest: version.latest,
                os,
            });
        }
    }
    Ok(entries)
}

pub fn to_json(entries: &[CiEntry]) -> Result<String> {
    Ok(serde_json::to_string(entries)?)
}
