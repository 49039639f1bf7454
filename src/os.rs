//! # Operating System Descriptors
//!
//! Build targets are produced per operating system. This module holds the
//! static registry of operating systems the tool knows how to describe
//! (family, distribution, version, code name) and the lookup that matches a
//! free-form name such as `"Ubuntu 24.04"`, `"el9"` or `"noble"` against it.
//!
//! Names that do not match a known descriptor are not an error: projects
//! regularly target systems the tool has no profile for. Those names resolve
//! to a descriptor of family [`OsFamily::Unknown`] and the caller logs a
//! warning.

use std::fmt;

use serde::Serialize;

use crate::path::condense;

/// Package-management family of an operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Debian,
    RedHat,
    Suse,
    Unknown,
}

impl OsFamily {
    /// Suffix of native package files (`.deb`, `.rpm`).
    pub fn package_suffix(&self) -> &'static str {
        match self {
            OsFamily::Debian => ".deb",
            OsFamily::RedHat | OsFamily::Suse => ".rpm",
            OsFamily::Unknown => "",
        }
    }

    /// Separator between name, version and architecture in package file
    /// names (`pkg_1.0_amd64.deb` vs `pkg-1.0.x86_64.rpm`).
    pub fn package_separator(&self) -> &'static str {
        match self {
            OsFamily::Debian => "_",
            OsFamily::RedHat | OsFamily::Suse | OsFamily::Unknown => ".",
        }
    }

    /// Architecture name used by the family's package tooling.
    pub fn architecture(&self) -> &'static str {
        match self {
            OsFamily::Debian => "amd64",
            OsFamily::RedHat | OsFamily::Suse | OsFamily::Unknown => "x86_64",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsFamily::Debian => "debian",
            OsFamily::RedHat => "redhat",
            OsFamily::Suse => "suse",
            OsFamily::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A fully described operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsDescriptor {
    pub family: OsFamily,
    /// Canonical distribution id (`ubuntu`, `rhel`, ...).
    pub distribution: String,
    pub version: String,
    pub codename: Option<String>,
    /// Human-readable name (`Ubuntu 24.04`).
    pub display_name: String,
}

impl OsDescriptor {
    /// Whether this descriptor came from the built-in registry.
    pub fn is_known(&self) -> bool {
        self.family != OsFamily::Unknown
    }

    pub fn package_suffix(&self) -> &'static str {
        self.family.package_suffix()
    }

    pub fn package_separator(&self) -> &'static str {
        self.family.package_separator()
    }

    /// Compact identifier (`ubuntu2404`).
    pub fn condensed(&self) -> String {
        condense(&format!("{}{}", self.distribution, self.version))
    }
}

struct KnownOs {
    family: OsFamily,
    distribution: &'static str,
    display: &'static str,
    version: &'static str,
    codename: Option<&'static str>,
}

const SUPPORTED: &[KnownOs] = &[
    KnownOs { family: OsFamily::Debian, distribution: "ubuntu", display: "Ubuntu", version: "20.04", codename: Some("focal") },
    KnownOs { family: OsFamily::Debian, distribution: "ubuntu", display: "Ubuntu", version: "22.04", codename: Some("jammy") },
    KnownOs { family: OsFamily::Debian, distribution: "ubuntu", display: "Ubuntu", version: "24.04", codename: Some("noble") },
    KnownOs { family: OsFamily::Debian, distribution: "debian", display: "Debian", version: "11", codename: Some("bullseye") },
    KnownOs { family: OsFamily::Debian, distribution: "debian", display: "Debian", version: "12", codename: Some("bookworm") },
    KnownOs { family: OsFamily::Debian, distribution: "debian", display: "Debian", version: "13", codename: Some("trixie") },
    KnownOs { family: OsFamily::RedHat, distribution: "rhel", display: "RHEL", version: "8", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "rhel", display: "RHEL", version: "9", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "rhel", display: "RHEL", version: "10", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "rocky", display: "Rocky Linux", version: "8", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "rocky", display: "Rocky Linux", version: "9", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "almalinux", display: "AlmaLinux", version: "8", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "almalinux", display: "AlmaLinux", version: "9", codename: None },
    KnownOs { family: OsFamily::RedHat, distribution: "centos", display: "CentOS", version: "7", codename: None },
    KnownOs { family: OsFamily::Suse, distribution: "opensuse", display: "openSUSE Leap", version: "15.5", codename: None },
    KnownOs { family: OsFamily::Suse, distribution: "opensuse", display: "openSUSE Leap", version: "15.6", codename: None },
    KnownOs { family: OsFamily::Suse, distribution: "sles", display: "SLES", version: "15", codename: None },
];

/// Map alternative distribution names onto their canonical id.
fn canonical_distribution(name: &str) -> &str {
    match name {
        "redhat" | "rh" | "el" | "redhatenterpriselinux" => "rhel",
        "rockylinux" => "rocky",
        "alma" => "almalinux",
        "leap" | "opensuseleap" => "opensuse",
        "suse" | "suselinuxenterpriseserver" => "sles",
        other => other,
    }
}

/// Split a normalized OS name into its distribution and version parts.
///
/// `"ubuntu 24.04"` -> (`"ubuntu"`, `"24.04"`), `"el9"` -> (`"el"`, `"9"`).
fn split_name(normalized: &str) -> (String, String) {
    let idx = normalized
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(normalized.len());
    let distribution: String = normalized[..idx]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let version: String = normalized[idx..]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (distribution, version.trim_matches('.').to_string())
}

fn versions_match(known: &str, requested: &str) -> bool {
    if known == requested {
        return true;
    }
    // "9.4" matches "9" and "24.04.1" matches "24.04"
    requested
        .strip_prefix(known)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Look up a supported OS by name, alias or code name.
pub fn lookup(name: &str) -> Option<OsDescriptor> {
    let normalized = name.trim().to_lowercase();

    if let Some(known) = SUPPORTED
        .iter()
        .find(|k| k.codename.is_some_and(|c| c == normalized))
    {
        return Some(describe(known));
    }

    let (distribution, version) = split_name(&normalized);
    let distribution = canonical_distribution(&distribution);
    SUPPORTED
        .iter()
        .find(|k| k.distribution == distribution && versions_match(k.version, &version))
        .map(describe)
}

/// Resolve a name to a descriptor, falling back to an unknown-family
/// descriptor built from the name itself.
pub fn resolve(name: &str) -> OsDescriptor {
    lookup(name).unwrap_or_else(|| {
        let (distribution, version) = split_name(&name.trim().to_lowercase());
        OsDescriptor {
            family: OsFamily::Unknown,
            distribution,
            version,
            codename: None,
            display_name: name.trim().to_string(),
        }
    })
}

/// All supported operating systems, in registry order.
pub fn supported() -> Vec<OsDescriptor> {
    SUPPORTED.iter().map(describe).collect()
}

fn describe(known: &KnownOs) -> OsDescriptor {
    OsDescriptor {
        family: known.family,
        distribution: known.distribution.to_string(),
        version: known.version.to_string(),
        codename: known.codename.map(str::to_string),
        display_name: format!("{} {}", known.display, known.version),
    }
}
