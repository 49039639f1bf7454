//! Tool options and their inheritance.
//!
//! Options are declared as a list of tool-tagged entries at any level of the
//! configuration (global, image, version, variant). When a target needs the
//! options for a tool, each field is taken from the most specific level that
//! sets it, falling back to the tool's built-in default.

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_GOSS_COMMAND, DEFAULT_GOSS_WAIT};

/// Options for one tool, keyed by the `tool` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum ToolOptions {
    Goss(GossOptions),
}

/// Options for the goss/dgoss test runner. Unset fields are inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GossOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
}

/// Fully resolved goss options for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGoss {
    pub command: String,
    pub wait: u64,
}

impl Default for ResolvedGoss {
    fn default() -> Self {
        Self {
            command: DEFAULT_GOSS_COMMAND.to_string(),
            wait: DEFAULT_GOSS_WAIT,
        }
    }
}

fn goss_entries(options: &[ToolOptions]) -> impl Iterator<Item = &GossOptions> {
    options.iter().map(|o| match o {
        ToolOptions::Goss(goss) => goss,
    })
}

/// Resolve goss options from a chain of option lists, most specific first.
pub fn resolve_goss(chain: &[&[ToolOptions]]) -> ResolvedGoss {
    let defaults = ResolvedGoss::default();
    let command = chain
        .iter()
        .flat_map(|level| goss_entries(level))
        .find_map(|g| g.command.clone())
        .unwrap_or(defaults.command);
    let wait = chain
        .iter()
        .flat_map(|level| goss_entries(level))
        .find_map(|g| g.wait)
        .unwrap_or(defaults.wait);
    ResolvedGoss { command, wait }
}

/// Count entries per tool in one list. More than one entry for the same tool
/// at one level is ambiguous.
pub fn duplicate_tools(options: &[ToolOptions]) -> Vec<&'static str> {
    let goss = goss_entries(options).count();
    if goss > 1 {
        vec!["goss"]
    } else {
        Vec::new()
    }
}
