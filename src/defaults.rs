//! Default values for bakery.
//!
//! This module provides centralized default values used across commands and
//! the library, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Default `--log-level`.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Default command kept running in the container while goss tests execute.
pub const DEFAULT_GOSS_COMMAND: &str = "sleep infinity";

/// Default seconds to wait after container start before running tests.
pub const DEFAULT_GOSS_WAIT: u64 = 0;

/// Default directory for dgoss JSON reports, relative to the project root.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Returns the default project root.
///
/// Uses the current working directory. This can be overridden by the
/// `--context` CLI flag or the `BAKERY_CONTEXT` environment variable.
pub fn default_context() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
