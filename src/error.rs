//! # Error Handling
//!
//! This module defines the centralized error type for the `bakery` library.
//! It uses `thiserror` to build a single `Error` enum covering every failure
//! mode of configuration loading, matrix expansion, templating, external tool
//! execution and registry housekeeping.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries the context needed to
//!   produce an actionable message (file paths, commands, URLs).
//!
//! - **`ErrorGroup`**: An aggregate of independent failures. Batch operations
//!   (loading several manifests, deleting many registry versions, testing many
//!   targets) collect every failure instead of stopping at the first one and
//!   surface them together through `Error::Group`.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! The taxonomy follows the lifecycle of an invocation:
//!
//! - Configuration errors (missing file, schema validation, unknown
//!   image/version).
//! - Constraint errors (malformed or unsatisfiable dependency constraints).
//! - Templating errors (existing files on scaffold, undefined variables).
//! - Tool and registry errors (missing binaries, non-zero exits, malformed
//!   registry URLs, transport failures).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of characters of captured command output kept in errors.
pub const OUTPUT_TRUNCATE_LEN: usize = 2000;

/// Main error type for bakery operations
#[derive(Error, Debug)]
pub enum Error {
    /// No configuration file could be found in the project root.
    #[error("Configuration file not found in {}", root.display())]
    ConfigNotFound { root: PathBuf },

    /// A configuration file could not be parsed at all.
    #[error("Configuration parsing error in {}: {message}{}", path.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        path: PathBuf,
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A configuration file parsed but failed validation.
    ///
    /// All validation failures found in the file are reported together.
    #[error("Configuration validation failed for {}:{}", path.display(), errors.iter().map(|e| format!("\n  - {}", e)).collect::<String>())]
    ConfigValidation { path: PathBuf, errors: Vec<String> },

    /// A configuration-level inconsistency that is not tied to one file.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The requested image does not exist in the configuration.
    #[error("Image '{name}' not found in configuration")]
    ImageNotFound { name: String },

    /// The requested version does not exist for the image.
    #[error("Version '{version}' not found for image '{image}'")]
    VersionNotFound { image: String, version: String },

    /// Two build targets expanded to the same identifier.
    #[error("Build target id collision: '{id}' is produced by both {first} and {second}")]
    TargetCollision {
        id: String,
        first: String,
        second: String,
    },

    /// A dependency constraint is malformed or cannot be satisfied.
    #[error("Dependency constraint error for {dependency}: {message}")]
    Constraint { dependency: String, message: String },

    /// An error occurred during template processing.
    ///
    /// May include the name of the problematic variable when applicable.
    #[error("Template processing error: {message}{}", variable.as_ref().map(|v| format!(" (variable: {})", v)).unwrap_or_default())]
    Template {
        message: String,
        /// The template variable that caused the error, if applicable
        variable: Option<String>,
    },

    /// Scaffolding refused to overwrite an existing file.
    #[error("Refusing to overwrite existing file: {}", path.display())]
    TemplateExists { path: PathBuf },

    /// An external binary could not be located.
    #[error("Required tool '{tool}' not found (checked ${env_var}, PATH and {})", tools_dir.display())]
    ToolNotFound {
        tool: String,
        env_var: String,
        tools_dir: PathBuf,
    },

    /// An external command exited unsuccessfully.
    #[error("Command `{command}` failed with exit code {}{}{}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "<signal>".to_string()), if stdout.is_empty() { String::new() } else { format!("\n  stdout: {}", stdout) }, if stderr.is_empty() { String::new() } else { format!("\n  stderr: {}", stderr) })]
    Command {
        command: String,
        exit_code: Option<i32>,
        /// Captured stdout, truncated to `OUTPUT_TRUNCATE_LEN` characters
        stdout: String,
        /// Captured stderr, truncated to `OUTPUT_TRUNCATE_LEN` characters
        stderr: String,
    },

    /// A registry URL did not match the provider's expected shape.
    #[error("Registry URL '{url}' is not a valid {provider} package URL (expected {expected})")]
    RegistryFormat {
        url: String,
        provider: String,
        expected: String,
    },

    /// A registry API call failed (transport, authentication, unexpected status).
    #[error("Registry operation error for {url}: {message}")]
    Registry { url: String, message: String },

    /// A network operation against a vendor metadata endpoint failed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// Several independent failures collected from a batch operation.
    #[error("{0}")]
    Group(ErrorGroup),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// An HTTP client error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        // Tera nests the useful message (e.g. the undefined variable) in the
        // source chain, so flatten it.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        let variable = extract_undefined_variable(&message);
        Error::Template { message, variable }
    }
}

fn extract_undefined_variable(message: &str) -> Option<String> {
    let re = regex::Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message).map(|c| c[1].to_string())
}

/// A collection of independent failures, reported together.
#[derive(Debug, Default)]
pub struct ErrorGroup {
    /// Summary of the batch that failed.
    pub message: String,
    /// Every underlying failure, in the order it occurred.
    pub errors: Vec<Error>,
    /// Files or directories affected by the failures, if any.
    pub paths: Vec<PathBuf>,
}

impl ErrorGroup {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn push_with_path(&mut self, error: Error, path: impl Into<PathBuf>) {
        self.errors.push(error);
        self.paths.push(path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Convert into a `Result`: `Ok(())` when nothing failed, the single
    /// error when exactly one failed, and a grouped error otherwise.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 if self.paths.len() <= 1 => Err(self.errors.remove(0)),
            _ => Err(Error::Group(self)),
        }
    }
}

impl fmt::Display for ErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} errors)", self.message, self.errors.len())?;
        for (idx, error) in self.errors.iter().enumerate() {
            write!(f, "\n  {}. {}", idx + 1, error)?;
        }
        if !self.paths.is_empty() {
            write!(f, "\n  affected paths:")?;
            for path in &self.paths {
                write!(f, "\n    {}", path.display())?;
            }
        }
        Ok(())
    }
}

/// Truncate captured command output for inclusion in error messages.
pub fn truncate_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() <= OUTPUT_TRUNCATE_LEN {
        return trimmed.to_string();
    }
    let tail: String = trimmed
        .chars()
        .skip(trimmed.chars().count() - OUTPUT_TRUNCATE_LEN)
        .collect();
    format!("...{}", tail)
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
