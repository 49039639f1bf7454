//! # External Tools
//!
//! Locates the binaries bakery drives (`docker`, `dgoss`, `goss`) and runs
//! them. Lookup checks, in order:
//!
//! 1. the tool's environment variable (`DOCKER_PATH`, `DGOSS_PATH`, `GOSS_PATH`),
//! 2. `PATH`,
//! 3. `<project root>/tools/<name>`.
//!
//! Commands run through the [`CommandRunner`] trait so builds and tests can be
//! exercised without the real tools installed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{truncate_output, Error, Result};

/// A tool bakery knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub name: &'static str,
    pub env_var: &'static str,
}

pub const DOCKER: Tool = Tool {
    name: "docker",
    env_var: "DOCKER_PATH",
};

pub const DGOSS: Tool = Tool {
    name: "dgoss",
    env_var: "DGOSS_PATH",
};

pub const GOSS: Tool = Tool {
    name: "goss",
    env_var: "GOSS_PATH",
};

/// Directory under the project root searched last.
pub const TOOLS_DIR: &str = "tools";

/// Find `tool`, see the module documentation for the lookup order.
pub fn find_tool(tool: Tool, root: &Path) -> Result<PathBuf> {
    if let Some(value) = std::env::var_os(tool.env_var).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if path.is_file() {
            log::debug!("Using {} from ${}: {}", tool.name, tool.env_var, path.display());
            return Ok(path);
        }
        log::warn!(
            "${} points to {}, which is not a file; searching PATH",
            tool.env_var,
            path.display()
        );
    }

    if let Ok(path) = which::which(tool.name) {
        log::debug!("Using {} from PATH: {}", tool.name, path.display());
        return Ok(path);
    }

    let tools_dir = root.join(TOOLS_DIR);
    let local = tools_dir.join(tool.name);
    if local.is_file() {
        log::debug!("Using project-local {}: {}", tool.name, local.display());
        return Ok(local);
    }

    Err(Error::ToolNotFound {
        tool: tool.name.to_string(),
        env_var: tool.env_var.to_string(),
        tools_dir,
    })
}

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as a single string, for messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().map(|a| a.to_string_lossy().to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Trait for running external commands - allows mocking in tests
pub trait CommandRunner {
    /// Run `spec`, failing with [`Error::Command`] on a non-zero exit.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Let the child write to the terminal instead of capturing its output.
    pub stream: bool,
}

impl SystemRunner {
    pub fn streaming() -> Self {
        Self { stream: true }
    }

    pub fn capturing() -> Self {
        Self { stream: false }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        log::info!("Running: {}", spec.display());
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).current_dir(&spec.cwd);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let spawn_error = |e: std::io::Error| Error::Command {
            command: spec.display(),
            exit_code: None,
            stdout: String::new(),
            stderr: e.to_string(),
        };

        let (status, output) = if self.stream {
            let status = command
                .stdin(Stdio::null())
                .status()
                .map_err(spawn_error)?;
            (status, CommandOutput::default())
        } else {
            let output = command.output().map_err(spawn_error)?;
            (
                output.status,
                CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                },
            )
        };

        if !status.success() {
            return Err(Error::Command {
                command: spec.display(),
                exit_code: status.code(),
                stdout: truncate_output(&output.stdout),
                stderr: truncate_output(&output.stderr),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const MISSING: Tool = Tool {
        name: "bakery-test-tool-that-does-not-exist",
        env_var: "BAKERY_TEST_TOOL_PATH",
    };

    #[test]
    #[serial]
    fn test_find_tool_from_env() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("custom-tool");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        std::env::set_var(MISSING.env_var, &binary);
        let found = find_tool(MISSING, dir.path());
        std::env::remove_var(MISSING.env_var);
        assert_eq!(found.unwrap(), binary);
    }

    #[test]
    #[serial]
    fn test_find_tool_in_project_tools_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(TOOLS_DIR)).unwrap();
        let local = dir.path().join(TOOLS_DIR).join(MISSING.name);
        std::fs::write(&local, "#!/bin/sh\n").unwrap();
        assert_eq!(find_tool(MISSING, dir.path()).unwrap(), local);
    }

    #[test]
    #[serial]
    fn test_find_tool_not_found() {
        let dir = TempDir::new().unwrap();
        match find_tool(MISSING, dir.path()).unwrap_err() {
            Error::ToolNotFound { tool, env_var, tools_dir } => {
                assert_eq!(tool, MISSING.name);
                assert_eq!(env_var, "BAKERY_TEST_TOOL_PATH");
                assert_eq!(tools_dir, dir.path().join(TOOLS_DIR));
            }
            other => panic!("Expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("docker", ".")
            .args(["buildx", "bake"])
            .arg("--load")
            .env("KEY", "value");
        assert_eq!(spec.display(), "docker buildx bake --load");
        assert_eq!(spec.env, vec![("KEY".to_string(), "value".to_string())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_failure() {
        let dir = TempDir::new().unwrap();
        let spec = CommandSpec::new("sh", dir.path()).args(["-c", "echo oops >&2; exit 3"]);
        match SystemRunner::capturing().run(&spec).unwrap_err() {
            Error::Command { exit_code, stderr, .. } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("Expected command error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let spec = CommandSpec::new("sh", dir.path())
            .args(["-c", "echo $GREETING"])
            .env("GREETING", "hello");
        let output = SystemRunner::capturing().run(&spec).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }
}
