use std::path::Path;
use std::process::Command;

use crate::error::{truncate_output, Error};

/// Run `git` with `args` in `dir`, returning trimmed stdout.
fn git(dir: &Path, args: &[&str]) -> Result<String, Error> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Command {
            command: format!("git {}", args.join(" ")),
            exit_code: None,
            stdout: String::new(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::Command {
            command: format!("git {}", args.join(" ")),
            exit_code: output.status.code(),
            stdout: truncate_output(&String::from_utf8_lossy(&output.stdout)),
            stderr: truncate_output(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The commit checked out in `dir`, if it is inside a git work tree.
///
/// A missing git binary or a directory outside any repository is not an
/// error; images are simply labelled without a revision.
pub fn current_revision(dir: &Path) -> Option<String> {
    match git(dir, &["rev-parse", "HEAD"]) {
        Ok(revision) if is_commit_hash(&revision) => Some(revision),
        Ok(other) => {
            log::debug!("Ignoring unexpected git revision output '{}'", other);
            None
        }
        Err(e) => {
            log::debug!("No source revision for {}: {}", dir.display(), e);
            None
        }
    }
}

fn is_commit_hash(value: &str) -> bool {
    (7..=64).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}
