//! Version-control collaborator. Failures here are logged and never fatal:
//! by the time the VCS runs, the file and the row store are already
//! consistent.

use std::path::Path;
use std::process::Command;

pub trait Vcs: Send + Sync {
    fn commit_file(&self, root: &Path, file: &Path, message: &str) -> Result<(), String>;
}

/// Shells out to the `git` binary in the project root.
#[derive(Debug, Default)]
pub struct GitCli;

impl Vcs for GitCli {
    fn commit_file(&self, root: &Path, file: &Path, message: &str) -> Result<(), String> {
        run_git(root, &["add", "--", &file.display().to_string()])?;
        run_git(root, &["commit", "-m", message, "--", &file.display().to_string()])?;
        Ok(())
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<(), String> {
    let output = Command::new("git")
        .current_dir(root)
        .args(args)
        .output()
        .map_err(|e| format!("failed to run git: {e}"))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

/// No-op implementation for tests and VCS-less deployments.
#[derive(Debug, Default)]
pub struct NoVcs;

impl Vcs for NoVcs {
    fn commit_file(&self, _root: &Path, _file: &Path, _message: &str) -> Result<(), String> {
        Ok(())
    }
}
