//! Version control operations used while building change sets.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::command;

pub trait VersionControl {
    /// Check out a commit, branch or tag.
    fn checkout(&self, point: &str) -> Result<()>;
    /// Merge `from` and `to` into the current branch.
    fn merge(&self, from: &str, to: &str) -> Result<()>;
}

/// `VersionControl` backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn git(&self, args: &[&str], context: &str) -> Result<String> {
        command::run_in(&self.repo_dir, "git", args, context).map_err(|e| {
            let reason = e.details["error"].as_str().unwrap_or(&e.message).to_string();
            Error::git_command_failed(reason)
        })
    }
}

impl VersionControl for GitCli {
    fn checkout(&self, point: &str) -> Result<()> {
        crate::log_status!("git", "Checking out {}", point);
        self.git(&["checkout", point], "git checkout")?;
        Ok(())
    }

    fn merge(&self, from: &str, to: &str) -> Result<()> {
        crate::log_status!("git", "Merging {} and {}", from, to);
        self.git(&["merge", from, to], "git merge")?;
        Ok(())
    }
}
