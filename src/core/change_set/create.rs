use std::path::{Path, PathBuf};

use serde_json::Value;

use super::diff::{diff, Changes};
use super::manifest::{PackageManifest, MANIFEST_FILE};
use super::DestructiveChangeSetMode;
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::sfdx::Platform;
use crate::utils::io;

pub const SFDX_PROJECT_FILE: &str = "sfdx-project.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSetRequest {
    pub head_sha: String,
    pub base_sha: String,
    pub mode: DestructiveChangeSetMode,
    pub change_set_dir: String,
    pub create_revert: bool,
    pub revert_mode: DestructiveChangeSetMode,
    /// Defaults to `revertChSet_<epoch millis>`.
    pub revert_change_set_dir: Option<String>,
}

/// Build a deployable change set for `head` on top of `base`.
///
/// Checks out `base` and converts it into the revert directory, merges `head`
/// and converts again into the change-set directory, then diffs the two
/// package.xml files. Destructive manifests are written next to them; the
/// revert directory is removed unless a revert change set was requested.
pub fn create_change_set(
    platform: &dyn Platform,
    vcs: &dyn VersionControl,
    project_dir: &Path,
    request: &ChangeSetRequest,
) -> Result<Changes> {
    let revert_dir = project_dir.join(match &request.revert_change_set_dir {
        Some(dir) if !dir.trim().is_empty() => dir.clone(),
        _ => format!("revertChSet_{}", chrono::Utc::now().timestamp_millis()),
    });
    let change_set_dir = project_dir.join(&request.change_set_dir);

    vcs.checkout(&request.base_sha)?;
    let source_paths = read_source_paths(project_dir)?;
    platform.source_convert(&revert_dir, &source_paths)?;

    vcs.merge(&request.head_sha, &request.base_sha)?;
    let source_paths = read_source_paths(project_dir)?;
    platform.source_convert(&change_set_dir, &source_paths)?;

    let deploy = PackageManifest::read(&change_set_dir.join(MANIFEST_FILE))?;
    let revert = PackageManifest::read(&revert_dir.join(MANIFEST_FILE))?;
    let result = diff(&revert, &deploy);

    if let Some(manifest) = &result.deploy_destructive {
        let path = change_set_dir.join(request.mode.file_name());
        manifest.write(&path)?;
        crate::log_status!("changeset", "Wrote {}", path.display());
    }

    if request.create_revert {
        if let Some(manifest) = &result.revert_destructive {
            manifest.write(&revert_dir.join(request.revert_mode.file_name()))?;
        }
    } else {
        io::remove_dir_if_exists(&revert_dir, "remove revert change set")?;
    }

    crate::log_status!(
        "changeset",
        "{} type(s) added, {} type(s) deleted",
        result.changes.added.len(),
        result.changes.deleted.len()
    );

    Ok(result.changes)
}

/// Package directory paths listed in the project's `sfdx-project.json`.
pub fn read_source_paths(project_dir: &Path) -> Result<Vec<String>> {
    let path: PathBuf = project_dir.join(SFDX_PROJECT_FILE);
    if !path.is_file() {
        return Err(Error::config_file_not_found(SFDX_PROJECT_FILE));
    }

    let raw = io::read_file(&path, "read sfdx project")?;
    let project: Value = serde_json::from_str(&raw)
        .map_err(|e| Error::config_invalid_content(SFDX_PROJECT_FILE, "JSON", Some(e.to_string())))?;

    let directories = project
        .get("packageDirectories")
        .and_then(Value::as_array)
        .filter(|dirs| !dirs.is_empty())
        .ok_or_else(|| {
            Error::config_invalid_schema(SFDX_PROJECT_FILE, "File must contain at least one packageDirectories")
        })?;

    Ok(directories
        .iter()
        .filter_map(|dir| dir.get("path").and_then(Value::as_str))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect())
}
