use clap::{Args, Subcommand};
use serde::Serialize;

use sfdx_ci::change_set::{self, ChangeSetRequest, Changes, DestructiveChangeSetMode, PackageManifest};
use sfdx_ci::git::GitCli;
use sfdx_ci::sfdx::SfdxCli;

use super::{display, expand_path, working_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ChangesetArgs {
    #[command(subcommand)]
    pub command: ChangesetCommand,
}

#[derive(Subcommand)]
pub enum ChangesetCommand {
    /// Compare two package.xml manifests
    Diff {
        /// Manifest of the base revision
        #[arg(long)]
        revert: String,

        /// Manifest of the revision being deployed
        #[arg(long)]
        deploy: String,

        /// Write destructive manifests into this directory
        #[arg(long)]
        out_dir: Option<String>,

        /// When deploy-side deletions apply
        #[arg(long, default_value = "post")]
        mode: DestructiveChangeSetMode,

        /// When revert-side deletions apply
        #[arg(long, default_value = "post")]
        revert_mode: DestructiveChangeSetMode,
    },
    /// Build a change set from two git revisions of the current project
    Create {
        /// Revision being deployed
        #[arg(long)]
        head: String,

        /// Revision already in the target org
        #[arg(long)]
        base: String,

        /// Output directory for the change set
        #[arg(long, default_value = "changeSet")]
        dir: String,

        /// When deploy-side deletions apply
        #[arg(long, default_value = "post")]
        mode: DestructiveChangeSetMode,

        /// Keep the revert change set
        #[arg(long)]
        create_revert: bool,

        /// When revert-side deletions apply
        #[arg(long, default_value = "post")]
        revert_mode: DestructiveChangeSetMode,

        /// Output directory for the revert change set
        #[arg(long)]
        revert_dir: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetOutput {
    pub command: String,
    pub changes: Changes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub written: Vec<String>,
}

pub fn run(args: ChangesetArgs, global: &GlobalArgs) -> CmdResult<ChangesetOutput> {
    match args.command {
        ChangesetCommand::Diff {
            revert,
            deploy,
            out_dir,
            mode,
            revert_mode,
        } => diff(&revert, &deploy, out_dir.as_deref(), mode, revert_mode),
        ChangesetCommand::Create {
            head,
            base,
            dir,
            mode,
            create_revert,
            revert_mode,
            revert_dir,
        } => {
            let cwd = working_dir()?;
            let sfdx = SfdxCli::new(SfdxCli::resolve_bin(global.sfdx_bin.clone()), &cwd);
            let git = GitCli::new(&cwd);
            let request = ChangeSetRequest {
                head_sha: head,
                base_sha: base,
                mode,
                change_set_dir: dir,
                create_revert,
                revert_mode,
                revert_change_set_dir: revert_dir,
            };
            let changes = change_set::create_change_set(&sfdx, &git, &cwd, &request)?;
            Ok((
                ChangesetOutput {
                    command: "changeset.create".to_string(),
                    changes,
                    written: Vec::new(),
                },
                0,
            ))
        }
    }
}

fn diff(
    revert: &str,
    deploy: &str,
    out_dir: Option<&str>,
    mode: DestructiveChangeSetMode,
    revert_mode: DestructiveChangeSetMode,
) -> CmdResult<ChangesetOutput> {
    let revert = PackageManifest::read(&expand_path(revert))?;
    let deploy = PackageManifest::read(&expand_path(deploy))?;
    let result = change_set::diff(&revert, &deploy);

    let mut written = Vec::new();
    if let Some(dir) = out_dir {
        let dir = expand_path(dir);
        let outputs = [
            (result.deploy_destructive.as_ref(), mode.file_name().to_string()),
            (
                result.revert_destructive.as_ref(),
                format!("revert-{}", revert_mode.file_name()),
            ),
        ];
        for (manifest, file_name) in outputs {
            if let Some(manifest) = manifest {
                let path = dir.join(file_name);
                manifest.write(&path)?;
                written.push(display(&path));
            }
        }
    }

    Ok((
        ChangesetOutput {
            command: "changeset.diff".to_string(),
            changes: result.changes,
            written,
        },
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package(dir: &TempDir, name: &str, members: &[&str]) -> String {
        let members: String = members
            .iter()
            .map(|m| format!("<members>{}</members>", m))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
<types>{}<name>ApexClass</name></types>
<version>55.0</version>
</Package>"#,
            members
        );
        let path = dir.path().join(name);
        std::fs::write(&path, xml).unwrap();
        path.display().to_string()
    }

    #[test]
    fn diff_writes_both_destructive_manifests() {
        let dir = TempDir::new().unwrap();
        let revert = package(&dir, "revert.xml", &["A", "B"]);
        let deploy = package(&dir, "deploy.xml", &["B", "C"]);
        let out = dir.path().join("out");

        let (output, code) = diff(
            &revert,
            &deploy,
            Some(&out.display().to_string()),
            DestructiveChangeSetMode::Pre,
            DestructiveChangeSetMode::Post,
        )
        .unwrap();

        assert_eq!(code, 0);
        assert_eq!(output.changes.added["ApexClass"], vec!["C".to_string()]);
        assert_eq!(output.changes.deleted["ApexClass"], vec!["A".to_string()]);
        assert_eq!(output.written.len(), 2);
        assert!(out.join("destructiveChangesPre.xml").exists());
        assert!(out.join("revert-destructiveChangesPost.xml").exists());
    }

    #[test]
    fn diff_without_out_dir_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let revert = package(&dir, "revert.xml", &["A"]);
        let deploy = package(&dir, "deploy.xml", &["A"]);

        let (output, _) = diff(
            &revert,
            &deploy,
            None,
            DestructiveChangeSetMode::Post,
            DestructiveChangeSetMode::Post,
        )
        .unwrap();

        assert!(output.changes.is_empty());
        assert!(output.written.is_empty());
    }
}
