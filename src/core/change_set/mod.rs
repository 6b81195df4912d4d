//! Change sets between two revisions of a metadata project.
//!
//! - `manifest` - package.xml reading and writing
//! - `diff` - added/deleted components and destructive manifests
//! - `create` - git checkout, source conversion and diff as one workflow

mod create;
mod diff;
mod manifest;

pub use create::{create_change_set, read_source_paths, ChangeSetRequest, SFDX_PROJECT_FILE};
pub use diff::{diff, synthesize_destructive, ChangeSetDiff, Changes, ComponentMap};
pub use manifest::{
    ManifestType, PackageManifest, DEFAULT_API_VERSION, DEFAULT_ENCODING, DEFAULT_XMLNS, DEFAULT_XML_VERSION,
    MANIFEST_FILE,
};

use serde::{Deserialize, Serialize};

/// Whether destructive changes apply before or after the deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestructiveChangeSetMode {
    Pre,
    #[default]
    Post,
}

impl DestructiveChangeSetMode {
    pub fn file_name(&self) -> &'static str {
        match self {
            DestructiveChangeSetMode::Pre => "destructiveChangesPre.xml",
            DestructiveChangeSetMode::Post => "destructiveChangesPost.xml",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DestructiveChangeSetMode::Pre => "pre",
            DestructiveChangeSetMode::Post => "post",
        }
    }
}

impl std::str::FromStr for DestructiveChangeSetMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(DestructiveChangeSetMode::Pre),
            "post" => Ok(DestructiveChangeSetMode::Post),
            other => Err(format!("unknown destructive change set mode '{}', expected pre or post", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_destructive_file() {
        assert_eq!(DestructiveChangeSetMode::default(), DestructiveChangeSetMode::Post);
        assert_eq!(DestructiveChangeSetMode::Pre.file_name(), "destructiveChangesPre.xml");
        assert_eq!("POST".parse::<DestructiveChangeSetMode>(), Ok(DestructiveChangeSetMode::Post));
        assert!("later".parse::<DestructiveChangeSetMode>().is_err());
        let mode: DestructiveChangeSetMode = serde_json::from_str("\"pre\"").unwrap();
        assert_eq!(mode, DestructiveChangeSetMode::Pre);
    }
}
