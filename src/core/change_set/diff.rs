use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::manifest::{
    ManifestType, PackageManifest, DEFAULT_API_VERSION, DEFAULT_ENCODING, DEFAULT_XMLNS, DEFAULT_XML_VERSION,
};

/// Component type to member names, in order of first appearance.
pub type ComponentMap = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    pub added: ComponentMap,
    pub deleted: ComponentMap,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSetDiff {
    pub changes: Changes,
    /// Removes from the target org what the deploy no longer contains.
    pub deploy_destructive: Option<PackageManifest>,
    /// Removes from the target org what a revert must take back out.
    pub revert_destructive: Option<PackageManifest>,
}

/// Compare the manifest of the base revision with the manifest of the merged
/// revision.
///
/// A deploy member found in the revert manifest is "modified" and consumes
/// one matching revert member. Deploy members with no match are added;
/// revert members left over are deleted. Member lists are not deduplicated.
pub fn diff(revert: &PackageManifest, deploy: &PackageManifest) -> ChangeSetDiff {
    let mut remaining: ComponentMap = IndexMap::new();
    for (name, members) in revert.components() {
        remaining.entry(name.to_string()).or_default().extend(members.iter().cloned());
    }

    let mut changes = Changes::default();
    for (name, members) in deploy.components() {
        for member in members {
            let matched = remaining
                .get_mut(name)
                .and_then(|left| left.iter().position(|m| m == member).map(|i| left.remove(i)));
            if matched.is_none() {
                changes.added.entry(name.to_string()).or_default().push(member.clone());
            }
        }
    }

    for (name, members) in remaining {
        if !members.is_empty() {
            changes.deleted.entry(name).or_default().extend(members);
        }
    }

    ChangeSetDiff {
        deploy_destructive: synthesize_destructive(deploy, &changes.deleted),
        revert_destructive: synthesize_destructive(revert, &changes.added),
        changes,
    }
}

/// Build a destructive manifest listing `components`, borrowing version and
/// namespace metadata from `source`. `None` when nothing would be listed.
pub fn synthesize_destructive(source: &PackageManifest, components: &ComponentMap) -> Option<PackageManifest> {
    let types: Vec<ManifestType> = components
        .iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(name, members)| ManifestType {
            name: Some(name.clone()),
            members: members.clone(),
        })
        .collect();

    if types.is_empty() {
        return None;
    }

    Some(PackageManifest {
        xml_version: Some(or_default(&source.xml_version, DEFAULT_XML_VERSION)),
        encoding: Some(or_default(&source.encoding, DEFAULT_ENCODING)),
        xmlns: Some(or_default(&source.xmlns, DEFAULT_XMLNS)),
        version: Some(or_default(&source.version, DEFAULT_API_VERSION)),
        types,
    })
}

fn or_default(value: &Option<String>, default: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
